//! Diesel row types.

use diesel::prelude::*;

use crate::schema;

/// Article row as stored.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::articles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArticleRecord {
    pub id: i32,
    pub element_guid: Option<String>,
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image_data: Option<String>,
    pub published_url: String,
    pub published_url_en: Option<String>,
    pub k5a_url: Option<String>,
    pub site_alias: Option<String>,
    pub instance: Option<String>,
    pub section: String,
    pub category_id: Option<i32>,
    pub is_home: bool,
    pub display_order: i32,
    pub layout_type: Option<String>,
    pub grid_size: Option<i32>,
    pub layout_data: Option<String>,
    pub is_paywall: bool,
    pub paywall_class: Option<String>,
    pub is_featured: bool,
    pub is_temp: bool,
    pub article_type: Option<String>,
    pub position: Option<i32>,
    pub language: String,
    pub original_language: Option<String>,
    pub canonical_id: Option<i32>,
    pub published_date: Option<String>,
    pub crawled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Every article column except `id`, used for both insert and update.
#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = schema::articles)]
#[diesel(treat_none_as_null = true)]
pub struct ArticleRow {
    pub element_guid: Option<String>,
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image_data: Option<String>,
    pub published_url: String,
    pub published_url_en: Option<String>,
    pub k5a_url: Option<String>,
    pub site_alias: Option<String>,
    pub instance: Option<String>,
    pub section: String,
    pub category_id: Option<i32>,
    pub is_home: bool,
    pub display_order: i32,
    pub layout_type: Option<String>,
    pub grid_size: Option<i32>,
    pub layout_data: Option<String>,
    pub is_paywall: bool,
    pub paywall_class: Option<String>,
    pub is_featured: bool,
    pub is_temp: bool,
    pub article_type: Option<String>,
    pub position: Option<i32>,
    pub language: String,
    pub original_language: Option<String>,
    pub canonical_id: Option<i32>,
    pub published_date: Option<String>,
    pub crawled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::article_details)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArticleDetailRecord {
    pub id: i32,
    pub published_url: String,
    pub language: String,
    pub element_guid: Option<String>,
    pub content_blocks: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::article_details)]
pub struct NewArticleDetail<'a> {
    pub published_url: &'a str,
    pub language: &'a str,
    pub element_guid: Option<&'a str>,
    pub content_blocks: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::crawl_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CrawlLogRecord {
    pub id: i32,
    pub crawl_type: String,
    pub section: Option<String>,
    pub status: String,
    pub articles_crawled: i32,
    pub articles_created: i32,
    pub articles_updated: i32,
    pub errors: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::crawl_logs)]
pub struct NewCrawlLog<'a> {
    pub crawl_type: &'a str,
    pub section: Option<&'a str>,
    pub status: &'a str,
    pub started_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryRecord {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::categories)]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub description: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
