//! Category and user repositories.

use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{CategoryRecord, NewCategory};
use super::pool::{Database, DbError};
use super::util::parse_datetime;
use crate::models::{Category, Section};
use crate::schema::{categories, users};

impl From<CategoryRecord> for Category {
    fn from(record: CategoryRecord) -> Self {
        Category {
            id: record.id,
            name: record.name,
            slug: record.slug,
            description: record.description,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

pub struct CategoryRepository<'a> {
    db: &'a Database,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create the fixed category rows. Returns how many were new.
    pub async fn seed(&self) -> Result<usize, DbError> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.db.conn().await;
        let mut created = 0;
        for section in Section::CATEGORIES {
            created += diesel::insert_into(categories::table)
                .values(&NewCategory {
                    name: section.display_name(),
                    slug: section.as_str(),
                    description: None,
                    created_at: &now,
                    updated_at: &now,
                })
                .on_conflict(categories::slug)
                .do_nothing()
                .execute(&mut *conn)
                .await?;
        }
        Ok(created)
    }

    pub async fn by_slug(&self, slug: &str) -> Result<Option<Category>, DbError> {
        let mut conn = self.db.conn().await;
        categories::table
            .filter(categories::slug.eq(slug))
            .select(CategoryRecord::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map(|r| r.map(Category::from))
    }

    pub async fn all(&self) -> Result<Vec<Category>, DbError> {
        let mut conn = self.db.conn().await;
        categories::table
            .select(CategoryRecord::as_select())
            .order(categories::id.asc())
            .load(&mut *conn)
            .await
            .map(|records| records.into_iter().map(Category::from).collect())
    }
}

/// Read-only access to ingestion identities.
pub struct UserRepository<'a> {
    db: &'a Database,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn count_active(&self) -> Result<i64, DbError> {
        let mut conn = self.db.conn().await;
        users::table
            .filter(users::is_active.eq(true))
            .select(count_star())
            .first(&mut *conn)
            .await
    }
}
