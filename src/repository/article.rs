//! Article repository.

use chrono::Utc;
use diesel::dsl::{count_star, exists, not};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use super::models::{ArticleRecord, ArticleRow};
use super::pool::{Database, DbError};
use super::util::{
    decode_json, encode_json, is_unique_violation, parse_datetime, parse_datetime_opt,
    parse_offset_datetime,
};
use crate::models::{Article, ImageData, ImageVariants, Language, LayoutType};
use crate::schema::{article_details, articles};

impl From<ArticleRecord> for Article {
    fn from(record: ArticleRecord) -> Self {
        let layout_type = record.layout_type.as_deref().and_then(LayoutType::from_str);
        let layout_data = decode_json(record.layout_data.as_deref(), "layout_data")
            .filter(|data: &crate::models::LayoutData| {
                layout_type.map(|lt| data.fits(lt)).unwrap_or(true)
            });

        Article {
            id: record.id,
            element_guid: record.element_guid,
            title: record.title,
            slug: record.slug,
            excerpt: record.excerpt,
            content: record.content,
            image_data: decode_json(record.image_data.as_deref(), "image_data"),
            published_url: record.published_url,
            published_url_en: record.published_url_en,
            k5a_url: record.k5a_url,
            site_alias: record.site_alias,
            instance: record.instance,
            section: record.section,
            category_id: record.category_id,
            is_home: record.is_home,
            display_order: record.display_order,
            layout_type,
            grid_size: record.grid_size,
            layout_data,
            is_paywall: record.is_paywall,
            paywall_class: record.paywall_class,
            is_featured: record.is_featured,
            is_temp: record.is_temp,
            article_type: record.article_type,
            position: record.position,
            language: Language::from_str(&record.language).unwrap_or_default(),
            original_language: record.original_language.as_deref().and_then(Language::from_str),
            canonical_id: record.canonical_id,
            published_date: parse_offset_datetime(record.published_date),
            crawled_at: parse_datetime_opt(record.crawled_at),
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

impl From<&Article> for ArticleRow {
    fn from(a: &Article) -> Self {
        ArticleRow {
            element_guid: a.element_guid.clone(),
            title: a.title.clone(),
            slug: a.slug.clone(),
            excerpt: a.excerpt.clone(),
            content: a.content.clone(),
            image_data: encode_json(a.image_data.as_ref()),
            published_url: a.published_url.clone(),
            published_url_en: a.published_url_en.clone(),
            k5a_url: a.k5a_url.clone(),
            site_alias: a.site_alias.clone(),
            instance: a.instance.clone(),
            section: a.section.clone(),
            category_id: a.category_id,
            is_home: a.is_home,
            display_order: a.display_order,
            layout_type: a.layout_type.map(|lt| lt.as_str().to_string()),
            grid_size: a.grid_size,
            layout_data: encode_json(a.layout_data.as_ref()),
            is_paywall: a.is_paywall,
            paywall_class: a.paywall_class.clone(),
            is_featured: a.is_featured,
            is_temp: a.is_temp,
            article_type: a.article_type.clone(),
            position: a.position,
            language: a.language.as_str().to_string(),
            original_language: a.original_language.map(|l| l.as_str().to_string()),
            canonical_id: a.canonical_id,
            published_date: a.published_date.map(|d| d.to_rfc3339()),
            crawled_at: a.crawled_at.map(|d| d.to_rfc3339()),
            created_at: a.created_at.to_rfc3339(),
            updated_at: a.updated_at.to_rfc3339(),
        }
    }
}

/// Refuse a `layout_data` payload whose kind disagrees with `layout_type`.
fn check_layout(article: &Article) -> Result<(), DbError> {
    match (&article.layout_data, article.layout_type) {
        (Some(data), Some(lt)) if !data.fits(lt) => Err(DbError::QueryBuilderError(
            format!("layout_data kind {:?} does not fit layout_type {}", data.kind(), lt).into(),
        )),
        _ => Ok(()),
    }
}

/// Result of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created(i32),
    Updated(i32),
    /// A unique collision; the row already existed and was left alone.
    Existing(i32),
}

impl Upserted {
    pub fn id(&self) -> i32 {
        match self {
            Self::Created(id) | Self::Updated(id) | Self::Existing(id) => *id,
        }
    }
}

/// Filters for [`ArticleRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub language: Option<Language>,
    pub section: Option<String>,
    pub is_home: Option<bool>,
    /// Exclude `is_temp` rows.
    pub public_only: bool,
    /// Exclude slider containers (rows without a URL).
    pub with_url: bool,
    pub limit: Option<i64>,
}

pub struct ArticleRepository<'a> {
    db: &'a Database,
}

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, id: i32) -> Result<Option<Article>, DbError> {
        let mut conn = self.db.conn().await;
        articles::table
            .find(id)
            .select(ArticleRecord::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map(|r| r.map(Article::from))
    }

    /// Look up by the natural key `(published_url, language)`.
    pub async fn find_by_url(
        &self,
        url: &str,
        language: Language,
    ) -> Result<Option<Article>, DbError> {
        if url.is_empty() {
            return Ok(None);
        }
        let mut conn = self.db.conn().await;
        articles::table
            .filter(articles::published_url.eq(url))
            .filter(articles::language.eq(language.as_str()))
            .select(ArticleRecord::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map(|r| r.map(Article::from))
    }

    /// Slider containers are keyed by slot instead of URL.
    pub async fn find_slider(
        &self,
        language: Language,
        layout_type: LayoutType,
        display_order: i32,
    ) -> Result<Option<Article>, DbError> {
        let mut conn = self.db.conn().await;
        articles::table
            .filter(articles::published_url.eq(""))
            .filter(articles::language.eq(language.as_str()))
            .filter(articles::layout_type.eq(layout_type.as_str()))
            .filter(articles::display_order.eq(display_order))
            .filter(articles::section.eq("home"))
            .select(ArticleRecord::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map(|r| r.map(Article::from))
    }

    /// The row for the same story in another language.
    pub async fn find_sibling(
        &self,
        article: &Article,
        language: Language,
    ) -> Result<Option<Article>, DbError> {
        if article.is_slider_container() {
            match article.layout_type {
                Some(lt) => self.find_slider(language, lt, article.display_order).await,
                None => Ok(None),
            }
        } else {
            self.find_by_url(&article.published_url, language).await
        }
    }

    /// An EN article addressed by either its source URL or its translated URL.
    pub async fn find_en_by_any_url(&self, url: &str) -> Result<Option<Article>, DbError> {
        if url.is_empty() {
            return Ok(None);
        }
        let mut conn = self.db.conn().await;
        articles::table
            .filter(articles::language.eq(Language::En.as_str()))
            .filter(
                articles::published_url
                    .eq(url)
                    .or(articles::published_url_en.eq(url)),
            )
            .select(ArticleRecord::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map(|r| r.map(Article::from))
    }

    /// Articles in `language` whose image URLs carry `image_id`.
    pub async fn find_by_image_id(
        &self,
        image_id: &str,
        language: Option<Language>,
    ) -> Result<Vec<Article>, DbError> {
        let query_form = format!("%imageId={}%", image_id);
        let path_form = format!("%/{}.%", image_id);
        let records = {
            let mut conn = self.db.conn().await;
            let mut query = articles::table
                .filter(
                    articles::image_data
                        .like(query_form)
                        .or(articles::image_data.like(path_form)),
                )
                .select(ArticleRecord::as_select())
                .into_boxed();
            if let Some(lang) = language {
                query = query.filter(articles::language.eq(lang.as_str()));
            }
            query.order(articles::id.asc()).load(&mut *conn).await?
        };

        // LIKE also matches longer ids with the same prefix.
        Ok(records
            .into_iter()
            .map(Article::from)
            .filter(|a| {
                a.image_data
                    .as_ref()
                    .map(|img: &ImageData| {
                        img.variant_urls().into_iter().any(|u| {
                            crate::utils::url::extract_image_id(u).as_deref() == Some(image_id)
                        })
                    })
                    .unwrap_or(false)
            })
            .collect())
    }

    pub async fn list(&self, filter: &ArticleFilter) -> Result<Vec<Article>, DbError> {
        let mut conn = self.db.conn().await;
        let mut query = articles::table
            .select(ArticleRecord::as_select())
            .into_boxed();
        if let Some(lang) = filter.language {
            query = query.filter(articles::language.eq(lang.as_str()));
        }
        if let Some(ref section) = filter.section {
            query = query.filter(articles::section.eq(section.clone()));
        }
        if let Some(is_home) = filter.is_home {
            query = query.filter(articles::is_home.eq(is_home));
        }
        if filter.public_only {
            query = query.filter(articles::is_temp.eq(false));
        }
        if filter.with_url {
            query = query.filter(articles::published_url.ne(""));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        query
            .order((articles::display_order.asc(), articles::id.asc()))
            .load(&mut *conn)
            .await
            .map(|records| records.into_iter().map(Article::from).collect())
    }

    /// Home placements for a language in display order.
    pub async fn home(&self, language: Language) -> Result<Vec<Article>, DbError> {
        self.list(&ArticleFilter {
            language: Some(language),
            is_home: Some(true),
            ..Default::default()
        })
        .await
    }

    /// Public home placements, without temp rows.
    pub async fn public_home(&self, language: Language) -> Result<Vec<Article>, DbError> {
        self.list(&ArticleFilter {
            language: Some(language),
            is_home: Some(true),
            public_only: true,
            ..Default::default()
        })
        .await
    }

    /// Articles with a URL but no stored detail in their own language.
    ///
    /// EN details are produced by translation and never rendered.
    pub async fn missing_details(
        &self,
        language: Option<Language>,
        section: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Article>, DbError> {
        let mut conn = self.db.conn().await;
        let mut query = articles::table
            .filter(articles::published_url.ne(""))
            .filter(articles::language.ne(Language::En.as_str()))
            .filter(not(exists(
                article_details::table
                    .filter(article_details::published_url.eq(articles::published_url))
                    .filter(article_details::language.eq(articles::language)),
            )))
            .select(ArticleRecord::as_select())
            .into_boxed();
        if let Some(lang) = language {
            query = query.filter(articles::language.eq(lang.as_str()));
        }
        if let Some(section) = section {
            query = query.filter(articles::section.eq(section.to_string()));
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        query
            .order(articles::id.desc())
            .load(&mut *conn)
            .await
            .map(|records| records.into_iter().map(Article::from).collect())
    }

    /// EN articles whose translated URL is missing (or all with `force`).
    pub async fn needing_url_translation(
        &self,
        language: Language,
        limit: Option<i64>,
        force: bool,
    ) -> Result<Vec<Article>, DbError> {
        let mut conn = self.db.conn().await;
        let mut query = articles::table
            .filter(articles::language.eq(language.as_str()))
            .filter(articles::published_url.ne(""))
            .select(ArticleRecord::as_select())
            .into_boxed();
        if !force {
            query = query.filter(articles::published_url_en.is_null());
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        query
            .order(articles::id.asc())
            .load(&mut *conn)
            .await
            .map(|records| records.into_iter().map(Article::from).collect())
    }

    /// Insert a new row.
    ///
    /// A unique collision on `(published_url, language)` is not an error:
    /// the existing row's id is returned as [`Upserted::Existing`].
    pub async fn insert(&self, article: &Article) -> Result<Upserted, DbError> {
        check_layout(article)?;
        let row = ArticleRow::from(article);
        let result = {
            let mut conn = self.db.conn().await;
            diesel::insert_into(articles::table)
                .values(&row)
                .returning(articles::id)
                .get_result::<i32>(&mut *conn)
                .await
        };

        match result {
            Ok(id) => {
                self.db.record_write().await?;
                Ok(Upserted::Created(id))
            }
            Err(e) if is_unique_violation(&e) => {
                debug!(
                    "Article {} ({}) already present",
                    article.published_url, article.language
                );
                match self
                    .find_by_url(&article.published_url, article.language)
                    .await?
                {
                    Some(existing) => Ok(Upserted::Existing(existing.id)),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrite every column of an existing row.
    pub async fn update(&self, article: &Article) -> Result<Upserted, DbError> {
        check_layout(article)?;
        let mut row = ArticleRow::from(article);
        row.updated_at = Utc::now().to_rfc3339();
        {
            let mut conn = self.db.conn().await;
            diesel::update(articles::table.find(article.id))
                .set(&row)
                .execute(&mut *conn)
                .await?;
        }
        self.db.record_write().await?;
        Ok(Upserted::Updated(article.id))
    }

    /// Insert when unsaved, update otherwise. The article's id is filled in.
    pub async fn save(&self, article: &mut Article) -> Result<Upserted, DbError> {
        let outcome = if article.id == 0 {
            self.insert(article).await?
        } else {
            self.update(article).await?
        };
        article.id = outcome.id();
        Ok(outcome)
    }

    /// Clear home placement for every article in `language`.
    pub async fn reset_home(&self, language: Language) -> Result<usize, DbError> {
        let mut conn = self.db.conn().await;
        diesel::update(
            articles::table
                .filter(articles::language.eq(language.as_str()))
                .filter(articles::is_home.eq(true)),
        )
        .set(articles::is_home.eq(false))
        .execute(&mut *conn)
        .await
    }

    /// Link a mirrored article to its DA canonical.
    pub async fn set_canonical(&self, id: i32, canonical_id: Option<i32>) -> Result<(), DbError> {
        {
            let mut conn = self.db.conn().await;
            diesel::update(articles::table.find(id))
                .set((
                    articles::canonical_id.eq(canonical_id),
                    articles::original_language.eq(canonical_id.map(|_| Language::Da.as_str())),
                    articles::updated_at.eq(Utc::now().to_rfc3339()),
                ))
                .execute(&mut *conn)
                .await?;
        }
        self.db.record_write().await?;
        Ok(())
    }

    pub async fn set_published_url_en(&self, id: i32, url: &str) -> Result<(), DbError> {
        {
            let mut conn = self.db.conn().await;
            diesel::update(articles::table.find(id))
                .set((
                    articles::published_url_en.eq(Some(url)),
                    articles::updated_at.eq(Utc::now().to_rfc3339()),
                ))
                .execute(&mut *conn)
                .await?;
        }
        self.db.record_write().await?;
        Ok(())
    }

    /// Mark a row as pending (hidden from public reads) or published.
    pub async fn set_temp(&self, id: i32, is_temp: bool) -> Result<(), DbError> {
        {
            let mut conn = self.db.conn().await;
            diesel::update(articles::table.find(id))
                .set((
                    articles::is_temp.eq(is_temp),
                    articles::updated_at.eq(Utc::now().to_rfc3339()),
                ))
                .execute(&mut *conn)
                .await?;
        }
        self.db.record_write().await?;
        Ok(())
    }

    pub async fn count_by_language(&self) -> Result<Vec<(String, i64)>, DbError> {
        let mut conn = self.db.conn().await;
        articles::table
            .group_by(articles::language)
            .select((articles::language, count_star()))
            .order(articles::language.asc())
            .load::<(String, i64)>(&mut *conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardLayout, LayoutData, SliderLayout};

    fn da(url: &str) -> Article {
        let mut a = Article::new(Language::Da, "Titel", url);
        a.section = "samfund".into();
        a
    }

    #[tokio::test]
    async fn test_insert_and_find_by_url() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.articles();

        let mut article = da("https://www.sermitsiaq.ag/samfund/foo/1");
        article.layout_type = Some(LayoutType::OneFull);
        article.layout_data = Some(LayoutData::Card(CardLayout::default()));
        let outcome = repo.save(&mut article).await.unwrap();
        assert!(matches!(outcome, Upserted::Created(_)));
        assert!(article.id > 0);

        let found = repo
            .find_by_url("https://www.sermitsiaq.ag/samfund/foo/1", Language::Da)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, article.id);
        assert_eq!(found.layout_type, Some(LayoutType::OneFull));
        assert!(found.layout_data.is_some());
        assert!(repo
            .find_by_url("https://www.sermitsiaq.ag/samfund/foo/1", Language::Kl)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unique_collision_returns_existing() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.articles();

        let mut first = da("https://www.sermitsiaq.ag/samfund/foo/1");
        repo.save(&mut first).await.unwrap();

        let second = da("https://www.sermitsiaq.ag/samfund/foo/1");
        let outcome = repo.insert(&second).await.unwrap();
        assert_eq!(outcome, Upserted::Existing(first.id));
    }

    #[tokio::test]
    async fn test_slider_containers_share_empty_url() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.articles();

        for order in [2000, 4000] {
            let mut slider = Article::new(Language::Da, "Job", "");
            slider.layout_type = Some(LayoutType::JobSlider);
            slider.display_order = order;
            slider.is_home = true;
            slider.layout_data = Some(LayoutData::Slider(SliderLayout::default()));
            repo.save(&mut slider).await.unwrap();
        }

        let found = repo
            .find_slider(Language::Da, LayoutType::JobSlider, 4000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.display_order, 4000);
        assert!(found.is_slider_container());
    }

    #[tokio::test]
    async fn test_mismatched_layout_data_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.articles();

        let mut article = da("https://www.sermitsiaq.ag/samfund/foo/2");
        article.layout_type = Some(LayoutType::OneFull);
        article.layout_data = Some(LayoutData::Slider(SliderLayout::default()));
        assert!(repo.save(&mut article).await.is_err());
        assert_eq!(article.id, 0);

        article.layout_type = Some(LayoutType::Slider);
        repo.save(&mut article).await.unwrap();
        let found = repo.get(article.id).await.unwrap().unwrap();
        assert!(matches!(found.layout_data, Some(LayoutData::Slider(_))));
    }

    #[tokio::test]
    async fn test_reset_home_and_public_reads() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.articles();

        let mut visible = da("https://www.sermitsiaq.ag/samfund/a/1");
        visible.is_home = true;
        repo.save(&mut visible).await.unwrap();
        let mut temp = da("https://www.sermitsiaq.ag/samfund/b/2");
        temp.is_home = true;
        temp.is_temp = true;
        repo.save(&mut temp).await.unwrap();

        let public = repo.public_home(Language::Da).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, visible.id);
        assert_eq!(repo.home(Language::Da).await.unwrap().len(), 2);

        assert_eq!(repo.reset_home(Language::Da).await.unwrap(), 2);
        assert!(repo.home(Language::Da).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_image_id_ignores_prefix_matches() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.articles();

        let mut hit = da("https://www.sermitsiaq.ag/kultur/x/1");
        hit.image_data = Some(ImageData {
            desktop_webp: Some("https://image.sermitsiaq.ag/x.webp?imageId=9999".into()),
            ..Default::default()
        });
        repo.save(&mut hit).await.unwrap();

        let mut miss = da("https://www.sermitsiaq.ag/kultur/y/2");
        miss.image_data = Some(ImageData {
            desktop_webp: Some("https://image.sermitsiaq.ag/x.webp?imageId=99990".into()),
            ..Default::default()
        });
        repo.save(&mut miss).await.unwrap();

        let found = repo.find_by_image_id("9999", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, hit.id);
    }

    #[tokio::test]
    async fn test_missing_details_excludes_en_and_sliders() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.articles();

        let mut a = da("https://www.sermitsiaq.ag/samfund/a/1");
        repo.save(&mut a).await.unwrap();
        let mut b = da("https://www.sermitsiaq.ag/samfund/b/2");
        repo.save(&mut b).await.unwrap();
        let mut en = Article::new(Language::En, "T", "https://www.sermitsiaq.ag/samfund/a/1");
        en.canonical_id = Some(a.id);
        repo.save(&mut en).await.unwrap();
        let mut slider = Article::new(Language::Da, "S", "");
        slider.layout_type = Some(LayoutType::Slider);
        repo.save(&mut slider).await.unwrap();

        db.details()
            .save("https://www.sermitsiaq.ag/samfund/a/1", &[], Language::Da, None)
            .await
            .unwrap();

        let missing = repo.missing_details(None, None, None).await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, b.id);
    }
}
