//! Article detail repository and the cross-language detail lookup.

use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use tracing::debug;

use super::models::{ArticleDetailRecord, NewArticleDetail};
use super::pool::{Database, DbError};
use super::util::parse_datetime;
use crate::models::{Article, ArticleDetail, ContentBlock, ImageVariants, Language};
use crate::schema::article_details;
use crate::utils::url::convert_host;

impl From<ArticleDetailRecord> for ArticleDetail {
    fn from(record: ArticleDetailRecord) -> Self {
        let content_blocks = match serde_json::from_str(&record.content_blocks) {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::warn!(
                    "Undecodable content_blocks for {} ({}): {}",
                    record.published_url,
                    record.language,
                    e
                );
                Vec::new()
            }
        };
        ArticleDetail {
            id: record.id,
            published_url: record.published_url,
            language: Language::from_str(&record.language).unwrap_or_default(),
            element_guid: record.element_guid,
            content_blocks,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

pub struct ArticleDetailRepository<'a> {
    db: &'a Database,
}

impl<'a> ArticleDetailRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn get(
        &self,
        published_url: &str,
        language: Language,
    ) -> Result<Option<ArticleDetail>, DbError> {
        let mut conn = self.db.conn().await;
        article_details::table
            .filter(article_details::published_url.eq(published_url))
            .filter(article_details::language.eq(language.as_str()))
            .select(ArticleDetailRecord::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map(|r| r.map(ArticleDetail::from))
    }

    /// Insert or replace the blocks stored for `(published_url, language)`.
    pub async fn save(
        &self,
        published_url: &str,
        blocks: &[ContentBlock],
        language: Language,
        element_guid: Option<&str>,
    ) -> Result<ArticleDetail, DbError> {
        let json = serde_json::to_string(blocks).map_err(super::util::to_diesel_error)?;
        let now = Utc::now().to_rfc3339();
        let new = NewArticleDetail {
            published_url,
            language: language.as_str(),
            element_guid,
            content_blocks: &json,
            created_at: &now,
            updated_at: &now,
        };

        let record = {
            let mut conn = self.db.conn().await;
            diesel::insert_into(article_details::table)
                .values(&new)
                .on_conflict((article_details::published_url, article_details::language))
                .do_update()
                .set((
                    article_details::content_blocks.eq(excluded(article_details::content_blocks)),
                    article_details::element_guid.eq(excluded(article_details::element_guid)),
                    article_details::updated_at.eq(excluded(article_details::updated_at)),
                ))
                .returning(ArticleDetailRecord::as_returning())
                .get_result(&mut *conn)
                .await?
        };
        self.db.record_write().await?;
        Ok(ArticleDetail::from(record))
    }

    /// Write back the block list of an existing detail.
    pub async fn update_blocks(&self, id: i32, blocks: &[ContentBlock]) -> Result<(), DbError> {
        let json = serde_json::to_string(blocks).map_err(super::util::to_diesel_error)?;
        {
            let mut conn = self.db.conn().await;
            diesel::update(article_details::table.find(id))
                .set((
                    article_details::content_blocks.eq(json),
                    article_details::updated_at.eq(Utc::now().to_rfc3339()),
                ))
                .execute(&mut *conn)
                .await?;
        }
        self.db.record_write().await?;
        Ok(())
    }

    /// Find the detail to show for `article` in `language`.
    ///
    /// Tries, in order: the exact URL; the URL moved onto the host serving
    /// `language`; the URL of another article sharing an image id; and
    /// finally the same chain in Danish.
    pub async fn find_for_article(
        &self,
        article: &Article,
        language: Language,
    ) -> Result<Option<ArticleDetail>, DbError> {
        if let Some(detail) = self.lookup_chain(article, language).await? {
            return Ok(Some(detail));
        }
        if language != Language::Da {
            debug!(
                "No {} detail for {}, falling back to da",
                language, article.published_url
            );
            return self.lookup_chain(article, Language::Da).await;
        }
        Ok(None)
    }

    async fn lookup_chain(
        &self,
        article: &Article,
        language: Language,
    ) -> Result<Option<ArticleDetail>, DbError> {
        if let Some(detail) = self.lookup_url(&article.published_url, language).await? {
            return Ok(Some(detail));
        }

        let image_id = article.image_data.as_ref().and_then(|img| img.image_id());
        if let Some(image_id) = image_id {
            let candidates = self.db.articles().find_by_image_id(&image_id, None).await?;
            for other in candidates.iter().filter(|a| a.id != article.id) {
                if let Some(detail) = self.lookup_url(&other.published_url, language).await? {
                    debug!(
                        "Matched detail for {} via image id {} ({})",
                        article.published_url, image_id, other.published_url
                    );
                    return Ok(Some(detail));
                }
            }
        }

        Ok(None)
    }

    /// Exact URL, then the URL converted onto the host serving `language`.
    async fn lookup_url(
        &self,
        url: &str,
        language: Language,
    ) -> Result<Option<ArticleDetail>, DbError> {
        if url.is_empty() {
            return Ok(None);
        }
        if let Some(detail) = self.get(url, language).await? {
            return Ok(Some(detail));
        }
        match convert_host(url, language) {
            Some(converted) if converted != url => self.get(&converted, language).await,
            _ => Ok(None),
        }
    }

    pub async fn count_by_language(&self) -> Result<Vec<(String, i64)>, DbError> {
        let mut conn = self.db.conn().await;
        article_details::table
            .group_by(article_details::language)
            .select((article_details::language, count_star()))
            .order(article_details::language.asc())
            .load::<(String, i64)>(&mut *conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockKind, ImageData, TextBlock};

    fn paragraph(order: usize, text: &str) -> ContentBlock {
        ContentBlock::new(
            order,
            BlockKind::Paragraph(TextBlock { text: text.into() }),
            format!("<p>{}</p>", text),
        )
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.details();
        let url = "https://www.sermitsiaq.ag/kultur/x/1";

        let first = repo
            .save(url, &[paragraph(0, "a")], Language::Da, Some("G1"))
            .await
            .unwrap();
        let second = repo
            .save(url, &[paragraph(0, "b"), paragraph(1, "c")], Language::Da, Some("G1"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let stored = repo.get(url, Language::Da).await.unwrap().unwrap();
        assert_eq!(stored.content_blocks.len(), 2);
        assert_eq!(
            repo.count_by_language().await.unwrap(),
            vec![("da".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_lookup_via_converted_host() {
        let db = Database::in_memory().await.unwrap();
        db.details()
            .save(
                "https://kl.sermitsiaq.ag/kultur/x/1",
                &[paragraph(0, "kl")],
                Language::Kl,
                None,
            )
            .await
            .unwrap();

        let article = Article::new(Language::Kl, "x", "https://www.sermitsiaq.ag/kultur/x/1");
        let found = db
            .details()
            .find_for_article(&article, Language::Kl)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.language, Language::Kl);
    }

    #[tokio::test]
    async fn test_lookup_via_image_id_then_danish() {
        let db = Database::in_memory().await.unwrap();
        let da_url = "https://www.sermitsiaq.ag/kultur/x/1";
        db.details()
            .save(da_url, &[paragraph(0, "da")], Language::Da, None)
            .await
            .unwrap();

        let image = ImageData {
            desktop_webp: Some("https://image.sermitsiaq.ag/a.webp?imageId=9999".into()),
            ..Default::default()
        };
        let mut da = Article::new(Language::Da, "x", da_url);
        da.image_data = Some(image.clone());
        db.articles().save(&mut da).await.unwrap();

        let mut kl = Article::new(Language::Kl, "y", "https://kl.sermitsiaq.ag/kultur/y/7");
        kl.image_data = Some(image);
        db.articles().save(&mut kl).await.unwrap();

        let found = db
            .details()
            .find_for_article(&kl, Language::Kl)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.published_url, da_url);
        assert_eq!(found.language, Language::Da);
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let db = Database::in_memory().await.unwrap();
        let article = Article::new(Language::Da, "x", "https://www.sermitsiaq.ag/a/1");
        assert!(db
            .details()
            .find_for_article(&article, Language::Da)
            .await
            .unwrap()
            .is_none());
    }
}
