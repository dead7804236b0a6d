//! Detail crawl: render stored article pages and store their blocks.

use indicatif::ProgressBar;
use tracing::{debug, info};

use super::tracker::{CrawlSummary, CrawlTracker};
use super::{Pipeline, PipelineError};
use crate::extract::parse_html_content;
use crate::models::{Article, ContentBlock, CrawlType, Language};
use crate::repository::DbError;
use crate::scrapers::ScrollPolicy;
use crate::services::translation::{translate_article, translate_content_blocks};

/// Selector an article page must show before it is parsed.
pub const DETAIL_SELECTOR: &str = "h1";

/// Which stored rows a detail crawl visits.
#[derive(Debug, Clone, Default)]
pub struct DetailOptions {
    pub language: Option<Language>,
    pub section: Option<String>,
    pub limit: Option<i64>,
    /// Produce the EN detail for DA pages.
    pub translate: bool,
}

impl<'a> Pipeline<'a> {
    /// Render and parse every stored article that lacks a detail.
    pub async fn crawl_details(
        &self,
        options: &DetailOptions,
        progress: &ProgressBar,
    ) -> Result<CrawlSummary, PipelineError> {
        let mut tracker =
            CrawlTracker::start(self.db, CrawlType::Incremental, options.section.as_deref())
                .await?;
        let run = self.run_details(options, progress, &mut tracker).await;
        tracker.close(run).await
    }

    /// Body of a detail crawl. Returns whether it was cancelled.
    async fn run_details(
        &self,
        options: &DetailOptions,
        progress: &ProgressBar,
        tracker: &mut CrawlTracker<'_>,
    ) -> Result<bool, PipelineError> {
        let targets = self
            .db
            .articles()
            .missing_details(options.language, options.section.as_deref(), options.limit)
            .await?;
        info!("{} articles without details", targets.len());
        progress.set_length(targets.len() as u64);

        self.db.begin_batch().await?;
        for article in &targets {
            if self.cancel.is_cancelled() {
                return Ok(true);
            }
            progress.set_message(article.title.clone());
            tracker.crawled(1);

            let html = match self
                .renderer
                .fetch_rendered(&article.published_url, DETAIL_SELECTOR, ScrollPolicy::None)
                .await
            {
                Ok(html) => html,
                Err(e) if e.is_transient() => {
                    tracker.error(format!("{}: {}", article.published_url, e));
                    progress.inc(1);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match self.store_detail(article, &html, options).await {
                Ok(true) => tracker.add_created(1),
                Ok(false) => {
                    tracker.error(format!("{}: no content blocks", article.published_url))
                }
                Err(e) => tracker.error(format!("{}: {}", article.published_url, e)),
            }
            progress.inc(1);
        }
        Ok(false)
    }

    /// Parse, localize and save one page. `false` when nothing was parsed.
    async fn store_detail(
        &self,
        article: &Article,
        html: &str,
        options: &DetailOptions,
    ) -> Result<bool, DbError> {
        let mut blocks = parse_html_content(html);
        if blocks.is_empty() {
            return Ok(false);
        }
        if let Some(assets) = self.assets {
            assets.localize_blocks(&mut blocks).await;
        }
        self.db
            .details()
            .save(
                &article.published_url,
                &blocks,
                article.language,
                article.element_guid.as_deref(),
            )
            .await?;
        debug!(
            "Stored {} blocks for {}",
            blocks.len(),
            article.published_url
        );
        if article.is_temp {
            self.db.articles().set_temp(article.id, false).await?;
        }

        if options.translate && article.language == Language::Da {
            self.translate_detail(article, &blocks).await?;
        }
        Ok(true)
    }

    /// Store the EN blocks next to a DA detail and make sure the EN row exists.
    async fn translate_detail(
        &self,
        article: &Article,
        blocks: &[ContentBlock],
    ) -> Result<(), DbError> {
        let (Some(articles), Some(strings)) = (self.translator, self.string_service()) else {
            return Ok(());
        };
        if self
            .db
            .details()
            .get(&article.published_url, Language::En)
            .await?
            .is_none()
        {
            let translated = translate_content_blocks(&strings, blocks).await;
            self.db
                .details()
                .save(
                    &article.published_url,
                    &translated,
                    Language::En,
                    article.element_guid.as_deref(),
                )
                .await?;
        }
        if let Err(e) = translate_article(articles, self.db, article).await {
            debug!("No EN row for {}: {}", article.published_url, e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::models::CrawlStatus;
    use crate::repository::Database;
    use crate::scrapers::{BrowserError, PageRenderer};
    use crate::services::translation::testing::FakeTranslator;
    use async_trait::async_trait;

    const PAGE: &str = r#"<html><body>
        <div class="articleHeader"><h1 class="headline mainTitle">Ny havn</h1></div>
        <div class="bodytext"><p>Havnen åbner i dag.</p></div>
        </body></html>"#;

    /// Serves `PAGE`, times out on URLs containing "slow", refuses "auth".
    struct FakeRenderer;

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn fetch_rendered(
            &self,
            url: &str,
            _wait_for: &str,
            scroll: ScrollPolicy,
        ) -> Result<String, BrowserError> {
            assert_eq!(scroll, ScrollPolicy::None);
            if url.contains("slow") {
                Err(BrowserError::Timeout(url.to_string()))
            } else if url.contains("auth") {
                Err(BrowserError::AuthFailed("logged out".into()))
            } else {
                Ok(PAGE.to_string())
            }
        }
    }

    async fn seed(db: &Database, language: Language, path: &str) -> Article {
        let mut article = Article::new(
            language,
            "Ny havn",
            format!("https://www.sermitsiaq.ag{}", path),
        );
        article.section = "samfund".into();
        db.articles().save(&mut article).await.unwrap();
        article
    }

    #[tokio::test]
    async fn test_details_stored_and_translated() {
        let db = Database::in_memory().await.unwrap();
        let da = seed(&db, Language::Da, "/samfund/ny-havn/1").await;
        seed(&db, Language::Da, "/samfund/slow-side/2").await;
        let sites = SiteConfig::default();
        let service = FakeTranslator::default().service();
        let pipeline = Pipeline::new(&db, &FakeRenderer, &sites).with_translator(Some(&service));

        let options = DetailOptions {
            translate: true,
            ..Default::default()
        };
        let summary = pipeline
            .crawl_details(&options, &ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(summary.status, CrawlStatus::Partial);
        assert_eq!(summary.counts.crawled, 2);
        assert_eq!(summary.counts.created, 1);

        let detail = db
            .details()
            .get(&da.published_url, Language::Da)
            .await
            .unwrap()
            .unwrap();
        assert!(!detail.content_blocks.is_empty());
        let en = db
            .details()
            .get(&da.published_url, Language::En)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(en.content_blocks.len(), detail.content_blocks.len());
        assert!(db
            .articles()
            .find_sibling(&da, Language::En)
            .await
            .unwrap()
            .is_some());

        // Stored details are not visited again.
        let again = db.articles().missing_details(None, None, None).await.unwrap();
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_aborts_run() {
        let db = Database::in_memory().await.unwrap();
        seed(&db, Language::Kl, "/samfund/auth/3").await;
        let sites = SiteConfig::default();
        let pipeline = Pipeline::new(&db, &FakeRenderer, &sites);

        let err = pipeline
            .crawl_details(&DetailOptions::default(), &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Browser(BrowserError::AuthFailed(_))
        ));
        let log = db.crawl_logs().recent(1).await.unwrap().remove(0);
        assert_eq!(log.status, CrawlStatus::Failed);
    }

    #[tokio::test]
    async fn test_database_error_fails_log() {
        use diesel_async::SimpleAsyncConnection;

        let db = Database::in_memory().await.unwrap();
        seed(&db, Language::Da, "/samfund/ny-havn/1").await;
        db.conn()
            .await
            .batch_execute("DROP TABLE article_details")
            .await
            .unwrap();
        let sites = SiteConfig::default();
        let pipeline = Pipeline::new(&db, &FakeRenderer, &sites);

        let err = pipeline
            .crawl_details(&DetailOptions::default(), &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Database(_)));
        let log = db.crawl_logs().recent(1).await.unwrap().remove(0);
        assert_eq!(log.status, CrawlStatus::Failed);
        assert!(log.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_stored_detail_publishes_temp_row() {
        let db = Database::in_memory().await.unwrap();
        let article = seed(&db, Language::Da, "/samfund/ny-havn/1").await;
        db.articles().set_temp(article.id, true).await.unwrap();
        let sites = SiteConfig::default();
        let pipeline = Pipeline::new(&db, &FakeRenderer, &sites);

        pipeline
            .crawl_details(&DetailOptions::default(), &ProgressBar::hidden())
            .await
            .unwrap();
        let stored = db.articles().get(article.id).await.unwrap().unwrap();
        assert!(!stored.is_temp);
    }
}
