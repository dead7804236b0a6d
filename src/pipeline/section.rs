//! Section listing and home crawls.

use tracing::{debug, info, warn};

use super::tracker::{CrawlSummary, CrawlTracker};
use super::{Pipeline, PipelineError};
use crate::extract::{extract_home_layout, parse_cards, ArticleCard, HomeLayout};
use crate::models::{CrawlType, Language, Section};
use crate::repository::DbError;
use crate::scrapers::{ScrollPolicy, CARD_SELECTOR};
use crate::services::linker::{link_languages, link_stored, relink_home, RelinkOptions};
use crate::services::translation::{backfill_published_urls, translate_article};

/// Selector present once the home grid has rendered.
pub const HOME_SELECTOR: &str = ".page-content";

impl<'a> Pipeline<'a> {
    fn page_url(&self, language: Language, section: Section) -> String {
        let base = self.sites.base_url(language).trim_end_matches('/');
        match section {
            Section::Home => format!("{}/", base),
            other => format!("{}{}", base, other.path()),
        }
    }

    /// Render the home page and extract its layout without storing it.
    pub async fn fetch_home_layout(
        &self,
        language: Language,
        max_articles: usize,
    ) -> Result<HomeLayout, PipelineError> {
        let url = self.page_url(language, Section::Home);
        let html = self
            .renderer
            .fetch_rendered(&url, HOME_SELECTOR, ScrollPolicy::from_max(max_articles))
            .await?;
        let mut layout = extract_home_layout(&html, self.sites.base_url(language));
        if max_articles > 0 && layout.items.len() > max_articles {
            layout.items.truncate(max_articles);
        }
        info!(
            "Extracted {} home slots in {} rows from {}",
            layout.items.len(),
            layout.row_count(),
            url
        );
        Ok(layout)
    }

    /// Crawl one section listing (or the home layout) in one language.
    pub async fn crawl_section(
        &self,
        section: Section,
        language: Language,
        max_articles: usize,
    ) -> Result<CrawlSummary, PipelineError> {
        if section == Section::Home {
            return self.crawl_home(language, max_articles).await;
        }

        let mut tracker =
            CrawlTracker::start(self.db, CrawlType::Section, Some(section.as_str())).await?;
        let run = self
            .run_section(section, language, max_articles, &mut tracker)
            .await;
        tracker.close(run).await
    }

    /// Body of a section crawl. Returns whether it was cancelled.
    async fn run_section(
        &self,
        section: Section,
        language: Language,
        max_articles: usize,
        tracker: &mut CrawlTracker<'_>,
    ) -> Result<bool, PipelineError> {
        let url = self.page_url(language, section);
        let html = self
            .renderer
            .fetch_rendered(&url, CARD_SELECTOR, ScrollPolicy::from_max(max_articles))
            .await?;

        let mut cards = parse_cards(&html, self.sites.base_url(language));
        if max_articles > 0 {
            cards.truncate(max_articles);
        }
        tracker.crawled(cards.len());
        info!("Found {} cards on {}", cards.len(), url);

        self.db.begin_batch().await?;
        for card in &cards {
            if self.cancel.is_cancelled() {
                return Ok(true);
            }
            if let Err(e) = self.store_card(card, language, tracker).await {
                tracker.error(format!("{}: {}", card.url, e));
            }
        }

        self.after_crawl(Some(section.as_str()), language, tracker)
            .await;
        Ok(self.cancel.is_cancelled())
    }

    /// Upsert one listing card, then create its EN sibling for DA.
    async fn store_card(
        &self,
        card: &ArticleCard,
        language: Language,
        tracker: &mut CrawlTracker<'_>,
    ) -> Result<(), DbError> {
        let existing = self.db.articles().find_by_url(&card.url, language).await?;
        let mut article = card.merge_into(existing, language);
        if article.category_id.is_none() {
            article.category_id = self
                .db
                .categories()
                .by_slug(&article.section)
                .await?
                .map(|c| c.id);
        }
        if language == Language::Da && article.id == 0 {
            // Hidden from public reads until the detail crawl stores its body.
            article.is_temp = self
                .db
                .details()
                .get(&article.published_url, Language::Da)
                .await?
                .is_none();
        }
        if let Some(assets) = self.assets {
            assets.localize_article(&mut article).await;
        }
        let outcome = self.db.articles().save(&mut article).await?;
        tracker.record(outcome);

        if language == Language::Da {
            if let Some(service) = self.translator {
                match translate_article(service, self.db, &article).await {
                    Ok(translated) if translated.is_new() => {
                        debug!("Created EN for {}", article.published_url);
                    }
                    Ok(_) => {}
                    Err(e) => tracker.error(format!("en {}: {}", article.published_url, e)),
                }
            }
        }
        Ok(())
    }

    /// Link DA/KL and fill translated URLs after a crawl.
    async fn after_crawl(
        &self,
        section: Option<&str>,
        language: Language,
        tracker: &mut CrawlTracker<'_>,
    ) {
        match link_stored(self.db, section).await {
            Ok(report) if !report.unmatched_kl.is_empty() => debug!(
                "{} KL articles without a DA match",
                report.unmatched_kl.len()
            ),
            Ok(_) => {}
            Err(e) => tracker.error(format!("linking: {}", e)),
        }

        if language != Language::Da {
            return;
        }
        if let Some(service) = self.string_service() {
            if let Err(e) =
                backfill_published_urls(&service, self.db, Language::En, None, false, &self.cancel)
                    .await
            {
                tracker.error(format!("url translation: {}", e));
            }
        }
    }

    /// Render the home page and replay its layout onto stored rows.
    pub async fn crawl_home(
        &self,
        language: Language,
        max_articles: usize,
    ) -> Result<CrawlSummary, PipelineError> {
        let mut tracker =
            CrawlTracker::start(self.db, CrawlType::Home, Some(Section::Home.as_str())).await?;
        let run = self.run_home(language, max_articles, &mut tracker).await;
        tracker.close(run).await
    }

    /// Body of a home crawl. Returns whether it was cancelled.
    async fn run_home(
        &self,
        language: Language,
        max_articles: usize,
        tracker: &mut CrawlTracker<'_>,
    ) -> Result<bool, PipelineError> {
        let layout = self.fetch_home_layout(language, max_articles).await?;
        tracker.crawled(layout.items.len());
        if layout.items.is_empty() {
            warn!("Home page for {} produced no layout items", language);
            tracker.error("empty home layout");
            return Ok(false);
        }
        if self.cancel.is_cancelled() {
            return Ok(true);
        }

        self.db.begin_batch().await?;
        let options = RelinkOptions {
            cancel: self.cancel.clone(),
            ..Default::default()
        };
        let report = relink_home(
            self.db,
            &layout,
            language,
            options,
            self.assets,
            self.translator,
        )
        .await?;
        tracker.add_created(report.created);
        tracker.add_updated(report.updated);
        for error in report.errors {
            tracker.error(error);
        }
        if report.cancelled {
            return Ok(true);
        }

        self.db.begin_batch().await?;
        let da_home = self.db.articles().home(Language::Da).await?;
        let kl_home = self.db.articles().home(Language::Kl).await?;
        if let Err(e) = link_languages(self.db, &da_home, &kl_home).await {
            tracker.error(format!("linking home: {}", e));
        }
        self.after_crawl(None, language, tracker).await;
        Ok(self.cancel.is_cancelled())
    }

    /// Crawl every crawlable section in both source languages, DA first.
    pub async fn crawl_all(
        &self,
        max_articles: usize,
    ) -> Vec<(Section, Language, Result<CrawlSummary, PipelineError>)> {
        let mut results = Vec::new();
        for section in Section::CRAWLABLE {
            for language in [Language::Da, Language::Kl] {
                if self.cancel.is_cancelled() {
                    return results;
                }
                let result = self.crawl_section(section, language, max_articles).await;
                results.push((section, language, result));
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::models::{CrawlStatus, LayoutType};
    use crate::pipeline::CancelFlag;
    use crate::repository::Database;
    use crate::scrapers::{BrowserError, PageRenderer};
    use crate::services::translation::testing::FakeTranslator;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticRenderer(HashMap<String, String>);

    #[async_trait]
    impl PageRenderer for StaticRenderer {
        async fn fetch_rendered(
            &self,
            url: &str,
            _wait_for: &str,
            _scroll: ScrollPolicy,
        ) -> Result<String, BrowserError> {
            self.0.get(url).cloned().ok_or_else(|| BrowserError::Navigation {
                url: url.to_string(),
                message: "not found".into(),
            })
        }
    }

    fn listing(prefix: &str, ids: &[u32]) -> String {
        let cards: String = ids
            .iter()
            .map(|id| {
                format!(
                    r#"<article data-element-guid="g{id}" data-instance="i{id}">
                         <a itemprop="url" href="/sport/{prefix}-{id}/{id}"><h2 class="headline">{prefix} {id}</h2></a>
                       </article>"#
                )
            })
            .collect();
        format!("<html><body>{}</body></html>", cards)
    }

    #[tokio::test]
    async fn test_section_crawl_links_and_translates() {
        let sites = SiteConfig::default();
        let mut pages = HashMap::new();
        pages.insert(
            "https://www.sermitsiaq.ag/sport".to_string(),
            listing("kamp", &[1, 2, 3]),
        );
        pages.insert(
            "https://kl.sermitsiaq.ag/sport".to_string(),
            listing("kamp", &[2]),
        );
        let renderer = StaticRenderer(pages);
        let db = Database::in_memory().await.unwrap();
        db.categories().seed().await.unwrap();
        let service = FakeTranslator::default().service();
        let pipeline = Pipeline::new(&db, &renderer, &sites).with_translator(Some(&service));

        let da = pipeline
            .crawl_section(Section::Sport, Language::Da, 2)
            .await
            .unwrap();
        assert_eq!(da.status, CrawlStatus::Success);
        assert_eq!(da.counts.crawled, 2);
        assert_eq!(da.counts.created, 2);

        let kl = pipeline
            .crawl_section(Section::Sport, Language::Kl, 0)
            .await
            .unwrap();
        assert_eq!(kl.counts.created, 1);

        let kl_row = db
            .articles()
            .find_by_url("https://kl.sermitsiaq.ag/sport/kamp-2/2", Language::Kl)
            .await
            .unwrap()
            .unwrap();
        let da_row = db
            .articles()
            .find_by_url("https://www.sermitsiaq.ag/sport/kamp-2/2", Language::Da)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kl_row.canonical_id, Some(da_row.id));
        assert!(da_row.category_id.is_some());

        let en = db
            .articles()
            .find_by_url(&da_row.published_url, Language::En)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(en.canonical_id, Some(da_row.id));
        assert_eq!(
            en.published_url_en.as_deref(),
            Some("https://www.sermitsiaq.ag/sport/kamp-2/2")
        );
    }

    #[tokio::test]
    async fn test_render_failure_is_logged_and_fatal() {
        let sites = SiteConfig::default();
        let renderer = StaticRenderer(HashMap::new());
        let db = Database::in_memory().await.unwrap();
        let pipeline = Pipeline::new(&db, &renderer, &sites);

        let err = pipeline
            .crawl_section(Section::Kultur, Language::Da, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Browser(_)));
        let logs = db.crawl_logs().recent(1).await.unwrap();
        assert_eq!(logs[0].status, CrawlStatus::Failed);
        assert!(logs[0].errors.as_deref().unwrap().contains("/kultur"));
    }

    #[tokio::test]
    async fn test_home_crawl_places_layout() {
        let sites = SiteConfig::default();
        let home = r#"<html><body><div class="page-content">
            <div class="row">
              <article data-element-guid="a" class="large-6"><a itemprop="url" href="/samfund/a/1"><h2 class="headline">A</h2></a></article>
              <article data-element-guid="b" class="large-6"><a itemprop="url" href="/kultur/b/2"><h2 class="headline">B</h2></a></article>
            </div></div></body></html>"#;
        let mut pages = HashMap::new();
        pages.insert("https://www.sermitsiaq.ag/".to_string(), home.to_string());
        let renderer = StaticRenderer(pages);
        let db = Database::in_memory().await.unwrap();
        let pipeline = Pipeline::new(&db, &renderer, &sites);

        let summary = pipeline
            .crawl_section(Section::Home, Language::Da, 0)
            .await
            .unwrap();
        assert_eq!(summary.status, CrawlStatus::Success);
        let placed = db.articles().home(Language::Da).await.unwrap();
        assert_eq!(placed.len(), 2);
        assert!(placed
            .iter()
            .all(|a| a.layout_type == Some(LayoutType::TwoArticles)));
        assert_eq!(
            placed.iter().map(|a| a.display_order).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[tokio::test]
    async fn test_database_error_closes_log_and_batch() {
        use diesel_async::SimpleAsyncConnection;

        let sites = SiteConfig::default();
        let home = r#"<html><body><div class="page-content"><div class="row">
            <article data-element-guid="a" class="large-12"><a itemprop="url" href="/samfund/a/1"><h2 class="headline">A</h2></a></article>
            </div></div></body></html>"#;
        let mut pages = HashMap::new();
        pages.insert("https://www.sermitsiaq.ag/".to_string(), home.to_string());
        let renderer = StaticRenderer(pages);
        let db = Database::in_memory().await.unwrap();
        db.conn()
            .await
            .batch_execute("DROP TABLE articles")
            .await
            .unwrap();
        let pipeline = Pipeline::new(&db, &renderer, &sites);

        let err = pipeline.crawl_home(Language::Da, 0).await.unwrap_err();
        assert!(matches!(err, PipelineError::Database(_)));
        let log = db.crawl_logs().recent(1).await.unwrap().remove(0);
        assert_eq!(log.status, CrawlStatus::Failed);
        assert!(log.completed_at.is_some());
        assert!(log.errors.unwrap().contains("articles"));
        // The batch was committed, so no transaction is left open.
        assert!(db.conn().await.batch_execute("COMMIT").await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_before_relink_writes_nothing() {
        let sites = SiteConfig::default();
        let home = r#"<html><body><div class="page-content"><div class="row">
            <article data-element-guid="a" class="large-12"><a itemprop="url" href="/samfund/a/1"><h2 class="headline">A</h2></a></article>
            </div></div></body></html>"#;
        let mut pages = HashMap::new();
        pages.insert("https://www.sermitsiaq.ag/".to_string(), home.to_string());
        let renderer = StaticRenderer(pages);
        let db = Database::in_memory().await.unwrap();
        let cancel = CancelFlag::new();
        let pipeline = Pipeline::new(&db, &renderer, &sites).with_cancel(cancel.clone());
        cancel.cancel();

        let summary = pipeline.crawl_home(Language::Da, 0).await.unwrap();
        assert_eq!(summary.status, CrawlStatus::Failed);
        assert_eq!(summary.written(), 0);
        assert!(db.articles().home(Language::Da).await.unwrap().is_empty());
        let log = db.crawl_logs().get(summary.log_id).await.unwrap().unwrap();
        assert_eq!(log.errors.as_deref(), Some("cancelled"));
    }
}
