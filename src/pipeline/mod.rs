//! The two crawl pipelines.
//!
//! - `section`: listing pages and the home layout, card-level rows
//! - `detail`: article bodies for stored rows without a detail
//!
//! A [`Pipeline`] borrows the process-scoped values (database, renderer,
//! asset fetcher, translator) for one run. Every run is recorded as a
//! CrawlLog through [`CrawlTracker`].

mod detail;
mod section;
mod tracker;

pub use crate::utils::CancelFlag;
pub use detail::{DetailOptions, DETAIL_SELECTOR};
pub use tracker::{CrawlSummary, CrawlTracker};

use std::time::Duration;

use thiserror::Error;

use crate::config::SiteConfig;
use crate::repository::{Database, DbError};
use crate::scrapers::{BrowserError, PageRenderer};
use crate::services::{AssetFetcher, TranslationService};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Everything one pipeline run works with.
pub struct Pipeline<'a> {
    pub db: &'a Database,
    pub renderer: &'a dyn PageRenderer,
    pub sites: &'a SiteConfig,
    /// `None` keeps upstream image URLs.
    pub assets: Option<&'a AssetFetcher>,
    /// `None` skips EN creation.
    pub translator: Option<&'a TranslationService>,
    /// Throttle for block and URL translation, shorter than the article one.
    pub string_delay: Duration,
    pub cancel: CancelFlag,
}

impl<'a> Pipeline<'a> {
    pub fn new(db: &'a Database, renderer: &'a dyn PageRenderer, sites: &'a SiteConfig) -> Self {
        Self {
            db,
            renderer,
            sites,
            assets: None,
            translator: None,
            string_delay: Duration::from_millis(300),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_assets(mut self, assets: Option<&'a AssetFetcher>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_translator(mut self, translator: Option<&'a TranslationService>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_string_delay(mut self, delay: Duration) -> Self {
        self.string_delay = delay;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    fn string_service(&self) -> Option<TranslationService> {
        self.translator.map(|s| s.with_delay(self.string_delay))
    }
}
