//! CrawlLog bookkeeping for one pipeline run.

use tracing::{info, warn};

use super::PipelineError;
use crate::models::{CrawlStatus, CrawlType};
use crate::repository::{CrawlCounts, Database, DbError, Upserted};

/// Error strings kept on the CrawlLog row.
const MAX_LOGGED_ERRORS: usize = 10;

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub log_id: i32,
    pub status: CrawlStatus,
    pub counts: CrawlCounts,
    pub errors: usize,
}

impl CrawlSummary {
    /// Rows created or updated.
    pub fn written(&self) -> usize {
        (self.counts.created + self.counts.updated).max(0) as usize
    }

    /// A run fails the command only when it committed nothing.
    pub fn is_fatal(&self) -> bool {
        self.status == CrawlStatus::Failed && self.written() == 0
    }
}

/// Counts and errors of a running crawl, closed with [`CrawlTracker::finish`].
pub struct CrawlTracker<'a> {
    db: &'a Database,
    log_id: i32,
    counts: CrawlCounts,
    errors: Vec<String>,
}

impl<'a> CrawlTracker<'a> {
    /// Open a `running` CrawlLog.
    pub async fn start(
        db: &'a Database,
        crawl_type: CrawlType,
        section: Option<&str>,
    ) -> Result<Self, DbError> {
        let log = db.crawl_logs().start(crawl_type, section).await?;
        info!(
            "Crawl {} started ({} {})",
            log.id,
            crawl_type.as_str(),
            section.unwrap_or("-")
        );
        Ok(Self {
            db,
            log_id: log.id,
            counts: CrawlCounts::default(),
            errors: Vec::new(),
        })
    }

    pub fn log_id(&self) -> i32 {
        self.log_id
    }

    pub fn crawled(&mut self, n: usize) {
        self.counts.crawled += i32::try_from(n).unwrap_or(i32::MAX);
    }

    pub fn record(&mut self, outcome: Upserted) {
        match outcome {
            Upserted::Created(_) => self.counts.created += 1,
            Upserted::Updated(_) | Upserted::Existing(_) => self.counts.updated += 1,
        }
    }

    pub fn add_created(&mut self, n: usize) {
        self.counts.created += i32::try_from(n).unwrap_or(i32::MAX);
    }

    pub fn add_updated(&mut self, n: usize) {
        self.counts.updated += i32::try_from(n).unwrap_or(i32::MAX);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.errors.push(message);
    }

    pub fn written(&self) -> usize {
        (self.counts.created + self.counts.updated).max(0) as usize
    }

    /// Status a run ends with given what was recorded.
    pub fn status(&self, cancelled: bool) -> CrawlStatus {
        if cancelled {
            CrawlStatus::Failed
        } else if self.errors.is_empty() {
            CrawlStatus::Success
        } else if self.written() > 0 {
            CrawlStatus::Partial
        } else {
            CrawlStatus::Failed
        }
    }

    /// Commit outstanding writes and close the CrawlLog.
    pub async fn finish(self, cancelled: bool) -> Result<CrawlSummary, DbError> {
        self.db.flush().await?;
        let status = self.status(cancelled);
        let mut logged: Vec<&str> = self
            .errors
            .iter()
            .take(MAX_LOGGED_ERRORS)
            .map(String::as_str)
            .collect();
        if cancelled {
            logged.insert(0, "cancelled");
            logged.truncate(MAX_LOGGED_ERRORS);
        }
        let errors = (!logged.is_empty()).then(|| logged.join("\n"));

        self.db
            .crawl_logs()
            .finish(self.log_id, status, &self.counts, errors.as_deref())
            .await?;
        info!(
            "Crawl {} {} ({} crawled, {} created, {} updated, {} errors)",
            self.log_id,
            status.as_str(),
            self.counts.crawled,
            self.counts.created,
            self.counts.updated,
            self.errors.len()
        );
        Ok(CrawlSummary {
            log_id: self.log_id,
            status,
            counts: self.counts,
            errors: self.errors.len(),
        })
    }

    /// Record a terminal error and close the log.
    pub async fn abort(mut self, error: impl Into<String>) -> Result<CrawlSummary, DbError> {
        self.error(error);
        self.finish(false).await
    }

    /// Close the log with the outcome of a run body.
    ///
    /// `Ok(cancelled)` finishes normally. An error aborts the log, which
    /// also commits the open batch, and is handed back to the caller.
    pub async fn close(
        self,
        run: Result<bool, PipelineError>,
    ) -> Result<CrawlSummary, PipelineError> {
        match run {
            Ok(cancelled) => Ok(self.finish(cancelled).await?),
            Err(e) => {
                self.abort(e.to_string()).await?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_rules_and_error_cap() {
        let db = Database::in_memory().await.unwrap();
        let mut tracker = CrawlTracker::start(&db, CrawlType::Section, Some("sport"))
            .await
            .unwrap();
        assert_eq!(tracker.status(false), CrawlStatus::Success);
        tracker.error("first");
        assert_eq!(tracker.status(false), CrawlStatus::Failed);
        tracker.record(Upserted::Created(1));
        assert_eq!(tracker.status(false), CrawlStatus::Partial);
        assert_eq!(tracker.status(true), CrawlStatus::Failed);

        for i in 0..15 {
            tracker.error(format!("e{}", i));
        }
        tracker.crawled(3);
        let summary = tracker.finish(false).await.unwrap();
        assert_eq!(summary.status, CrawlStatus::Partial);
        assert!(!summary.is_fatal());
        assert_eq!(summary.errors, 16);

        let log = db.crawl_logs().get(summary.log_id).await.unwrap().unwrap();
        assert_eq!(log.status, CrawlStatus::Partial);
        assert_eq!(log.articles_crawled, 3);
        assert_eq!(log.articles_created, 1);
        assert_eq!(log.errors.unwrap().lines().count(), 10);
        assert!(log.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_run_keeps_counts() {
        let db = Database::in_memory().await.unwrap();
        let mut tracker = CrawlTracker::start(&db, CrawlType::Home, Some("home"))
            .await
            .unwrap();
        tracker.add_updated(4);
        let summary = tracker.finish(true).await.unwrap();
        assert_eq!(summary.status, CrawlStatus::Failed);
        assert!(!summary.is_fatal());
        let log = db.crawl_logs().get(summary.log_id).await.unwrap().unwrap();
        assert_eq!(log.articles_updated, 4);
        assert_eq!(log.errors.as_deref(), Some("cancelled"));
    }
}
