//! Crawl log repository.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{CrawlLogRecord, NewCrawlLog};
use super::pool::{Database, DbError};
use super::util::{parse_datetime, parse_datetime_opt};
use crate::models::{CrawlLog, CrawlStatus, CrawlType};
use crate::schema::crawl_logs;

impl From<CrawlLogRecord> for CrawlLog {
    fn from(record: CrawlLogRecord) -> Self {
        CrawlLog {
            id: record.id,
            crawl_type: CrawlType::from_str(&record.crawl_type).unwrap_or(CrawlType::Section),
            section: record.section,
            status: CrawlStatus::from_str(&record.status).unwrap_or(CrawlStatus::Failed),
            articles_crawled: record.articles_crawled,
            articles_created: record.articles_created,
            articles_updated: record.articles_updated,
            errors: record.errors,
            started_at: parse_datetime(&record.started_at),
            completed_at: parse_datetime_opt(record.completed_at),
        }
    }
}

/// Final counters of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlCounts {
    pub crawled: i32,
    pub created: i32,
    pub updated: i32,
}

pub struct CrawlLogRepository<'a> {
    db: &'a Database,
}

impl<'a> CrawlLogRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Open a `running` log entry.
    pub async fn start(
        &self,
        crawl_type: CrawlType,
        section: Option<&str>,
    ) -> Result<CrawlLog, DbError> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.db.conn().await;
        diesel::insert_into(crawl_logs::table)
            .values(&NewCrawlLog {
                crawl_type: crawl_type.as_str(),
                section,
                status: CrawlStatus::Running.as_str(),
                started_at: &now,
            })
            .returning(CrawlLogRecord::as_returning())
            .get_result(&mut *conn)
            .await
            .map(CrawlLog::from)
    }

    /// Close a log entry with its outcome.
    pub async fn finish(
        &self,
        id: i32,
        status: CrawlStatus,
        counts: &CrawlCounts,
        errors: Option<&str>,
    ) -> Result<(), DbError> {
        let mut conn = self.db.conn().await;
        diesel::update(crawl_logs::table.find(id))
            .set((
                crawl_logs::status.eq(status.as_str()),
                crawl_logs::articles_crawled.eq(counts.crawled),
                crawl_logs::articles_created.eq(counts.created),
                crawl_logs::articles_updated.eq(counts.updated),
                crawl_logs::errors.eq(errors),
                crawl_logs::completed_at.eq(Some(Utc::now().to_rfc3339())),
            ))
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: i32) -> Result<Option<CrawlLog>, DbError> {
        let mut conn = self.db.conn().await;
        crawl_logs::table
            .find(id)
            .select(CrawlLogRecord::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map(|r| r.map(CrawlLog::from))
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<CrawlLog>, DbError> {
        let mut conn = self.db.conn().await;
        crawl_logs::table
            .select(CrawlLogRecord::as_select())
            .order(crawl_logs::id.desc())
            .limit(limit)
            .load(&mut *conn)
            .await
            .map(|records| records.into_iter().map(CrawlLog::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_and_finish() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.crawl_logs();

        let log = repo.start(CrawlType::Home, Some("home")).await.unwrap();
        assert_eq!(log.status, CrawlStatus::Running);

        let counts = CrawlCounts {
            crawled: 12,
            created: 10,
            updated: 2,
        };
        repo.finish(log.id, CrawlStatus::Partial, &counts, Some("1 error"))
            .await
            .unwrap();

        let done = repo.get(log.id).await.unwrap().unwrap();
        assert_eq!(done.status, CrawlStatus::Partial);
        assert_eq!(done.articles_crawled, 12);
        assert_eq!(done.errors.as_deref(), Some("1 error"));
        assert!(done.completed_at.is_some());
        assert_eq!(repo.recent(5).await.unwrap().len(), 1);
    }
}
