//! Database session for one pipeline run.
//!
//! SQLite is reached through diesel-async's `SyncConnectionWrapper`. A run
//! holds a single connection; in batch mode writes are grouped into a
//! transaction that is committed every `batch_size` successful upserts and
//! once more when the run flushes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::util::to_diesel_error;
use super::{
    ArticleDetailRepository, ArticleRepository, CategoryRepository, CrawlLogRepository,
    UserRepository,
};

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// Upserts per committed batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Schema DDL. Every statement is idempotent.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    element_guid TEXT,
    title TEXT NOT NULL DEFAULT '',
    slug TEXT,
    excerpt TEXT,
    content TEXT,
    image_data TEXT,
    published_url TEXT NOT NULL DEFAULT '',
    published_url_en TEXT,
    k5a_url TEXT,
    site_alias TEXT,
    instance TEXT,
    section TEXT NOT NULL DEFAULT 'home',
    category_id INTEGER REFERENCES categories(id),
    is_home BOOLEAN NOT NULL DEFAULT 0,
    display_order INTEGER NOT NULL DEFAULT 0,
    layout_type TEXT,
    grid_size INTEGER,
    layout_data TEXT,
    is_paywall BOOLEAN NOT NULL DEFAULT 0,
    paywall_class TEXT,
    is_featured BOOLEAN NOT NULL DEFAULT 0,
    is_temp BOOLEAN NOT NULL DEFAULT 0,
    article_type TEXT,
    position INTEGER,
    language TEXT NOT NULL DEFAULT 'da',
    original_language TEXT,
    canonical_id INTEGER REFERENCES articles(id) ON DELETE SET NULL,
    published_date TEXT,
    crawled_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_section_display_order ON articles(section, display_order);
CREATE INDEX IF NOT EXISTS idx_articles_featured_display_order ON articles(is_featured, display_order);
CREATE INDEX IF NOT EXISTS idx_articles_home_display_order ON articles(is_home, display_order);
CREATE INDEX IF NOT EXISTS idx_articles_published_date ON articles(published_date);
CREATE INDEX IF NOT EXISTS idx_articles_element_guid ON articles(element_guid);
CREATE INDEX IF NOT EXISTS idx_articles_language ON articles(language);
CREATE INDEX IF NOT EXISTS idx_articles_canonical_id ON articles(canonical_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_url_language
    ON articles(published_url, language) WHERE published_url <> '';

CREATE TABLE IF NOT EXISTS article_details (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    published_url TEXT NOT NULL,
    language TEXT NOT NULL,
    element_guid TEXT,
    content_blocks TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(published_url, language)
);

CREATE INDEX IF NOT EXISTS idx_article_details_published_url ON article_details(published_url);

CREATE TABLE IF NOT EXISTS crawl_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_type TEXT NOT NULL,
    section TEXT,
    status TEXT NOT NULL DEFAULT 'running',
    articles_crawled INTEGER NOT NULL DEFAULT 0,
    articles_created INTEGER NOT NULL DEFAULT 0,
    articles_updated INTEGER NOT NULL DEFAULT 0,
    errors TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    subscriber_number TEXT,
    password_hash TEXT,
    is_active BOOLEAN NOT NULL DEFAULT 1
);
"#;

/// Normalize a `DATABASE_URL` into a path diesel's SQLite backend accepts.
///
/// Accepts bare paths, `sqlite:path`, `sqlite://path` and the
/// `sqlite:///path` form used by SQLAlchemy-style URLs.
pub fn sqlite_path(database_url: &str) -> String {
    let url = database_url.trim();
    for prefix in ["sqlite:///", "sqlite://", "sqlite:"] {
        // sqlite:////abs/path keeps its leading slash, sqlite:///rel stays relative
        if let Some(rest) = url.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    url.to_string()
}

/// One connection plus batching state, shared by the repositories.
pub struct Database {
    database_url: String,
    conn: Mutex<SqliteConn>,
    batch_size: usize,
    pending: AtomicUsize,
    in_batch: AtomicBool,
}

impl Database {
    /// Open (or create) the database at `database_url`.
    pub async fn open(database_url: &str) -> Result<Self, DbError> {
        let path = sqlite_path(database_url);
        let mut conn = SqliteConn::establish(&path)
            .await
            .map_err(to_diesel_error)?;
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .await?;
        if path != ":memory:" {
            conn.batch_execute("PRAGMA journal_mode = WAL;").await?;
        }

        Ok(Self {
            database_url: path,
            conn: Mutex::new(conn),
            batch_size: DEFAULT_BATCH_SIZE,
            pending: AtomicUsize::new(0),
            in_batch: AtomicBool::new(false),
        })
    }

    /// A fresh in-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self, DbError> {
        let db = Self::open(":memory:").await?;
        db.init_schema().await?;
        Ok(db)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Create all tables and indices.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        let mut conn = self.conn().await;
        conn.batch_execute(SCHEMA_SQL).await
    }

    pub(crate) async fn conn(&self) -> MutexGuard<'_, SqliteConn> {
        self.conn.lock().await
    }

    /// Start grouping writes into batches.
    pub async fn begin_batch(&self) -> Result<(), DbError> {
        if self.in_batch.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.pending.store(0, Ordering::SeqCst);
        let mut conn = self.conn().await;
        conn.batch_execute("BEGIN").await
    }

    /// Count one successful upsert, committing when the batch is full.
    ///
    /// Returns true when this call committed a batch.
    pub async fn record_write(&self) -> Result<bool, DbError> {
        if !self.in_batch.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let pending = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if pending < self.batch_size {
            return Ok(false);
        }
        self.pending.store(0, Ordering::SeqCst);
        let mut conn = self.conn().await;
        conn.batch_execute("COMMIT; BEGIN").await?;
        debug!("Committed batch of {} writes", pending);
        Ok(true)
    }

    /// Commit outstanding writes and leave batch mode.
    pub async fn flush(&self) -> Result<(), DbError> {
        if !self.in_batch.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let pending = self.pending.swap(0, Ordering::SeqCst);
        let mut conn = self.conn().await;
        conn.batch_execute("COMMIT").await?;
        debug!("Flushed final batch of {} writes", pending);
        Ok(())
    }

    /// Writes recorded since the last commit.
    pub fn pending_writes(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn articles(&self) -> ArticleRepository<'_> {
        ArticleRepository::new(self)
    }

    pub fn details(&self) -> ArticleDetailRepository<'_> {
        ArticleDetailRepository::new(self)
    }

    pub fn crawl_logs(&self) -> CrawlLogRepository<'_> {
        CrawlLogRepository::new(self)
    }

    pub fn categories(&self) -> CategoryRepository<'_> {
        CategoryRepository::new(self)
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sqlite_path() {
        assert_eq!(sqlite_path("sqlite:///data/app.db"), "data/app.db");
        assert_eq!(sqlite_path("sqlite:////var/lib/app.db"), "/var/lib/app.db");
        assert_eq!(sqlite_path("sqlite:test.db"), "test.db");
        assert_eq!(sqlite_path("/tmp/x.db"), "/tmp/x.db");
        assert_eq!(sqlite_path("sqlite://:memory:"), ":memory:");
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(&path.display().to_string()).await.unwrap();
        db.init_schema().await.unwrap();
        db.init_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_commits_every_n_writes() {
        let db = Database::in_memory().await.unwrap().with_batch_size(3);
        db.begin_batch().await.unwrap();
        assert!(!db.record_write().await.unwrap());
        assert!(!db.record_write().await.unwrap());
        assert!(db.record_write().await.unwrap());
        assert_eq!(db.pending_writes(), 0);
        assert!(!db.record_write().await.unwrap());
        assert_eq!(db.pending_writes(), 1);
        db.flush().await.unwrap();
        assert_eq!(db.pending_writes(), 0);
        // Outside batch mode writes are not counted.
        assert!(!db.record_write().await.unwrap());
    }
}
