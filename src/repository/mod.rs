//! Repository layer for database persistence.
//!
//! All access goes through one [`Database`] per pipeline run. Repositories
//! borrow it and are cheap to create.

mod article;
mod category;
mod crawl_log;
mod detail;
pub mod models;
pub mod pool;
pub mod util;

pub use article::{ArticleFilter, ArticleRepository, Upserted};
pub use category::{CategoryRepository, UserRepository};
pub use crawl_log::{CrawlCounts, CrawlLogRepository};
pub use detail::ArticleDetailRepository;
pub use pool::{Database, DbError};
