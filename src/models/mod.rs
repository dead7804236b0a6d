//! Data models for the ingestion pipeline.

mod article;
mod block;
mod crawl_log;
mod image;
mod language;
pub mod layout;

pub use article::{Article, ArticleDetail};
pub use block::{
    AdBlock, ArticleMeta, BlockKind, Byline, ContentBlock, DateEntry, FooterTags, HeaderCaption,
    HeadingBlock, HeadingLevel, ImageBlock, ImageSources, Offer, PaywallOffer, Tag, TextBlock,
};
pub use crawl_log::{Category, CrawlLog, CrawlStatus, CrawlType};
pub use image::{ImageData, ImageVariant, ImageVariants};
pub use language::{Language, Section};
pub use layout::{
    CardLayout, HeaderLink, LayoutData, LayoutKind, LayoutType, ListItem, ListLayout,
    SliderArticle, SliderLayout, TitlePart,
};
