//! Pipeline services: asset migration, cross-language linking, sitemap
//! emission and translation.
//!
//! Services hold no UI concerns; the CLI and the pipelines compose them.

pub mod assets;
pub mod linker;
pub mod sitemap;
pub mod translation;

pub use assets::{AssetConfig, AssetError, AssetFetcher};
pub use linker::{link_languages, link_stored, relink_home, LinkReport, RelinkOptions, RelinkReport};
pub use sitemap::{write_sitemaps, SitemapError};
pub use translation::{
    translate_article, translate_content_blocks, TranslateError, TranslationService,
    Translator, TranslatorBackend, TranslatorConfig,
};
