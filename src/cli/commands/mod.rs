//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod helpers;
mod init;
mod layout;
mod link;
mod sitemaps;
mod status;
mod translate;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::models::Language;

#[derive(Parser)]
#[command(name = "smq")]
#[command(about = "Trilingual Sermitsiaq news ingestion")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the database, browser profile and images
    #[arg(long, global = true, env = "SMQ_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and seed categories
    Init,

    /// Crawl a section listing (home, erhverv, samfund, kultur, sport, podcasti or all)
    CrawlSection {
        section: String,
        /// Source language; both DA and KL when omitted
        #[arg(short, long, value_enum)]
        language: Option<Language>,
        /// Stop scrolling after this many cards (0 = exhaust the page)
        #[arg(short, long, default_value = "0")]
        max_articles: usize,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// Keep upstream image URLs
        #[arg(long)]
        no_images: bool,
        /// Skip EN creation
        #[arg(long)]
        no_translate: bool,
    },

    /// Crawl the home page and replay its layout
    CrawlHome {
        #[arg(short, long, value_enum)]
        language: Option<Language>,
        #[arg(short, long, default_value = "0")]
        max_articles: usize,
        #[arg(long)]
        headed: bool,
    },

    /// Render and parse stored articles that have no detail
    CrawlDetails {
        #[arg(short, long, value_enum)]
        language: Option<Language>,
        #[arg(short, long)]
        section: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        /// Do not create EN details for DA articles
        #[arg(long)]
        no_translate: bool,
        /// Keep upstream image URLs
        #[arg(long)]
        no_images: bool,
        #[arg(long)]
        headed: bool,
    },

    /// Apply a home layout to stored articles
    LinkHome {
        /// Layout JSON written by extract-layout
        #[arg(long, conflicts_with = "crawl")]
        layout_file: Option<PathBuf>,
        /// Render the home page instead of reading a file
        #[arg(long)]
        crawl: bool,
        #[arg(short, long, value_enum, default_value = "da")]
        language: Language,
        #[arg(long)]
        dry_run: bool,
        /// Keep existing home placements
        #[arg(long)]
        no_reset: bool,
        /// Do not create missing EN siblings
        #[arg(long)]
        no_create_en: bool,
        #[arg(long)]
        headed: bool,
    },

    /// Fill translated article URLs
    TranslateUrls {
        #[arg(short, long, value_enum, default_value = "en")]
        language: Language,
        #[arg(long)]
        limit: Option<i64>,
        /// Re-translate rows that already have one
        #[arg(long)]
        force: bool,
    },

    /// Write sitemap XML files
    Sitemaps {
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Single language; all three when omitted
        #[arg(short, long, value_enum)]
        language: Option<Language>,
        /// Domain the <loc> URLs are rewritten to
        #[arg(short, long, default_value = "sermitsiaq.com")]
        domain: String,
    },

    /// Render the home page and write its layout as JSON (and CSV)
    ExtractLayout {
        #[arg(short, long, value_enum, default_value = "da")]
        language: Language,
        #[arg(short, long, default_value = "home_layout.json")]
        output: PathBuf,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(short, long, default_value = "0")]
        max_articles: usize,
        #[arg(long)]
        headed: bool,
    },

    /// Link stored KL articles to their DA originals
    LinkLanguages {
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Show recent crawls and row counts
    Status {
        #[arg(short = 'n', long, default_value = "10")]
        limit: i64,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref(), cli.data_dir)
        .await
        .context("loading settings")?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::CrawlSection {
            section,
            language,
            max_articles,
            headed,
            no_images,
            no_translate,
        } => {
            crawl::cmd_crawl_section(
                &settings,
                &section,
                language,
                max_articles,
                headed,
                no_images,
                no_translate,
            )
            .await
        }
        Commands::CrawlHome {
            language,
            max_articles,
            headed,
        } => crawl::cmd_crawl_home(&settings, language, max_articles, headed).await,
        Commands::CrawlDetails {
            language,
            section,
            limit,
            no_translate,
            no_images,
            headed,
        } => {
            crawl::cmd_crawl_details(
                &settings,
                language,
                section,
                limit,
                no_translate,
                no_images,
                headed,
            )
            .await
        }
        Commands::LinkHome {
            layout_file,
            crawl,
            language,
            dry_run,
            no_reset,
            no_create_en,
            headed,
        } => {
            link::cmd_link_home(
                &settings,
                layout_file.as_deref(),
                crawl,
                language,
                dry_run,
                no_reset,
                no_create_en,
                headed,
            )
            .await
        }
        Commands::TranslateUrls {
            language,
            limit,
            force,
        } => translate::cmd_translate_urls(&settings, language, limit, force).await,
        Commands::Sitemaps {
            output_dir,
            language,
            domain,
        } => sitemaps::cmd_sitemaps(&settings, &output_dir, language, &domain).await,
        Commands::ExtractLayout {
            language,
            output,
            csv,
            max_articles,
            headed,
        } => {
            layout::cmd_extract_layout(
                &settings,
                language,
                &output,
                csv.as_deref(),
                max_articles,
                headed,
            )
            .await
        }
        Commands::LinkLanguages { section } => {
            link::cmd_link_languages(&settings, section.as_deref()).await
        }
        Commands::Status { limit } => status::cmd_status(&settings, limit).await,
    }
}
