//! Shared setup for the crawl commands.

use std::time::Duration;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::config::Settings;
use crate::pipeline::CrawlSummary;
use crate::repository::Database;
use crate::scrapers::{BrowserError, BrowserSession};
use crate::services::{AssetFetcher, TranslationService};

/// Open the configured database, creating the schema when missing.
pub async fn open_database(settings: &Settings) -> anyhow::Result<Database> {
    settings
        .ensure_directories()
        .with_context(|| format!("creating {}", settings.data_dir.display()))?;
    settings
        .open_database()
        .await
        .with_context(|| format!("opening {}", settings.database_url()))
}

/// Image fetcher writing into the uploads directory, unless disabled.
pub fn asset_fetcher(settings: &Settings, enabled: bool) -> anyhow::Result<Option<AssetFetcher>> {
    if !enabled {
        return Ok(None);
    }
    let fetcher = AssetFetcher::new(
        &settings.assets,
        &settings.uploads_dir,
        &settings.controlled_origin,
    )
    .context("building image client")?;
    Ok(Some(fetcher))
}

/// Article-level translation service, unless disabled.
pub fn translation_service(
    settings: &Settings,
    enabled: bool,
) -> anyhow::Result<Option<TranslationService>> {
    if !enabled {
        return Ok(None);
    }
    let backend = settings
        .translator
        .build()
        .context("building translator")?;
    Ok(Some(TranslationService::new(
        backend,
        settings.translator.article_delay(),
    )))
}

/// Launch the browser and log in when credentials are configured.
///
/// A failed login is fatal only when `login_required`; listings render
/// without a subscriber session.
pub async fn start_browser(
    settings: &Settings,
    headed: bool,
    login_required: bool,
) -> anyhow::Result<BrowserSession> {
    let headless = settings.browser.headless && !headed;
    let session = BrowserSession::acquire(&settings.browser, &settings.profile_dir(), headless)
        .await
        .context("starting browser")?;

    let Some(credentials) = settings.credentials.as_ref() else {
        if login_required {
            warn!("SERMITSIAQ_EMAIL/SERMITSIAQ_PASSWORD not set, paywalled bodies will be cut");
        }
        return Ok(session);
    };

    match session
        .ensure_logged_in(&settings.sites.login_url, credentials)
        .await
    {
        Ok(()) => Ok(session),
        Err(e @ BrowserError::AuthFailed(_)) if !login_required => {
            warn!("Continuing without login: {}", e);
            Ok(session)
        }
        Err(e) => {
            session.close().await;
            Err(e).context("logging in")
        }
    }
}

pub fn progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Print a run's outcome. Returns whether the run should fail the command.
pub fn print_summary(label: &str, summary: &CrawlSummary) -> bool {
    let marker = if summary.is_fatal() {
        style("✗").red()
    } else if summary.errors > 0 {
        style("!").yellow()
    } else {
        style("✓").green()
    };
    println!(
        "{} {}: {} crawled, {} created, {} updated, {} errors ({}, log #{})",
        marker,
        label,
        summary.counts.crawled,
        summary.counts.created,
        summary.counts.updated,
        summary.errors,
        summary.status.as_str(),
        summary.log_id
    );
    summary.is_fatal()
}
