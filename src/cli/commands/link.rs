//! Home relinking and DA/KL linking commands.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::extract::HomeLayout;
use crate::models::{CrawlType, Language};
use crate::pipeline::{CancelFlag, CrawlTracker, Pipeline};
use crate::services::{link_stored, relink_home, RelinkOptions};

use super::helpers::{
    asset_fetcher, open_database, print_summary, start_browser, translation_service,
};

/// Apply a saved or freshly rendered home layout.
#[allow(clippy::too_many_arguments)]
pub async fn cmd_link_home(
    settings: &Settings,
    layout_file: Option<&Path>,
    crawl: bool,
    language: Language,
    dry_run: bool,
    no_reset: bool,
    no_create_en: bool,
    headed: bool,
) -> anyhow::Result<()> {
    if language == Language::En {
        anyhow::bail!("EN home placement follows DA; relink DA instead");
    }
    let db = open_database(settings).await?;

    let layout = match (layout_file, crawl) {
        (Some(path), false) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            HomeLayout::from_json(&json)
                .with_context(|| format!("parsing layout {}", path.display()))?
        }
        (None, true) => {
            let session = start_browser(settings, headed, false).await?;
            let layout = Pipeline::new(&db, &session, &settings.sites)
                .fetch_home_layout(language, 0)
                .await;
            session.close().await;
            layout?
        }
        _ => anyhow::bail!("pass exactly one of --layout-file or --crawl"),
    };

    let options = RelinkOptions {
        reset_first: !no_reset,
        create_en: !no_create_en,
        dry_run,
        cancel: CancelFlag::on_ctrl_c(),
    };
    let assets = asset_fetcher(settings, !dry_run)?;
    let translator = translation_service(settings, options.create_en && !dry_run)?;

    let tracker = if dry_run {
        None
    } else {
        db.begin_batch().await?;
        Some(CrawlTracker::start(&db, CrawlType::Home, Some("home")).await?)
    };

    let report = match relink_home(
        &db,
        &layout,
        language,
        options,
        assets.as_ref(),
        translator.as_ref(),
    )
    .await
    {
        Ok(report) => report,
        Err(e) => {
            if let Some(tracker) = tracker {
                tracker.abort(format!("relink: {}", e)).await?;
            }
            return Err(e).context("relinking home");
        }
    };

    if dry_run {
        println!(
            "{} Dry run: {} slots, {} new, {} existing, {} sliders",
            style("→").cyan(),
            layout.items.len(),
            report.created,
            report.updated,
            report.sliders
        );
        return Ok(());
    }

    println!(
        "  reset {}, {} sliders, {} EN created, {} images localized",
        report.reset, report.sliders, report.en_created, report.images_localized
    );
    if let Some(mut tracker) = tracker {
        tracker.crawled(layout.items.len());
        tracker.add_created(report.created);
        tracker.add_updated(report.updated);
        for error in report.errors {
            tracker.error(error);
        }
        let summary = tracker.finish(report.cancelled).await?;
        if print_summary(&format!("Home ({})", language), &summary) {
            anyhow::bail!("relink committed nothing");
        }
    }
    Ok(())
}

/// Run DA/KL matching over stored rows.
pub async fn cmd_link_languages(settings: &Settings, section: Option<&str>) -> anyhow::Result<()> {
    let db = open_database(settings).await?;
    db.begin_batch().await?;
    let report = link_stored(&db, section).await?;
    db.flush().await?;

    println!(
        "{} Linked {} KL articles ({} changed)",
        style("✓").green(),
        report.pairs.len(),
        report.updated
    );
    if !report.unmatched_kl.is_empty() {
        println!(
            "  {} KL articles without a DA match",
            style(report.unmatched_kl.len()).yellow()
        );
        for url in report.unmatched_kl.iter().take(10) {
            println!("    {}", style(url).dim());
        }
    }
    if !report.unmatched_da.is_empty() {
        println!("  {} DA articles without a KL match", report.unmatched_da.len());
    }
    Ok(())
}
