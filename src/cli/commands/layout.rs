//! Home layout extraction to JSON and CSV.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::models::Language;
use crate::pipeline::Pipeline;

use super::helpers::{open_database, start_browser};

/// Render the home page and write its layout without touching stored rows.
pub async fn cmd_extract_layout(
    settings: &Settings,
    language: Language,
    output: &Path,
    csv: Option<&Path>,
    max_articles: usize,
    headed: bool,
) -> anyhow::Result<()> {
    let db = open_database(settings).await?;
    let session = start_browser(settings, headed, false).await?;
    let layout = Pipeline::new(&db, &session, &settings.sites)
        .fetch_home_layout(language, max_articles)
        .await;
    session.close().await;
    let layout = layout?;

    let json = layout.to_json().context("serializing layout")?;
    tokio::fs::write(output, json)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "{} {} slots in {} rows -> {}",
        style("✓").green(),
        layout.items.len(),
        layout.row_count(),
        output.display()
    );

    if let Some(path) = csv {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        layout
            .write_csv(std::io::BufWriter::new(file))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{} CSV -> {}", style("✓").green(), path.display());
    }
    Ok(())
}
