//! Sitemap emission.

use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::models::Language;
use crate::services::write_sitemaps;

use super::helpers::open_database;

pub async fn cmd_sitemaps(
    settings: &Settings,
    output_dir: &Path,
    language: Option<Language>,
    domain: &str,
) -> anyhow::Result<()> {
    let db = open_database(settings).await?;
    let written = write_sitemaps(
        &db,
        output_dir,
        language,
        domain,
        &settings.controlled_origin,
    )
    .await?;
    for (path, count) in written {
        println!(
            "{} {} ({} URLs)",
            style("✓").green(),
            path.display(),
            count
        );
    }
    Ok(())
}
