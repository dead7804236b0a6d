//! URL translation back-fill.

use console::style;

use crate::config::Settings;
use crate::models::Language;
use crate::pipeline::CancelFlag;
use crate::services::translation::backfill_published_urls;

use super::helpers::{open_database, translation_service};

/// Fill `published_url_en` for stored rows of `language`.
pub async fn cmd_translate_urls(
    settings: &Settings,
    language: Language,
    limit: Option<i64>,
    force: bool,
) -> anyhow::Result<()> {
    let db = open_database(settings).await?;
    let Some(service) = translation_service(settings, true)? else {
        anyhow::bail!("no translator configured");
    };
    let service = service.with_delay(settings.translator.string_delay());

    db.begin_batch().await?;
    let cancel = CancelFlag::on_ctrl_c();
    let (visited, updated) =
        backfill_published_urls(&service, &db, language, limit, force, &cancel).await?;
    let (_, failures) = service.stats();
    println!(
        "{} Translated {} of {} {} URLs",
        style("✓").green(),
        updated,
        visited,
        language
    );
    if failures > 0 {
        println!(
            "  {} translator calls failed, their slugs were kept",
            style(failures).yellow()
        );
    }
    Ok(())
}
