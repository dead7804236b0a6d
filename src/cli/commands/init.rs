//! Initialize command.

use console::style;

use crate::config::Settings;

use super::helpers::open_database;

/// Create the data directory, the schema and the category rows.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let db = open_database(settings).await?;
    let seeded = db.categories().seed().await?;
    for category in db.categories().all().await? {
        println!("  {} {} ({})", style("✓").green(), category.name, category.slug);
    }
    if seeded == 0 {
        println!("{} Categories already present", style("!").yellow());
    }
    if settings.credentials.is_none() {
        println!(
            "{} SERMITSIAQ_EMAIL / SERMITSIAQ_PASSWORD not set; detail crawls will stop at the paywall",
            style("!").yellow()
        );
    }

    println!(
        "{} Initialized {} in {}",
        style("✓").green(),
        db.database_url(),
        settings.data_dir.display()
    );
    Ok(())
}
