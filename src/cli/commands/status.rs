//! Recent crawl runs and row counts.

use console::style;

use crate::config::Settings;
use crate::models::CrawlStatus;

use super::helpers::open_database;

pub async fn cmd_status(settings: &Settings, limit: i64) -> anyhow::Result<()> {
    let db = open_database(settings).await?;

    println!("\n{}", style("Articles").bold());
    println!("{}", "-".repeat(40));
    let details = db.details().count_by_language().await?;
    for (language, count) in db.articles().count_by_language().await? {
        let with_detail = details
            .iter()
            .find(|(l, _)| *l == language)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        println!("  {:<4} {:>7} rows  {:>7} details", language, count, with_detail);
    }
    println!("  active users: {}", db.users().count_active().await?);

    println!("\n{}", style("Recent crawls").bold());
    println!("{}", "-".repeat(40));
    let logs = db.crawl_logs().recent(limit).await?;
    if logs.is_empty() {
        println!("  {}", style("no crawls recorded").dim());
    }
    for log in logs {
        let status = match log.status {
            CrawlStatus::Success => style(log.status.as_str()).green(),
            CrawlStatus::Partial => style(log.status.as_str()).yellow(),
            CrawlStatus::Failed => style(log.status.as_str()).red(),
            CrawlStatus::Running => style(log.status.as_str()).cyan(),
        };
        println!(
            "  #{:<5} {} {:<11} {:<9} {:<8} {} crawled, {} created, {} updated",
            log.id,
            log.started_at.format("%Y-%m-%d %H:%M"),
            log.crawl_type.as_str(),
            log.section.as_deref().unwrap_or("-"),
            status,
            log.articles_crawled,
            log.articles_created,
            log.articles_updated
        );
        if let Some(first) = log.errors.as_deref().and_then(|e| e.lines().next()) {
            println!("         {}", style(first).dim());
        }
    }
    Ok(())
}
