//! Section, home and detail crawl commands.

use console::style;

use crate::config::Settings;
use crate::models::{Language, Section};
use crate::pipeline::{CancelFlag, DetailOptions, Pipeline};

use super::helpers::{
    asset_fetcher, open_database, print_summary, progress_bar, start_browser,
    translation_service,
};

/// Languages a listing crawl visits, DA first so EN creation sees fresh rows.
fn crawl_languages(language: Option<Language>) -> anyhow::Result<Vec<Language>> {
    match language {
        Some(Language::En) => anyhow::bail!("EN is derived from DA and cannot be crawled"),
        Some(lang) => Ok(vec![lang]),
        None => Ok(vec![Language::Da, Language::Kl]),
    }
}

fn parse_sections(section: &str) -> anyhow::Result<Vec<Section>> {
    if section.eq_ignore_ascii_case("all") {
        return Ok(Section::CRAWLABLE.to_vec());
    }
    match Section::from_str(section) {
        Some(s) => Ok(vec![s]),
        None => anyhow::bail!(
            "unknown section '{}' (expected all, {})",
            section,
            Section::CRAWLABLE.map(|s| s.as_str()).join(", ")
        ),
    }
}

/// Crawl one section (or `all`) in one or both source languages.
pub async fn cmd_crawl_section(
    settings: &Settings,
    section: &str,
    language: Option<Language>,
    max_articles: usize,
    headed: bool,
    no_images: bool,
    no_translate: bool,
) -> anyhow::Result<()> {
    let sections = parse_sections(section)?;
    let languages = crawl_languages(language)?;
    let db = open_database(settings).await?;
    db.categories().seed().await?;
    let assets = asset_fetcher(settings, !no_images)?;
    let translator = translation_service(settings, !no_translate)?;
    let session = start_browser(settings, headed, false).await?;

    let pipeline = Pipeline::new(&db, &session, &settings.sites)
        .with_assets(assets.as_ref())
        .with_translator(translator.as_ref())
        .with_string_delay(settings.translator.string_delay())
        .with_cancel(CancelFlag::on_ctrl_c());

    let mut fatal = false;
    let mut first_error = None;
    'outer: for section in sections {
        for &lang in &languages {
            if pipeline.cancel.is_cancelled() {
                break 'outer;
            }
            let label = format!("{} ({})", section.display_name(), lang);
            match pipeline.crawl_section(section, lang, max_articles).await {
                Ok(summary) => fatal |= print_summary(&label, &summary),
                Err(e) => {
                    println!("{} {}: {}", style("✗").red(), label, e);
                    fatal = true;
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
    }
    session.close().await;

    if let Some(e) = first_error {
        return Err(e.into());
    }
    if fatal {
        anyhow::bail!("crawl committed nothing");
    }
    Ok(())
}

/// Replay the rendered home layout onto stored rows.
pub async fn cmd_crawl_home(
    settings: &Settings,
    language: Option<Language>,
    max_articles: usize,
    headed: bool,
) -> anyhow::Result<()> {
    cmd_crawl_section(
        settings,
        Section::Home.as_str(),
        language,
        max_articles,
        headed,
        false,
        false,
    )
    .await
}

/// Render stored articles that have no detail yet.
#[allow(clippy::too_many_arguments)]
pub async fn cmd_crawl_details(
    settings: &Settings,
    language: Option<Language>,
    section: Option<String>,
    limit: Option<i64>,
    no_translate: bool,
    no_images: bool,
    headed: bool,
) -> anyhow::Result<()> {
    if language == Some(Language::En) {
        anyhow::bail!("EN details are produced by translation, not crawled");
    }
    let db = open_database(settings).await?;
    let assets = asset_fetcher(settings, !no_images)?;
    let translator = translation_service(settings, !no_translate)?;
    let session = start_browser(settings, headed, true).await?;

    let pipeline = Pipeline::new(&db, &session, &settings.sites)
        .with_assets(assets.as_ref())
        .with_translator(translator.as_ref())
        .with_string_delay(settings.translator.string_delay())
        .with_cancel(CancelFlag::on_ctrl_c());

    let options = DetailOptions {
        language,
        section,
        limit,
        translate: !no_translate,
    };
    let pb = progress_bar("details");
    let result = pipeline.crawl_details(&options, &pb).await;
    pb.finish_and_clear();
    session.close().await;

    let summary = result?;
    if print_summary("Details", &summary) {
        anyhow::bail!("detail crawl committed nothing");
    }
    if let Some(service) = translator.as_ref() {
        let (calls, failures) = service.stats();
        println!(
            "  {} translator calls via {} ({} failed)",
            calls,
            service.backend_name(),
            failures
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_argument() {
        assert_eq!(parse_sections("Sport").unwrap(), vec![Section::Sport]);
        assert_eq!(parse_sections("all").unwrap().len(), 6);
        assert!(parse_sections("vejret").is_err());
        assert!(crawl_languages(Some(Language::En)).is_err());
        assert_eq!(
            crawl_languages(None).unwrap(),
            vec![Language::Da, Language::Kl]
        );
    }
}
