//! Article URL translation (`/section/slug/id`).

use tracing::{debug, info};
use url::Url;

use super::TranslationService;
use crate::models::Language;
use crate::repository::{Database, DbError};
use crate::utils::text::slugify;
use crate::utils::url::split_article_path;
use crate::utils::CancelFlag;

const SECTIONS: &[(&str, &str)] = &[
    ("samfund", "society"),
    ("erhverv", "business"),
    ("kultur", "culture"),
    ("sport", "sport"),
    ("podcasti", "podcast"),
    ("politik", "politics"),
    ("job", "jobs"),
    ("nyheder", "news"),
    ("debat", "debate"),
    ("indland", "domestic"),
    ("udland", "international"),
];

/// English section slug, from the fixed dictionary or the translator.
pub async fn translate_section(service: &TranslationService, section: &str) -> String {
    let lowered = section.to_ascii_lowercase();
    if let Some((_, en)) = SECTIONS.iter().find(|(da, _)| *da == lowered) {
        return en.to_string();
    }
    let translated = slugify(&service.text(&section.replace('-', " ")).await);
    if translated.is_empty() {
        lowered
    } else {
        translated
    }
}

/// Translate an article URL's section and slug, keeping host and id.
///
/// Returns `None` when the URL is not of the `/section/slug/id` form.
pub async fn translate_url(service: &TranslationService, url: &str) -> Option<String> {
    let path = split_article_path(url);
    let (Some(slug), Some(id)) = (path.slug, path.article_id) else {
        return None;
    };

    let mut segments = Vec::with_capacity(3);
    if let Some(section) = path.section {
        segments.push(translate_section(service, &section).await);
    }
    let phrase = slug.replace('-', " ");
    let translated = slugify(&service.text(&phrase).await);
    segments.push(if translated.is_empty() { slug } else { translated });
    segments.push(id);
    let new_path = format!("/{}", segments.join("/"));

    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_path(&new_path);
            parsed.set_query(None);
            parsed.set_fragment(None);
            Some(parsed.to_string())
        }
        Err(_) => Some(new_path),
    }
}

/// Fill `published_url_en` on stored rows of `language`.
///
/// Without `force` only rows missing the column are visited. Stops before
/// the next row once `cancel` is set. Returns `(visited, updated)`.
pub async fn backfill_published_urls(
    service: &TranslationService,
    db: &Database,
    language: Language,
    limit: Option<i64>,
    force: bool,
    cancel: &CancelFlag,
) -> Result<(usize, usize), DbError> {
    let rows = db
        .articles()
        .needing_url_translation(language, limit, force)
        .await?;
    let mut visited = 0;
    let mut updated = 0;
    for article in &rows {
        if cancel.is_cancelled() {
            info!("URL translation interrupted after {} rows", visited);
            break;
        }
        visited += 1;
        let Some(url) = translate_url(service, &article.published_url).await else {
            debug!("No article path in {}", article.published_url);
            continue;
        };
        if article.published_url_en.as_deref() == Some(url.as_str()) {
            continue;
        }
        db.articles().set_published_url_en(article.id, &url).await?;
        updated += 1;
    }
    db.flush().await?;
    info!("Translated {} of {} {} URLs", updated, visited, language);
    Ok((visited, updated))
}
