//! Cross-language linking and home relinking.
//!
//! DA is canonical. KL rows point at their DA story through
//! `canonical_id`; EN rows are created from DA by the translation service.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use super::assets::AssetFetcher;
use super::translation::{translate_article, TranslationService, Translated};
use crate::extract::{HomeLayout, LayoutItem};
use crate::models::{Article, Language, LayoutData, Section};
use crate::repository::{ArticleFilter, Database, DbError, Upserted};
use crate::utils::url::normalized_path;
use crate::utils::CancelFlag;

/// Which rule paired a KL article with its DA story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Guid,
    Path,
    Instance,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Guid => "element_guid",
            Self::Path => "url path",
            Self::Instance => "instance",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPair {
    pub da_id: i32,
    pub kl_id: i32,
    pub rule: MatchRule,
}

/// Outcome of a DA/KL matching pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub pairs: Vec<LinkPair>,
    /// Pairs whose `canonical_id` actually changed.
    pub updated: usize,
    pub unmatched_da: Vec<String>,
    pub unmatched_kl: Vec<String>,
}

fn label(article: &Article) -> String {
    if article.published_url.is_empty() {
        format!("#{} {}", article.id, article.title)
    } else {
        article.published_url.clone()
    }
}

fn same<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn find_match(da: &Article, pool: &[&Article]) -> Option<(usize, MatchRule)> {
    if let Some(i) = pool
        .iter()
        .position(|kl| same(&da.element_guid, &kl.element_guid))
    {
        return Some((i, MatchRule::Guid));
    }
    let da_path = normalized_path(&da.published_url);
    if da_path.is_some() {
        if let Some(i) = pool
            .iter()
            .position(|kl| normalized_path(&kl.published_url) == da_path)
        {
            return Some((i, MatchRule::Path));
        }
    }
    pool.iter()
        .position(|kl| same(&da.instance, &kl.instance))
        .map(|i| (i, MatchRule::Instance))
}

/// Pair DA articles with KL articles without touching the database.
///
/// Each DA article takes the first KL candidate by element GUID, then
/// normalized URL path, then `instance`. A matched KL article leaves the
/// pool.
pub fn match_languages(da: &[Article], kl: &[Article]) -> LinkReport {
    let mut pool: Vec<&Article> = kl.iter().filter(|a| !a.is_slider_container()).collect();
    let mut report = LinkReport::default();

    for da_article in da.iter().filter(|a| !a.is_slider_container()) {
        match find_match(da_article, &pool) {
            Some((index, rule)) => {
                let kl_article = pool.remove(index);
                if rule == MatchRule::Instance {
                    debug!(
                        "Linked {} to {} by instance only",
                        label(kl_article),
                        label(da_article)
                    );
                }
                report.pairs.push(LinkPair {
                    da_id: da_article.id,
                    kl_id: kl_article.id,
                    rule,
                });
            }
            None => report.unmatched_da.push(label(da_article)),
        }
    }
    report.unmatched_kl = pool.into_iter().map(label).collect();
    report
}

/// Match the given pools and write `canonical_id` on each KL match.
pub async fn link_languages(
    db: &Database,
    da: &[Article],
    kl: &[Article],
) -> Result<LinkReport, DbError> {
    let mut report = match_languages(da, kl);
    let current: HashMap<i32, Option<i32>> = kl.iter().map(|a| (a.id, a.canonical_id)).collect();

    for pair in &report.pairs {
        if current.get(&pair.kl_id).copied().flatten() == Some(pair.da_id) {
            continue;
        }
        db.articles().set_canonical(pair.kl_id, Some(pair.da_id)).await?;
        report.updated += 1;
    }

    info!(
        "Linked {} KL articles ({} changed), {} DA and {} KL unmatched",
        report.pairs.len(),
        report.updated,
        report.unmatched_da.len(),
        report.unmatched_kl.len()
    );
    Ok(report)
}

/// Link stored DA and KL rows, optionally limited to one section.
pub async fn link_stored(db: &Database, section: Option<&str>) -> Result<LinkReport, DbError> {
    let load = |language| ArticleFilter {
        language: Some(language),
        section: section.map(str::to_string),
        with_url: true,
        ..Default::default()
    };
    let da = db.articles().list(&load(Language::Da)).await?;
    let kl = db.articles().list(&load(Language::Kl)).await?;
    link_languages(db, &da, &kl).await
}

/// Switches for [`relink_home`].
#[derive(Debug, Clone)]
pub struct RelinkOptions {
    /// Clear `is_home` for the language before replaying the layout.
    pub reset_first: bool,
    /// Create missing EN siblings for DA home articles.
    pub create_en: bool,
    /// Report what would change without writing.
    pub dry_run: bool,
    /// Checked before each slot.
    pub cancel: CancelFlag,
}

impl Default for RelinkOptions {
    fn default() -> Self {
        Self {
            reset_first: true,
            create_en: true,
            dry_run: false,
            cancel: CancelFlag::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelinkReport {
    pub reset: usize,
    pub created: usize,
    pub updated: usize,
    pub sliders: usize,
    pub en_created: usize,
    pub images_localized: usize,
    pub errors: Vec<String>,
    /// The layout was only partly replayed.
    pub cancelled: bool,
    /// Saved home rows in the relinked language, in layout order.
    pub articles: Vec<Article>,
}

impl RelinkReport {
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

fn slider_title(item: &LayoutItem) -> String {
    match &item.layout_data {
        LayoutData::Slider(s) => s
            .slider_title
            .clone()
            .unwrap_or_else(|| item.layout_type.as_str().to_string()),
        _ => item.layout_type.as_str().to_string(),
    }
}

async fn existing_for(
    db: &Database,
    item: &LayoutItem,
    language: Language,
) -> Result<Option<Article>, DbError> {
    match &item.card {
        Some(card) => db.articles().find_by_url(&card.url, language).await,
        None => {
            db.articles()
                .find_slider(language, item.layout_type, item.display_order)
                .await
        }
    }
}

/// Build the row a layout slot should be stored as.
async fn placed_article(
    db: &Database,
    item: &LayoutItem,
    language: Language,
    existing: Option<Article>,
) -> Result<Article, DbError> {
    let mut article = match &item.card {
        Some(card) => card.merge_into(existing, language),
        None => {
            let mut slider = existing
                .unwrap_or_else(|| Article::new(language, slider_title(item), String::new()));
            slider.title = slider_title(item);
            slider.section = Section::Home.as_str().to_string();
            slider
        }
    };

    article.is_home = true;
    article.display_order = item.display_order;
    article.layout_type = Some(item.layout_type);
    article.layout_data = Some(item.layout_data.clone());

    if article.category_id.is_none() {
        article.category_id = db
            .categories()
            .by_slug(&article.section)
            .await?
            .map(|c| c.id);
    }
    Ok(article)
}

/// Move an existing EN sibling onto its DA slot.
async fn place_en(db: &Database, da: &Article, mut en: Article) -> Result<(), DbError> {
    en.is_home = da.is_home;
    en.display_order = da.display_order;
    en.layout_type = da.layout_type;
    match (en.layout_data.as_mut(), da.layout_data.as_ref()) {
        (Some(en_data), Some(da_data)) if en_data.kind() == da_data.kind() => {
            en_data.set_position(da_data.row_index(), da_position(da_data));
        }
        _ => {
            // The slot changed kind; the untranslated payload is better than none.
            debug!("EN {} takes DA layout payload for {:?}", en.id, da.layout_type);
            en.layout_data = da.layout_data.clone();
        }
    }
    db.articles().update(&en).await?;
    Ok(())
}

fn da_position(data: &LayoutData) -> usize {
    data.card().map(|c| c.position_in_row).unwrap_or(0)
}

/// Replay a home layout onto stored articles.
///
/// Cards are looked up by URL and slider containers by slot. When
/// `reset_first` is set every row of the language (and, for DA, of EN)
/// loses its home placement first, so the stored home matches the layout
/// exactly.
pub async fn relink_home(
    db: &Database,
    layout: &HomeLayout,
    language: Language,
    options: RelinkOptions,
    assets: Option<&AssetFetcher>,
    translator: Option<&TranslationService>,
) -> Result<RelinkReport, DbError> {
    let mut report = RelinkReport::default();

    if options.dry_run {
        for item in &layout.items {
            let existing = existing_for(db, item, language).await?;
            let what = item
                .card
                .as_ref()
                .map(|c| c.url.clone())
                .unwrap_or_else(|| slider_title(item));
            info!(
                "[dry-run] {} {} at {} ({})",
                if existing.is_some() { "update" } else { "create" },
                what,
                item.display_order,
                item.layout_type
            );
            match existing {
                Some(_) => report.updated += 1,
                None => report.created += 1,
            }
            if item.is_slider() {
                report.sliders += 1;
            }
        }
        return Ok(report);
    }

    if options.reset_first {
        report.reset = db.articles().reset_home(language).await?;
        if language == Language::Da && options.create_en {
            report.reset += db.articles().reset_home(Language::En).await?;
        }
        debug!("Cleared home placement on {} rows", report.reset);
    }

    for item in &layout.items {
        if options.cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let placed = match existing_for(db, item, language).await {
            Ok(existing) => placed_article(db, item, language, existing).await,
            Err(e) => Err(e),
        };
        let mut article = match placed {
            Ok(article) => article,
            Err(e) => {
                warn!("Failed to load home slot {}: {}", item.display_order, e);
                report.errors.push(format!("slot {}: {}", item.display_order, e));
                continue;
            }
        };

        if let Some(fetcher) = assets {
            report.images_localized += fetcher.localize_article(&mut article).await;
        }

        match db.articles().save(&mut article).await {
            Ok(Upserted::Created(_)) => report.created += 1,
            Ok(Upserted::Updated(_)) => report.updated += 1,
            Ok(Upserted::Existing(id)) => {
                debug!("Home slot {} already stored as {}", item.display_order, id);
                report.updated += 1;
            }
            Err(e) => {
                warn!("Failed to store home slot {}: {}", item.display_order, e);
                report.errors.push(format!("slot {}: {}", item.display_order, e));
                continue;
            }
        }
        if item.is_slider() {
            report.sliders += 1;
        }

        if language == Language::Da && options.create_en {
            if let Some(service) = translator {
                match translate_article(service, db, &article).await {
                    Ok(Translated::Created(_)) => report.en_created += 1,
                    Ok(Translated::Existing(en)) => {
                        if let Err(e) = place_en(db, &article, en).await {
                            report.errors.push(format!("en {}: {}", label(&article), e));
                        }
                    }
                    Err(e) => {
                        warn!("EN creation failed for {}: {}", label(&article), e);
                        report.errors.push(format!("en {}: {}", label(&article), e));
                    }
                }
            }
        }
        report.articles.push(article);
    }

    db.flush().await?;
    info!(
        "Relinked {} home ({} created, {} updated, {} sliders, {} EN created)",
        language,
        report.created,
        report.updated,
        report.sliders,
        report.en_created
    );
    Ok(report)
}
