//! Article card parsing.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Utc};
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::image::parse_picture;
use super::{attr, class_with_prefix, classes, element_text, first_text, selector};
use crate::models::layout::CardLayout;
use crate::models::{Article, ImageData, Language, Section, TitlePart};
use crate::utils::text::{collapse_whitespace, non_empty, normalize_whitespace};
use crate::utils::url::{resolve_url, split_article_path};

static URL_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[itemprop=url]"));
static HEADLINE: LazyLock<Selector> = LazyLock::new(|| selector("h2.headline, .headline"));
static DATE_PUBLISHED: LazyLock<Selector> =
    LazyLock::new(|| selector("time[itemprop=datePublished]"));
static PAYWALL_LABEL: LazyLock<Selector> = LazyLock::new(|| selector(".paywallLabel"));
static KICKER_FLOATING: LazyLock<Selector> =
    LazyLock::new(|| selector(".floatingText .kicker.floating"));
static KICKER_BELOW: LazyLock<Selector> = LazyLock::new(|| selector(".kicker.below"));
static KICKER: LazyLock<Selector> = LazyLock::new(|| selector(".kicker"));
static EXCERPT: LazyLock<Selector> =
    LazyLock::new(|| selector("[itemprop=description], .subtitle, .excerpt"));
static CONTENT: LazyLock<Selector> = LazyLock::new(|| selector(".content"));
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| selector("article[data-element-guid]"));

/// A parsed `<article data-element-guid>` card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleCard {
    pub element_guid: String,
    pub title: String,
    pub title_parts: Vec<TitlePart>,
    pub slug: Option<String>,
    pub url: String,
    pub k5a_url: Option<String>,
    pub section: String,
    pub site_alias: Option<String>,
    pub instance: Option<String>,
    pub published_date: Option<DateTime<FixedOffset>>,
    pub is_paywall: bool,
    pub paywall_class: Option<String>,
    pub excerpt: Option<String>,
    pub kicker_floating: Option<String>,
    pub kicker_below: Option<String>,
    #[serde(default)]
    pub kicker_below_classes: Vec<String>,
    /// Any kicker text, preferring the floating one.
    pub kicker: Option<String>,
    /// `bg-*` class on the card's inner `.content`.
    pub background_class: Option<String>,
    pub image_data: Option<ImageData>,
    pub article_id: Option<i64>,
    pub grid_size: Option<u8>,
}

impl ArticleCard {
    /// Placement payload for this card at the given slot.
    pub fn card_layout(&self, row_index: usize, position_in_row: usize) -> CardLayout {
        CardLayout {
            row_index,
            position_in_row,
            title_parts: self.title_parts.clone(),
            kicker: self.kicker.clone(),
            kicker_floating: self.kicker_floating.clone(),
            kicker_below: self.kicker_below.clone(),
            kicker_below_classes: self.kicker_below_classes.clone(),
            background_class: self.background_class.clone(),
        }
    }

    /// An unsaved article carrying this card's fields.
    pub fn to_article(&self, language: Language) -> Article {
        let mut article = Article::new(language, self.title.clone(), self.url.clone());
        article.element_guid = Some(self.element_guid.clone());
        article.slug = self.slug.clone();
        article.excerpt = self.excerpt.clone();
        article.image_data = self.image_data.clone();
        article.k5a_url = self.k5a_url.clone();
        article.site_alias = self.site_alias.clone();
        article.instance = self.instance.clone();
        article.section = self.section.clone();
        article.grid_size = self.grid_size.map(i32::from);
        article.is_paywall = self.is_paywall;
        article.paywall_class = self.paywall_class.clone();
        article.published_date = self.published_date;
        article.crawled_at = Some(Utc::now());
        article
    }

    /// This card applied over a stored row.
    ///
    /// Card fields are refreshed; identity, links, detail content and home
    /// placement are kept from `existing`.
    pub fn merge_into(&self, existing: Option<Article>, language: Language) -> Article {
        let mut fresh = self.to_article(language);
        let Some(old) = existing else {
            return fresh;
        };
        fresh.id = old.id;
        fresh.created_at = old.created_at;
        fresh.content = old.content;
        fresh.canonical_id = old.canonical_id;
        fresh.original_language = old.original_language;
        fresh.published_url_en = old.published_url_en;
        fresh.category_id = old.category_id;
        fresh.is_featured = old.is_featured;
        fresh.is_temp = old.is_temp;
        fresh.article_type = old.article_type;
        fresh.position = old.position;
        fresh.is_home = old.is_home;
        fresh.display_order = old.display_order;
        fresh.layout_type = old.layout_type;
        fresh.layout_data = old.layout_data;
        if fresh.published_date.is_none() {
            fresh.published_date = old.published_date;
        }
        if fresh.image_data.is_none() {
            fresh.image_data = old.image_data;
        }
        if fresh.grid_size.is_none() {
            fresh.grid_size = old.grid_size;
        }
        fresh
    }
}

/// Walk the headline's children into coloured segments.
///
/// Whitespace is collapsed inside and across segments, so the segments
/// concatenate to the normalized title. Whitespace between two spans is
/// kept as its own uncoloured segment.
fn title_parts(headline: ElementRef<'_>) -> Vec<TitlePart> {
    let mut parts: Vec<TitlePart> = Vec::new();
    for child in headline.children() {
        let (raw, color_class) = match child.value() {
            Node::Text(text) => (text.to_string(), None),
            Node::Element(_) => {
                let Some(el) = ElementRef::wrap(child) else {
                    continue;
                };
                let raw: String = el.text().collect();
                let color_class = if el.value().name() == "span" && !raw.trim().is_empty() {
                    let cls = classes(el).join(" ");
                    (!cls.is_empty()).then_some(cls)
                } else {
                    None
                };
                (raw, color_class)
            }
            _ => continue,
        };

        let mut text = collapse_whitespace(&raw);
        if parts.last().map_or(true, |p| p.text.ends_with(' ')) {
            text = text.trim_start().to_string();
        }
        if !text.is_empty() {
            parts.push(TitlePart { text, color_class });
        }
    }

    while parts.last().is_some_and(|p| p.text.trim().is_empty()) {
        parts.pop();
    }
    if let Some(last) = parts.last_mut() {
        last.text = last.text.trim_end().to_string();
    }
    parts
}

fn grid_size(el: ElementRef<'_>) -> Option<u8> {
    el.value()
        .classes()
        .filter_map(|c| c.strip_prefix("large-"))
        .find_map(|n| n.parse().ok())
}

fn card_section(el: ElementRef<'_>, path_section: Option<&str>) -> String {
    if let Some(section) = attr(el, "data-section") {
        return section.to_ascii_lowercase();
    }
    path_section
        .and_then(Section::from_str)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| Section::Home.as_str().to_string())
}

/// Parse one card. Returns `None` when the element lacks a GUID or link.
pub fn parse_card(el: ElementRef<'_>, base_url: &str) -> Option<ArticleCard> {
    let Some(element_guid) = attr(el, "data-element-guid") else {
        debug!("Skipping card without data-element-guid");
        return None;
    };
    let Some(href) = el.select(&URL_LINK).find_map(|a| attr(a, "href")) else {
        debug!("Skipping card {} without itemprop=url link", element_guid);
        return None;
    };
    let url = resolve_url(base_url, &href);
    let path = split_article_path(&url);

    let (title, title_parts) = match el.select(&HEADLINE).next() {
        Some(headline) => {
            let parts = title_parts(headline);
            let title = parts.iter().map(|p| p.text.as_str()).collect::<String>();
            (title, parts)
        }
        None => (String::new(), Vec::new()),
    };
    let title = if title.is_empty() {
        el.select(&URL_LINK)
            .next()
            .map(element_text)
            .unwrap_or_default()
    } else {
        title
    };

    let published_date = el
        .select(&DATE_PUBLISHED)
        .find_map(|t| attr(t, "datetime"))
        .and_then(|dt| DateTime::parse_from_rfc3339(&dt).ok());

    let paywall = el.select(&PAYWALL_LABEL).next();
    let kicker_floating = first_text(el, &KICKER_FLOATING);
    let kicker_below_el = el.select(&KICKER_BELOW).next();
    let kicker_below = kicker_below_el.map(element_text).filter(|t| !t.is_empty());
    let kicker_below_classes = kicker_below_el.map(classes).unwrap_or_default();
    let kicker = kicker_floating
        .clone()
        .or_else(|| kicker_below.clone())
        .or_else(|| first_text(el, &KICKER));

    let background_class = el
        .select(&CONTENT)
        .find_map(|content| class_with_prefix(content, "bg-"));

    Some(ArticleCard {
        title: normalize_whitespace(&title),
        title_parts,
        slug: path.slug,
        article_id: path.article_id.and_then(|id| id.parse().ok()),
        section: card_section(el, path.section.as_deref()),
        k5a_url: attr(el, "data-k5a-url"),
        site_alias: attr(el, "data-site-alias"),
        instance: attr(el, "data-instance"),
        published_date,
        is_paywall: paywall.is_some(),
        paywall_class: paywall.map(|p| classes(p).join(" ")),
        excerpt: first_text(el, &EXCERPT).and_then(|t| non_empty(&t)),
        kicker_floating,
        kicker_below,
        kicker_below_classes,
        kicker,
        background_class,
        image_data: parse_picture(el, base_url),
        grid_size: grid_size(el),
        url,
        element_guid,
    })
}

/// Parse every card on a listing page, first occurrence of a GUID wins.
pub fn parse_cards(html: &str, base_url: &str) -> Vec<ArticleCard> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    document
        .select(&ARTICLE)
        .filter_map(|el| parse_card(el, base_url))
        .filter(|card| seen.insert(card.element_guid.clone()))
        .collect()
}
