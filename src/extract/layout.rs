//! Home page layout extraction.
//!
//! The home grid is a sequence of `.row`s inside `.page-content`. Each row
//! becomes one or more typed slots, numbered with
//! `display_order = row_index * 1000 + position_in_row`.

use std::collections::HashSet;
use std::io::Write;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::card::{parse_card, ArticleCard};
use super::{attr, element_text, first_text, has_ancestor_within, has_class, selector};
use crate::models::layout::{display_order, ListLayout, SliderLayout};
use crate::models::{HeaderLink, LayoutData, LayoutType, ListItem, SliderArticle};
use crate::utils::url::resolve_url;

static PAGE_CONTENT: LazyLock<Selector> = LazyLock::new(|| selector(".page-content"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector(".row"));
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| selector("article"));
static SCROLLER: LazyLock<Selector> = LazyLock::new(|| selector(".articlescroller"));
static LIST: LazyLock<Selector> = LazyLock::new(|| selector(".articlesByTag, .toplist"));
static LIST_HEADING: LazyLock<Selector> =
    LazyLock::new(|| selector("h2, h3, h4, .title, .header"));
static LIST_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static SLIDER_TITLE: LazyLock<Selector> = LazyLock::new(|| {
    selector(".articlescroller-header h2, .articlescroller-header h3, .articlescroller-title, h2.title, .section-title")
});
static SLIDER_HEADER_LINK: LazyLock<Selector> = LazyLock::new(|| {
    selector(".articlescroller-header a[href], .header-link a[href], a.header-link")
});
static SOURCE_CLASS_HOLDER: LazyLock<Selector> = LazyLock::new(|| selector("[class*=source_]"));

/// One typed slot of the home layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutItem {
    pub row_index: usize,
    pub position_in_row: usize,
    pub display_order: i32,
    pub layout_type: LayoutType,
    /// The card in this slot; `None` for slider containers.
    pub card: Option<ArticleCard>,
    pub layout_data: LayoutData,
}

impl LayoutItem {
    pub fn is_slider(&self) -> bool {
        self.card.is_none()
    }
}

/// Ordered slots of a rendered home page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeLayout {
    pub base_url: String,
    pub items: Vec<LayoutItem>,
}

impl HomeLayout {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn cards(&self) -> impl Iterator<Item = &ArticleCard> {
        self.items.iter().filter_map(|i| i.card.as_ref())
    }

    /// Number of distinct source rows that produced slots.
    pub fn row_count(&self) -> usize {
        self.items
            .iter()
            .map(|i| i.row_index)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Write a CSV summary with rows renumbered densely from 1.
    pub fn write_csv<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(
            out,
            "row,position,display_order,layout_type,element_guid,title,url,items"
        )?;
        let mut dense_row = 0;
        let mut last_row = None;
        for item in &self.items {
            if last_row != Some(item.row_index) {
                dense_row += 1;
                last_row = Some(item.row_index);
            }
            let (guid, title, url, items) = match (&item.card, &item.layout_data) {
                (_, LayoutData::Slider(slider)) => (
                    String::new(),
                    slider.slider_title.clone().unwrap_or_default(),
                    String::new(),
                    slider.slider_articles.len(),
                ),
                (Some(card), LayoutData::WithList(list)) => (
                    card.element_guid.clone(),
                    card.title.clone(),
                    card.url.clone(),
                    list.list_items.len(),
                ),
                (Some(card), _) => (
                    card.element_guid.clone(),
                    card.title.clone(),
                    card.url.clone(),
                    0,
                ),
                (None, _) => (String::new(), String::new(), String::new(), 0),
            };
            writeln!(
                out,
                "{},{},{},{},{},{},{},{}",
                dense_row,
                item.position_in_row,
                item.display_order,
                item.layout_type,
                csv_field(&guid),
                csv_field(&title),
                csv_field(&url),
                items
            )?;
        }
        Ok(())
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Top-level rows of the page content, skipping rows nested in other rows.
fn top_level_rows<'a>(container: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    container
        .select(&ROW)
        .filter(|row| !has_ancestor_within(*row, container, |a| has_class(a, "row")))
        .collect()
}

/// `source_*` flag of a slider row.
fn source_class(row: ElementRef<'_>) -> Option<String> {
    std::iter::once(row)
        .chain(row.select(&SOURCE_CLASS_HOLDER))
        .find_map(|el| {
            el.value()
                .classes()
                .find(|c| c.starts_with("source_"))
                .map(str::to_string)
        })
}

fn slider_layout_type(source: Option<&str>) -> LayoutType {
    match source {
        Some("source_nuuk") => LayoutType::FiveArticles,
        Some(s) if s.starts_with("source_job") || s == "source_feed_random_kl_jobs" => {
            LayoutType::JobSlider
        }
        _ => LayoutType::Slider,
    }
}

/// Whether `first` comes before `second` in document order under `root`.
fn precedes(root: ElementRef<'_>, first: ElementRef<'_>, second: ElementRef<'_>) -> bool {
    for node in root.descendants() {
        if node.id() == first.id() {
            return true;
        }
        if node.id() == second.id() {
            return false;
        }
    }
    false
}

struct RowParser<'a> {
    base_url: &'a str,
    seen: HashSet<String>,
    items: Vec<LayoutItem>,
}

impl<'a> RowParser<'a> {
    /// Parse cards in order, dropping GUIDs claimed by an earlier row.
    fn cards(&mut self, elements: &[ElementRef<'_>]) -> Vec<ArticleCard> {
        let mut cards = Vec::new();
        for el in elements {
            let Some(card) = parse_card(*el, self.base_url) else {
                continue;
            };
            if !self.seen.insert(card.element_guid.clone()) {
                debug!("Card {} already placed in an earlier row", card.element_guid);
                continue;
            }
            cards.push(card);
        }
        cards
    }

    fn push_cards(&mut self, row_index: usize, layout_type: LayoutType, cards: Vec<ArticleCard>) {
        for (position, card) in cards.into_iter().enumerate() {
            let layout_data = LayoutData::Card(card.card_layout(row_index, position));
            self.items.push(LayoutItem {
                row_index,
                position_in_row: position,
                display_order: display_order(row_index, position),
                layout_type,
                card: Some(card),
                layout_data,
            });
        }
    }

    fn slider_row(&mut self, row_index: usize, row: ElementRef<'_>, source: Option<String>) {
        let layout_type = slider_layout_type(source.as_deref());
        let elements: Vec<_> = row.select(&ARTICLE).collect();

        if layout_type == LayoutType::FiveArticles {
            let cards = self.cards(&elements);
            if cards.is_empty() {
                debug!("Skipping empty NUUK row {}", row_index);
            }
            self.push_cards(row_index, layout_type, cards);
            return;
        }

        let slider_articles: Vec<SliderArticle> = self
            .cards(&elements)
            .into_iter()
            .map(|card| SliderArticle {
                url: card.url,
                title: card.title,
                element_guid: Some(card.element_guid),
                kicker: card.kicker,
                excerpt: card.excerpt,
                image: card.image_data,
                is_paywall: card.is_paywall,
            })
            .collect();
        if slider_articles.is_empty() {
            debug!("Skipping slider row {} without articles", row_index);
            return;
        }

        let header_link = row.select(&SLIDER_HEADER_LINK).find_map(|a| {
            let text = element_text(a);
            let href = attr(a, "href")?;
            (!text.is_empty()).then(|| HeaderLink {
                text,
                url: resolve_url(self.base_url, &href),
            })
        });

        let slider = SliderLayout {
            row_index,
            slider_title: first_text(row, &SLIDER_TITLE),
            header_link,
            slider_articles,
            source_class: source,
        };
        self.items.push(LayoutItem {
            row_index,
            position_in_row: 0,
            display_order: display_order(row_index, 0),
            layout_type,
            card: None,
            layout_data: LayoutData::Slider(slider),
        });
    }

    fn list_row(&mut self, row_index: usize, row: ElementRef<'_>, list: ElementRef<'_>) {
        let elements: Vec<_> = row
            .select(&ARTICLE)
            .filter(|a| !has_ancestor_within(*a, row, |p| p.id() == list.id()))
            .collect();
        let Some(first) = elements.first().copied() else {
            return;
        };
        let layout_type = if precedes(row, list, first) {
            LayoutType::OneWithListLeft
        } else {
            LayoutType::OneWithListRight
        };

        let list_title = first_text(list, &LIST_HEADING);
        let list_items: Vec<ListItem> = list
            .select(&LIST_LINK)
            .filter_map(|a| {
                let title = element_text(a);
                let href = attr(a, "href")?;
                (!title.is_empty()).then(|| ListItem {
                    title,
                    url: resolve_url(self.base_url, &href),
                })
            })
            .collect();

        let cards = self.cards(&elements);
        for (position, card) in cards.into_iter().enumerate() {
            // Only the first card owns the list; extra cards keep the slot type.
            let (title, items) = if position == 0 {
                (list_title.clone(), list_items.clone())
            } else {
                (None, Vec::new())
            };
            let layout_data = LayoutData::WithList(ListLayout {
                card: card.card_layout(row_index, position),
                list_title: title,
                list_items: items,
            });
            self.items.push(LayoutItem {
                row_index,
                position_in_row: position,
                display_order: display_order(row_index, position),
                layout_type,
                card: Some(card),
                layout_data,
            });
        }
    }

    fn card_row(&mut self, row_index: usize, row: ElementRef<'_>) {
        let elements: Vec<_> = row
            .select(&ARTICLE)
            .filter(|a| !has_ancestor_within(*a, row, |p| p.value().name() == "article"))
            .collect();
        let article_count = elements.len();
        let cards = self.cards(&elements);
        if cards.is_empty() {
            debug!("Skipping row {} without linkable articles", row_index);
            return;
        }

        let from_count = LayoutType::from_card_count(article_count);
        let mut layout_type = from_count
            .or_else(|| cards[0].grid_size.and_then(LayoutType::from_grid_size))
            .unwrap_or(if article_count <= 1 {
                LayoutType::OneFull
            } else {
                LayoutType::ThreeArticles
            });

        if article_count == 1 && cards[0].background_class.is_some() {
            layout_type = LayoutType::OneSpecialBg;
        }

        self.push_cards(row_index, layout_type, cards);
    }
}

/// Extract the ordered home layout from a rendered home page.
pub fn extract_home_layout(html: &str, base_url: &str) -> HomeLayout {
    let document = Html::parse_document(html);
    let mut parser = RowParser {
        base_url,
        seen: HashSet::new(),
        items: Vec::new(),
    };

    let Some(container) = document.select(&PAGE_CONTENT).next() else {
        debug!("No .page-content container found");
        return HomeLayout {
            base_url: base_url.to_string(),
            items: Vec::new(),
        };
    };

    for (row_index, row) in top_level_rows(container).into_iter().enumerate() {
        if row.select(&SCROLLER).next().is_some() {
            parser.slider_row(row_index, row, source_class(row));
        } else if let Some(list) = row.select(&LIST).next() {
            parser.list_row(row_index, row, list);
        } else {
            parser.card_row(row_index, row);
        }
    }

    HomeLayout {
        base_url: base_url.to_string(),
        items: parser.items,
    }
}
