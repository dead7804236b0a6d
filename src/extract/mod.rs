//! HTML extraction for rendered Sermitsiaq pages.
//!
//! Pure functions over `scraper` documents: card parsing, the home layout
//! and article detail blocks. Nothing here touches the network or the
//! database.

mod card;
mod detail;
mod image;
mod layout;

pub use card::{parse_card, parse_cards, ArticleCard};
pub use detail::parse_html_content;
pub use image::{image_sources, parse_picture};
pub use layout::{extract_home_layout, HomeLayout, LayoutItem};

use scraper::{ElementRef, Selector};

use crate::utils::text::normalize_whitespace;

/// Parse a selector that is known to be valid.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Whitespace-normalized text content of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

/// Text of the first match of `sel` under `el`, if non-empty.
pub(crate) fn first_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .map(element_text)
        .find(|t| !t.is_empty())
}

pub(crate) fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

pub(crate) fn classes(el: ElementRef<'_>) -> Vec<String> {
    el.value().classes().map(str::to_string).collect()
}

/// First class starting with `prefix`.
pub(crate) fn class_with_prefix(el: ElementRef<'_>, prefix: &str) -> Option<String> {
    el.value()
        .classes()
        .find(|c| c.starts_with(prefix))
        .map(str::to_string)
}

/// Non-empty attribute value.
pub(crate) fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Whether `el` has an ancestor (below `stop`) for which `pred` holds.
pub(crate) fn has_ancestor_within<F>(el: ElementRef<'_>, stop: ElementRef<'_>, pred: F) -> bool
where
    F: Fn(ElementRef<'_>) -> bool,
{
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|a| a.id() != stop.id())
        .any(pred)
}
