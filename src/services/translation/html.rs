//! Translation of the text nodes inside a block's markup.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::TranslationService;
use crate::utils::text::{capitalize_first_alpha, normalize_whitespace};
use crate::utils::{decode_entities, html_escape};

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static COMMA_LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\p{L})").unwrap());

enum Segment<'a> {
    Tag(&'a str),
    Text(&'a str),
}

fn segments(html: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in TAG.find_iter(html) {
        if m.start() > last {
            out.push(Segment::Text(&html[last..m.start()]));
        }
        out.push(Segment::Tag(m.as_str()));
        last = m.end();
    }
    if last < html.len() {
        out.push(Segment::Text(&html[last..]));
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Spacing repairs applied to text nodes only, so attributes stay intact.
///
/// * word character directly before a tag: `candies<span` → `candies <span`
/// * comma directly before a letter: `,KNQK` → `, KNQK`
/// * closing tag directly before a letter: `</span>KNQK` → `</span> KNQK`
pub fn fix_spacing(html: &str) -> String {
    let parts = segments(html);
    let mut out = String::with_capacity(html.len() + 8);
    for (i, part) in parts.iter().enumerate() {
        match part {
            Segment::Tag(tag) => out.push_str(tag),
            Segment::Text(text) => {
                let after_closing = i > 0
                    && matches!(parts[i - 1], Segment::Tag(t) if t.starts_with("</"));
                if after_closing && text.chars().next().is_some_and(char::is_alphabetic) {
                    out.push(' ');
                }
                out.push_str(&COMMA_LETTER.replace_all(text, ", $1"));
                let before_tag = matches!(parts.get(i + 1), Some(Segment::Tag(_)));
                if before_tag && text.chars().last().is_some_and(is_word_char) {
                    out.push(' ');
                }
            }
        }
    }
    out
}

/// Plain text of a markup fragment.
pub(crate) fn html_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    normalize_whitespace(&fragment.root_element().text().collect::<String>())
}

/// Translate every `>TEXT<` segment of `html`.
///
/// The first translated text node gets its first letter capitalized.
/// Returns the new markup and its re-derived plain text.
pub async fn translate_html(service: &TranslationService, html: &str) -> (String, String) {
    let prepared = fix_spacing(html);
    let mut out = String::with_capacity(prepared.len());
    let mut first = true;

    for part in segments(&prepared) {
        match part {
            Segment::Tag(tag) => out.push_str(tag),
            Segment::Text(text) if text.trim().is_empty() => out.push_str(text),
            Segment::Text(text) => {
                let decoded = decode_entities(text);
                let mut translated = service.text(&decoded).await;
                if first && translated != decoded {
                    translated = capitalize_first_alpha(&translated);
                }
                first = false;
                if translated == decoded {
                    out.push_str(text);
                } else {
                    out.push_str(&html_escape(&translated));
                }
            }
        }
    }

    let fixed = fix_spacing(&out);
    let text = html_text(&fixed);
    (fixed, text)
}

#[cfg(test)]
mod tests {
    use super::super::testing::FakeTranslator;
    use super::*;

    #[test]
    fn test_spacing_fixes() {
        assert_eq!(fix_spacing("candies<span>x</span>"), "candies <span>x </span>");
        assert_eq!(fix_spacing("<p>Nuuk,KNQK</p>"), "<p>Nuuk, KNQK </p>");
        assert_eq!(fix_spacing("<b>A</b>KNQK"), "<b>A </b> KNQK");
    }

    #[test]
    fn test_spacing_leaves_attributes_alone() {
        let html = r#"<img srcset="a.jpg 1x,b.jpg 2x" alt="x">"#;
        assert_eq!(fix_spacing(html), html);
    }

    #[tokio::test]
    async fn test_translate_text_nodes() {
        let service = FakeTranslator::with(&[
            ("flyet landede", "the plane landed"),
            ("i Nuuk", "in Nuuk"),
            ("Ole & Bo", "Ole & Bo team"),
        ])
        .service();

        let (html, text) = translate_html(
            &service,
            r#"<p><a href="/samfund/x,y">flyet landede</a> <b>i Nuuk</b></p>"#,
        )
        .await;
        assert_eq!(
            html,
            r#"<p><a href="/samfund/x,y">The plane landed </a> <b>in Nuuk </b></p>"#
        );
        assert_eq!(text, "The plane landed in Nuuk");

        let (html, _) = translate_html(&service, "<p>Ole &amp; Bo</p>").await;
        assert_eq!(html, "<p>Ole &amp; Bo team </p>");
    }
}
