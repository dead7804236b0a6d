//! Article detail parsing into ordered content blocks.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::image::{image_sources, parse_picture};
use super::{attr, classes, element_text, first_text, has_class, selector};
use crate::models::{
    AdBlock, ArticleMeta, BlockKind, Byline, ContentBlock, DateEntry, FooterTags, HeaderCaption,
    HeadingBlock, HeadingLevel, ImageBlock, ImageData, Offer, PaywallOffer, Tag, TextBlock,
};
use crate::utils::text::{non_empty, normalize_whitespace, strip_prefix_ci};

static HEADER: LazyLock<Selector> = LazyLock::new(|| selector(".articleHeader"));
static META: LazyLock<Selector> = LazyLock::new(|| selector(".meta"));
static BYLINE: LazyLock<Selector> = LazyLock::new(|| selector(".byline"));
static BYLINE_NAME: LazyLock<Selector> =
    LazyLock::new(|| selector(".name, [itemprop=name], .fullname"));
static FIRSTNAME: LazyLock<Selector> = LazyLock::new(|| selector(".firstname"));
static LASTNAME: LazyLock<Selector> = LazyLock::new(|| selector(".lastname"));
static BYLINE_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(".description, .title"));
static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static TIME: LazyLock<Selector> = LazyLock::new(|| selector("time"));
static LABEL: LazyLock<Selector> = LazyLock::new(|| selector(".label, .dateLabel"));
static MAIN_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h1.headline.mainTitle"));
static ANY_H1: LazyLock<Selector> = LazyLock::new(|| selector("h1"));
static SUBTITLE: LazyLock<Selector> = LazyLock::new(|| selector("h2.subtitle"));
static HEADER_CAPTION: LazyLock<Selector> =
    LazyLock::new(|| selector("figcaption, .caption, .imageCaption"));
static CAPTION_TEXT: LazyLock<Selector> = LazyLock::new(|| selector(".caption"));
static CAPTION_AUTHOR: LazyLock<Selector> =
    LazyLock::new(|| selector(".author, .photographer, .byline"));
static LIVEFEED: LazyLock<Selector> = LazyLock::new(|| selector(".livefeed"));
static BODYTEXT: LazyLock<Selector> = LazyLock::new(|| selector(".bodytext"));
static INTRO: LazyLock<Selector> = LazyLock::new(|| selector(".intro"));
static CONTENT_TEXT: LazyLock<Selector> = LazyLock::new(|| selector(".content-text"));
static OFFERS: LazyLock<Selector> = LazyLock::new(|| selector(".iteras-offers"));
static OFFER: LazyLock<Selector> = LazyLock::new(|| selector(".iteras-offer"));
static OFFER_NAME: LazyLock<Selector> =
    LazyLock::new(|| selector(".iteras-offer-name, .name, h2, h3, h4"));
static OFFER_PRO: LazyLock<Selector> = LazyLock::new(|| selector("li"));
static OFFER_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(".iteras-offers-description, .iteras-description, .description"));
static FOOTER: LazyLock<Selector> = LazyLock::new(|| selector(".articleFooter"));

const PHOTO_PREFIXES: [&str; 2] = ["Foto:", "Assi:"];

/// Accumulates blocks with consecutive `order` values.
struct Blocks {
    blocks: Vec<ContentBlock>,
}

impl Blocks {
    fn push(&mut self, kind: BlockKind, el: ElementRef<'_>) {
        let order = self.blocks.len();
        self.blocks.push(ContentBlock::new(order, kind, el.html()));
    }

    fn push_text(&mut self, el: ElementRef<'_>, make: fn(TextBlock) -> BlockKind) {
        let text = element_text(el);
        if !text.is_empty() {
            self.push(make(TextBlock { text }), el);
        }
    }
}

fn strip_photo_prefix(s: &str) -> Option<String> {
    non_empty(strip_prefix_ci(s, &PHOTO_PREFIXES))
}

fn byline(el: ElementRef<'_>) -> Option<Byline> {
    let fullname = first_text(el, &BYLINE_NAME).or_else(|| {
        let first = first_text(el, &FIRSTNAME)?;
        Some(match first_text(el, &LASTNAME) {
            Some(last) => format!("{} {}", first, last),
            None => first,
        })
    })?;
    let (split_first, split_last) = match fullname.split_once(' ') {
        Some((f, l)) => (f.to_string(), l.to_string()),
        None => (fullname.clone(), String::new()),
    };
    Some(Byline {
        author_image: el
            .select(&IMG)
            .find_map(|img| attr(img, "src").or_else(|| attr(img, "data-src"))),
        firstname: first_text(el, &FIRSTNAME).unwrap_or(split_first),
        lastname: first_text(el, &LASTNAME).unwrap_or(split_last),
        description: first_text(el, &BYLINE_DESCRIPTION),
        author_url: el.select(&LINK).find_map(|a| attr(a, "href")),
        fullname,
    })
}

fn date_key(time: ElementRef<'_>, index: usize) -> String {
    match time.value().attr("itemprop") {
        Some("datePublished") => "published".to_string(),
        Some("dateModified") => "updated".to_string(),
        _ => time
            .value()
            .classes()
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| format!("date_{}", index)),
    }
}

fn article_meta(meta: ElementRef<'_>) -> ArticleMeta {
    let bylines = meta.select(&BYLINE).filter_map(byline).collect();
    let mut dates = BTreeMap::new();
    for (index, time) in meta.select(&TIME).enumerate() {
        let label = time
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|p| first_text(p, &LABEL))
            .unwrap_or_default();
        dates.insert(
            date_key(time, index),
            DateEntry {
                label,
                datetime: attr(time, "datetime").unwrap_or_default(),
                title: attr(time, "title").unwrap_or_default(),
                text: element_text(time),
            },
        );
    }
    ArticleMeta { bylines, dates }
}

fn header_caption(header: ElementRef<'_>) -> Option<(HeaderCaption, ElementRef<'_>)> {
    let el = header.select(&HEADER_CAPTION).next()?;
    let (caption, author) = caption_and_author(el);
    if caption.is_empty() && author.is_none() {
        return None;
    }
    Some((HeaderCaption { caption, author }, el))
}

/// Split a caption element into its text and the prefix-stripped author.
fn caption_and_author(el: ElementRef<'_>) -> (String, Option<String>) {
    let author_raw = first_text(el, &CAPTION_AUTHOR);
    let caption = match first_text(el, &CAPTION_TEXT) {
        Some(text) => text,
        None => {
            let full = element_text(el);
            match author_raw.as_deref() {
                Some(author) => normalize_whitespace(&full.replace(author, "")),
                None => full,
            }
        }
    };
    let author = author_raw.as_deref().and_then(strip_photo_prefix);
    (caption, author)
}

fn float_class(figure: ElementRef<'_>) -> String {
    let cls = classes(figure);
    let find = |side: &str| cls.iter().any(|c| c.ends_with(side));
    let desktop = cls.iter().find_map(|c| match c.as_str() {
        "desktop-floatLeft" => Some("floatLeft"),
        "desktop-floatRight" => Some("floatRight"),
        _ => None,
    });
    desktop
        .or_else(|| find("floatLeft").then_some("floatLeft"))
        .or_else(|| find("floatRight").then_some("floatRight"))
        .unwrap_or("")
        .to_string()
}

fn image_block(figure: ElementRef<'_>) -> Option<ImageBlock> {
    let Some(image) = parse_picture(figure, "").or_else(|| {
        // Plain <img> figures still carry a usable fallback.
        figure.select(&IMG).next().and_then(|img| {
            attr(img, "src").map(|src| ImageData {
                fallback: Some(src),
                alt: attr(img, "alt"),
                title: attr(img, "title"),
                ..Default::default()
            })
        })
    }) else {
        debug!("Dropping figure without image sources");
        return None;
    };

    let (caption, author) = match figure.select(&HEADER_CAPTION).next() {
        Some(el) => caption_and_author(el),
        None => (String::new(), None),
    };

    Some(ImageBlock {
        element_guid: attr(figure, "data-element-guid").or(image.element_guid.clone()),
        image_sources: image_sources(&image),
        caption: non_empty(&caption),
        author,
        float_class: float_class(figure),
    })
}

fn is_ad(el: ElementRef<'_>) -> bool {
    el.value().attr("data-ad-slot").is_some()
        || el
            .value()
            .id()
            .map(|id| id.starts_with("div-gpt-ad"))
            .unwrap_or(false)
        || el
            .value()
            .classes()
            .any(|c| c.contains("google-ad") || c == "adunit" || c == "ad")
}

/// Walk a body container in document order.
fn walk(container: ElementRef<'_>, out: &mut Blocks, paragraph: fn(TextBlock) -> BlockKind) {
    for child in container.children().filter_map(ElementRef::wrap) {
        let name = child.value().name();
        if let Some(level) = HeadingLevel::from_tag(name) {
            let text = element_text(child);
            if !text.is_empty() {
                out.push(BlockKind::Heading(HeadingBlock { text, level }), child);
            }
            continue;
        }
        match name {
            "p" => out.push_text(child, paragraph),
            "figure" => {
                if let Some(image) = image_block(child) {
                    out.push(BlockKind::Image(image), child);
                }
            }
            "script" | "style" | "noscript" => {}
            _ if is_ad(child) => {
                let slot = attr(child, "data-ad-slot").or_else(|| attr(child, "id"));
                out.push(
                    BlockKind::Ad(AdBlock {
                        slot,
                        classes: classes(child),
                    }),
                    child,
                );
            }
            _ => walk(child, out, paragraph),
        }
    }
}

fn paywall_offer(el: ElementRef<'_>) -> PaywallOffer {
    let offers = el
        .select(&OFFER)
        .filter_map(|offer| {
            let name = first_text(offer, &OFFER_NAME)?;
            let cta = offer.select(&LINK).next();
            Some(Offer {
                name,
                pros: offer
                    .select(&OFFER_PRO)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
                    .collect(),
                cta_text: cta.map(element_text).unwrap_or_default(),
                cta_url: cta.and_then(|a| attr(a, "href")).unwrap_or_default(),
            })
        })
        .collect();
    PaywallOffer {
        offers,
        description: first_text(el, &OFFER_DESCRIPTION),
    }
}

/// Parse a rendered article page into ordered content blocks.
pub fn parse_html_content(html: &str) -> Vec<ContentBlock> {
    let document = Html::parse_document(html);
    let mut out = Blocks { blocks: Vec::new() };

    if let Some(header) = document.select(&HEADER).next() {
        if let Some(meta) = header.select(&META).next() {
            out.push(BlockKind::ArticleMeta(article_meta(meta)), meta);
        }
        if let Some(title) = header
            .select(&MAIN_TITLE)
            .next()
            .or_else(|| header.select(&ANY_H1).next())
        {
            out.push_text(title, BlockKind::Title);
        }
        if let Some(subtitle) = header.select(&SUBTITLE).next() {
            out.push_text(subtitle, BlockKind::Subtitle);
        }
        if let Some((caption, el)) = header_caption(header) {
            out.push(BlockKind::HeaderImageCaption(caption), el);
        }
    } else if let Some(title) = document.select(&MAIN_TITLE).next() {
        out.push_text(title, BlockKind::Title);
    }

    let body = document
        .select(&LIVEFEED)
        .next()
        .or_else(|| document.select(&BODYTEXT).next());
    match body {
        Some(body) => {
            for intro in body.select(&INTRO) {
                let before = out.blocks.len();
                walk(intro, &mut out, BlockKind::Intro);
                if out.blocks.len() == before {
                    out.push_text(intro, BlockKind::Intro);
                }
            }
            let sections: Vec<_> = body.select(&CONTENT_TEXT).collect();
            if sections.is_empty() && has_class(body, "livefeed") {
                walk(body, &mut out, BlockKind::Paragraph);
            }
            for section in sections {
                walk(section, &mut out, BlockKind::Paragraph);
            }
        }
        None => debug!("No .bodytext or .livefeed container found"),
    }

    if let Some(offers) = document.select(&OFFERS).next() {
        out.push(BlockKind::PaywallOffer(paywall_offer(offers)), offers);
    }

    if let Some(footer) = document.select(&FOOTER).next() {
        let tags: Vec<Tag> = footer
            .select(&LINK)
            .filter_map(|a| {
                let text = element_text(a);
                let url = attr(a, "href")?;
                (!text.is_empty()).then_some(Tag { text, url })
            })
            .collect();
        if !tags.is_empty() {
            out.push(BlockKind::ArticleFooterTags(FooterTags { tags }), footer);
        }
    }

    out.blocks
}
