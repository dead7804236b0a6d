//! Content blocks of an article detail.
//!
//! A detail is an ordered list of [`ContentBlock`]s. Each block keeps the
//! verbatim source markup in `html` next to its typed payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::image::{ImageVariant, ImageVariants};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub order: usize,
    #[serde(flatten)]
    pub kind: BlockKind,
    #[serde(default)]
    pub html: String,
}

impl ContentBlock {
    pub fn new(order: usize, kind: BlockKind, html: impl Into<String>) -> Self {
        Self {
            order,
            kind,
            html: html.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    ArticleMeta(ArticleMeta),
    Title(TextBlock),
    Subtitle(TextBlock),
    HeaderImageCaption(HeaderCaption),
    Paragraph(TextBlock),
    Heading(HeadingBlock),
    Intro(TextBlock),
    Image(ImageBlock),
    Ad(AdBlock),
    PaywallOffer(PaywallOffer),
    ArticleFooterTags(FooterTags),
}

impl BlockKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ArticleMeta(_) => "article_meta",
            Self::Title(_) => "title",
            Self::Subtitle(_) => "subtitle",
            Self::HeaderImageCaption(_) => "header_image_caption",
            Self::Paragraph(_) => "paragraph",
            Self::Heading(_) => "heading",
            Self::Intro(_) => "intro",
            Self::Image(_) => "image",
            Self::Ad(_) => "ad",
            Self::PaywallOffer(_) => "paywall_offer",
            Self::ArticleFooterTags(_) => "article_footer_tags",
        }
    }

    /// Blocks whose `text` mirrors the inner text of `html`.
    pub fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::Title(b) | Self::Subtitle(b) | Self::Paragraph(b) | Self::Intro(b) => {
                Some(&mut b.text)
            }
            Self::Heading(h) => Some(&mut h.text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
}

impl HeadingLevel {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "h1" => Some(Self::H1),
            "h2" => Some(Self::H2),
            "h3" => Some(Self::H3),
            "h4" => Some(Self::H4),
            "h5" => Some(Self::H5),
            "h6" => Some(Self::H6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingBlock {
    pub text: String,
    pub level: HeadingLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Byline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_image: Option<String>,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateEntry {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub datetime: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMeta {
    #[serde(default)]
    pub bylines: Vec<Byline>,
    /// Keyed by date type, e.g. `published` or `updated`.
    #[serde(default)]
    pub dates: BTreeMap<String, DateEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderCaption {
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop_webp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop_jpeg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_webp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_jpeg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ImageVariants for ImageSources {
    fn variant(&self, variant: ImageVariant) -> Option<&str> {
        match variant {
            ImageVariant::DesktopWebp => self.desktop_webp.as_deref(),
            ImageVariant::DesktopJpeg => self.desktop_jpeg.as_deref(),
            ImageVariant::MobileWebp => self.mobile_webp.as_deref(),
            ImageVariant::MobileJpeg => self.mobile_jpeg.as_deref(),
            ImageVariant::Fallback => self.fallback.as_deref(),
        }
    }

    fn set_variant(&mut self, variant: ImageVariant, url: String) {
        let slot = match variant {
            ImageVariant::DesktopWebp => &mut self.desktop_webp,
            ImageVariant::DesktopJpeg => &mut self.desktop_jpeg,
            ImageVariant::MobileWebp => &mut self.mobile_webp,
            ImageVariant::MobileJpeg => &mut self.mobile_jpeg,
            ImageVariant::Fallback => &mut self.fallback,
        };
        *slot = Some(url);
    }
}

/// `float_class` is one of `""`, `floatLeft`, `floatRight`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_guid: Option<String>,
    pub image_sources: ImageSources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub float_class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub name: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cta_text: String,
    #[serde(default)]
    pub cta_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaywallOffer {
    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FooterTags {
    #[serde(default)]
    pub tags: Vec<Tag>,
}
