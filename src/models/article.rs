//! Article (card-level) and article detail records.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::block::ContentBlock;
use super::image::ImageData;
use super::language::Language;
use super::layout::{LayoutData, LayoutType};

/// A card-level article in one language.
///
/// Slider containers are also stored as articles: they carry an empty
/// `published_url` and are keyed by `(language, layout_type,
/// display_order, section = "home")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Database row ID (0 until inserted).
    pub id: i32,
    pub element_guid: Option<String>,

    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image_data: Option<ImageData>,

    pub published_url: String,
    pub published_url_en: Option<String>,
    pub k5a_url: Option<String>,
    pub site_alias: Option<String>,
    pub instance: Option<String>,

    pub section: String,
    pub category_id: Option<i32>,

    pub is_home: bool,
    pub display_order: i32,
    pub layout_type: Option<LayoutType>,
    pub grid_size: Option<i32>,
    pub layout_data: Option<LayoutData>,

    pub is_paywall: bool,
    pub paywall_class: Option<String>,
    pub is_featured: bool,
    pub is_temp: bool,
    pub article_type: Option<String>,
    pub position: Option<i32>,

    pub language: Language,
    pub original_language: Option<Language>,
    /// Weak reference to the DA article this row mirrors or translates.
    pub canonical_id: Option<i32>,

    pub published_date: Option<DateTime<FixedOffset>>,
    pub crawled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// A blank, unsaved article in the given language.
    pub fn new(
        language: Language,
        title: impl Into<String>,
        published_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            element_guid: None,
            title: title.into(),
            slug: None,
            excerpt: None,
            content: None,
            image_data: None,
            published_url: published_url.into(),
            published_url_en: None,
            k5a_url: None,
            site_alias: None,
            instance: None,
            section: "home".to_string(),
            category_id: None,
            is_home: false,
            display_order: 0,
            layout_type: None,
            grid_size: None,
            layout_data: None,
            is_paywall: false,
            paywall_class: None,
            is_featured: false,
            is_temp: false,
            article_type: None,
            position: None,
            language,
            original_language: None,
            canonical_id: None,
            published_date: None,
            crawled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_slider_container(&self) -> bool {
        self.layout_type.map(|lt| lt.is_slider()).unwrap_or(false) && self.published_url.is_empty()
    }

    /// Images referenced by this card, including slider item images.
    pub fn images_mut(&mut self) -> Vec<&mut ImageData> {
        let mut images: Vec<&mut ImageData> = Vec::new();
        if let Some(img) = self.image_data.as_mut() {
            images.push(img);
        }
        if let Some(LayoutData::Slider(slider)) = self.layout_data.as_mut() {
            images.extend(
                slider
                    .slider_articles
                    .iter_mut()
                    .filter_map(|item| item.image.as_mut()),
            );
        }
        images
    }
}

/// The parsed body of an article in one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub id: i32,
    pub published_url: String,
    pub language: Language,
    pub element_guid: Option<String>,
    pub content_blocks: Vec<ContentBlock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::layout::{SliderArticle, SliderLayout};

    #[test]
    fn test_slider_container_detection() {
        let mut article = Article::new(Language::Da, "Job", "");
        assert!(!article.is_slider_container());
        article.layout_type = Some(LayoutType::JobSlider);
        assert!(article.is_slider_container());
        article.published_url = "https://www.sermitsiaq.ag/job/x/1".into();
        assert!(!article.is_slider_container());
    }

    #[test]
    fn test_images_include_slider_items() {
        let mut article = Article::new(Language::Da, "", "");
        article.image_data = Some(ImageData::default());
        article.layout_data = Some(LayoutData::Slider(SliderLayout {
            slider_articles: vec![
                SliderArticle {
                    url: "u".into(),
                    title: "t".into(),
                    element_guid: None,
                    kicker: None,
                    excerpt: None,
                    image: Some(ImageData::default()),
                    is_paywall: false,
                },
                SliderArticle {
                    url: "v".into(),
                    title: "w".into(),
                    element_guid: None,
                    kicker: None,
                    excerpt: None,
                    image: None,
                    is_paywall: false,
                },
            ],
            ..Default::default()
        }));
        assert_eq!(article.images_mut().len(), 2);
    }
}
