//! Card and block image payloads.

use serde::{Deserialize, Serialize};

use crate::utils::url::extract_image_id;

/// The five URL slots an image can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageVariant {
    DesktopWebp,
    DesktopJpeg,
    MobileWebp,
    MobileJpeg,
    Fallback,
}

impl ImageVariant {
    pub const ALL: [ImageVariant; 5] = [
        ImageVariant::DesktopWebp,
        ImageVariant::DesktopJpeg,
        ImageVariant::MobileWebp,
        ImageVariant::MobileJpeg,
        ImageVariant::Fallback,
    ];

    /// Variants downloaded when not fetching every format.
    pub const PRIMARY: [ImageVariant; 2] = [ImageVariant::DesktopWebp, ImageVariant::Fallback];

    /// Variants filled from a primary download.
    pub const BACKFILLED: [ImageVariant; 3] = [
        ImageVariant::DesktopJpeg,
        ImageVariant::MobileWebp,
        ImageVariant::MobileJpeg,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::DesktopWebp => "desktop_webp",
            Self::DesktopJpeg => "desktop_jpeg",
            Self::MobileWebp => "mobile_webp",
            Self::MobileJpeg => "mobile_jpeg",
            Self::Fallback => "fallback",
        }
    }
}

/// Anything holding a set of image variant URLs.
///
/// Implemented by card images and detail image blocks so the asset fetcher
/// can rewrite both in place.
pub trait ImageVariants {
    fn variant(&self, variant: ImageVariant) -> Option<&str>;
    fn set_variant(&mut self, variant: ImageVariant, url: String);

    /// All present URLs in variant order.
    fn variant_urls(&self) -> Vec<&str> {
        ImageVariant::ALL
            .iter()
            .filter_map(|v| self.variant(*v))
            .filter(|u| !u.is_empty())
            .collect()
    }

    /// First numeric image id found in any variant URL.
    fn image_id(&self) -> Option<String> {
        self.variant_urls().into_iter().find_map(extract_image_id)
    }
}

/// Image attached to an article card (`image_data` column).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
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
    pub desktop_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_height: Option<u32>,
}

impl ImageData {
    /// True when no URL slot is populated.
    pub fn is_empty(&self) -> bool {
        self.variant_urls().is_empty()
    }
}

impl ImageVariants for ImageData {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_id_from_any_variant() {
        let img = ImageData {
            fallback: Some("https://image.sermitsiaq.ag/2329660.webp?imageId=2329660".into()),
            ..Default::default()
        };
        assert_eq!(img.image_id().as_deref(), Some("2329660"));
        assert!(!img.is_empty());
        assert!(ImageData::default().is_empty());
    }

    #[test]
    fn test_serialization_skips_missing_keys() {
        let img = ImageData {
            desktop_webp: Some("a.webp".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&img).unwrap();
        assert_eq!(json, r#"{"desktop_webp":"a.webp"}"#);
    }
}
