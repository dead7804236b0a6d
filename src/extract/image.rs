//! `<picture>` parsing into image variant URLs.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{attr, selector};
use crate::models::{ImageData, ImageSources};
use crate::utils::url::resolve_url;

static PICTURE: LazyLock<Selector> = LazyLock::new(|| selector("picture"));
static SOURCE: LazyLock<Selector> = LazyLock::new(|| selector("source"));
static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img"));

#[derive(Clone, Copy, PartialEq, Eq)]
enum Viewport {
    Desktop,
    Mobile,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Format {
    Webp,
    Jpeg,
}

fn viewport(media: &str) -> Option<Viewport> {
    let media = media.replace(' ', "").to_ascii_lowercase();
    if media.contains("min-width:768px") {
        Some(Viewport::Desktop)
    } else if media.contains("max-width:767px") {
        Some(Viewport::Mobile)
    } else {
        None
    }
}

fn format(mime: &str) -> Option<Format> {
    let mime = mime.to_ascii_lowercase();
    if mime.contains("webp") {
        Some(Format::Webp)
    } else if mime.contains("jpeg") || mime.contains("jpg") {
        Some(Format::Jpeg)
    } else {
        None
    }
}

/// First URL of a `srcset` list.
fn first_srcset_url(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .next()
        .and_then(|candidate| candidate.split_whitespace().next())
        .filter(|u| !u.is_empty())
}

fn dimension(el: ElementRef<'_>, name: &str) -> Option<u32> {
    attr(el, name).and_then(|v| v.trim_end_matches("px").parse().ok())
}

/// Parse the first `<picture>` at or below `el`.
///
/// Returns `None` when no URL could be found.
pub fn parse_picture(el: ElementRef<'_>, base_url: &str) -> Option<ImageData> {
    let picture = if el.value().name() == "picture" {
        el
    } else {
        el.select(&PICTURE).next()?
    };

    let mut image = ImageData {
        element_guid: attr(picture, "data-element-guid").or_else(|| {
            picture
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|p| attr(p, "data-element-guid"))
        }),
        ..Default::default()
    };

    for source in picture.select(&SOURCE) {
        let Some(url) = attr(source, "srcset")
            .as_deref()
            .and_then(first_srcset_url)
            .map(|u| resolve_url(base_url, u))
        else {
            continue;
        };
        let Some(vp) = attr(source, "media").as_deref().and_then(viewport) else {
            continue;
        };
        let fmt = attr(source, "type")
            .as_deref()
            .and_then(format)
            .unwrap_or(Format::Webp);

        let slot = match (vp, fmt) {
            (Viewport::Desktop, Format::Webp) => &mut image.desktop_webp,
            (Viewport::Desktop, Format::Jpeg) => &mut image.desktop_jpeg,
            (Viewport::Mobile, Format::Webp) => &mut image.mobile_webp,
            (Viewport::Mobile, Format::Jpeg) => &mut image.mobile_jpeg,
        };
        if slot.is_none() {
            *slot = Some(url);
        }

        let (width, height) = (dimension(source, "width"), dimension(source, "height"));
        match vp {
            Viewport::Desktop => {
                image.desktop_width = image.desktop_width.or(width);
                image.desktop_height = image.desktop_height.or(height);
            }
            Viewport::Mobile => {
                image.mobile_width = image.mobile_width.or(width);
                image.mobile_height = image.mobile_height.or(height);
            }
        }
    }

    if let Some(img) = picture.select(&IMG).next() {
        image.fallback = attr(img, "src")
            .or_else(|| attr(img, "data-src"))
            .map(|u| resolve_url(base_url, &u));
        image.alt = attr(img, "alt");
        image.title = attr(img, "title");
        image.desktop_width = image.desktop_width.or_else(|| dimension(img, "width"));
        image.desktop_height = image.desktop_height.or_else(|| dimension(img, "height"));
    }

    if image.is_empty() {
        None
    } else {
        Some(image)
    }
}

/// Detail-block view of a card image.
pub fn image_sources(image: &ImageData) -> ImageSources {
    ImageSources {
        desktop_webp: image.desktop_webp.clone(),
        desktop_jpeg: image.desktop_jpeg.clone(),
        mobile_webp: image.mobile_webp.clone(),
        mobile_jpeg: image.mobile_jpeg.clone(),
        fallback: image.fallback.clone(),
        alt: image.alt.clone(),
        title: image.title.clone(),
        width: image.desktop_width.or(image.mobile_width),
        height: image.desktop_height.or(image.mobile_height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const PICTURE_HTML: &str = r#"
        <div class="media" data-element-guid="IMG-1">
          <picture>
            <source media="(min-width: 768px)" type="image/webp"
                    srcset="https://image.sermitsiaq.ag/2329660.webp?imageId=2329660&width=960 1x, https://image.sermitsiaq.ag/2329660.webp?imageId=2329660&width=1920 2x"
                    width="960" height="540">
            <source media="(min-width: 768px)" type="image/jpeg"
                    srcset="https://image.sermitsiaq.ag/2329660.webp?imageId=2329660&format=jpg">
            <source media="(max-width: 767px)" type="image/webp"
                    srcset="https://image.sermitsiaq.ag/2329660.webp?imageId=2329660&width=480"
                    width="480" height="270">
            <img src="/2329660.webp?imageId=2329660&format=jpg" alt="Havnen i Nuuk" title="Foto: KNR">
          </picture>
        </div>"#;

    #[test]
    fn test_picture_variants() {
        let doc = Html::parse_fragment(PICTURE_HTML);
        let root = doc.root_element();
        let image = parse_picture(root, "https://www.sermitsiaq.ag").unwrap();

        assert_eq!(image.element_guid.as_deref(), Some("IMG-1"));
        assert!(image.desktop_webp.as_deref().unwrap().ends_with("width=960"));
        assert!(image.desktop_jpeg.as_deref().unwrap().ends_with("format=jpg"));
        assert!(image.mobile_webp.as_deref().unwrap().ends_with("width=480"));
        assert_eq!(image.mobile_jpeg, None);
        assert_eq!(
            image.fallback.as_deref(),
            Some("https://www.sermitsiaq.ag/2329660.webp?imageId=2329660&format=jpg")
        );
        assert_eq!(image.alt.as_deref(), Some("Havnen i Nuuk"));
        assert_eq!((image.desktop_width, image.desktop_height), (Some(960), Some(540)));
        assert_eq!((image.mobile_width, image.mobile_height), (Some(480), Some(270)));
    }

    #[test]
    fn test_no_picture() {
        let doc = Html::parse_fragment("<div><img src='x.jpg'></div>");
        assert!(parse_picture(doc.root_element(), "https://www.sermitsiaq.ag").is_none());
    }

    #[test]
    fn test_sources_take_desktop_dimensions() {
        let doc = Html::parse_fragment(PICTURE_HTML);
        let image = parse_picture(doc.root_element(), "https://www.sermitsiaq.ag").unwrap();
        let sources = image_sources(&image);
        assert_eq!(sources.width, Some(960));
        assert_eq!(sources.fallback, image.fallback);
    }
}
