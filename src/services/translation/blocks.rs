//! Per-type translation of article detail blocks.

use super::html::translate_html;
use super::TranslationService;
use crate::models::{BlockKind, ContentBlock};

/// Translate a detail's blocks, returning the EN copy.
///
/// Markup is translated text-node by text-node; `ad` and `paywall_offer`
/// blocks are copied untouched.
pub async fn translate_content_blocks(
    service: &TranslationService,
    blocks: &[ContentBlock],
) -> Vec<ContentBlock> {
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        let mut block = block.clone();
        translate_block(service, &mut block).await;
        out.push(block);
    }
    out
}

async fn translate_block(service: &TranslationService, block: &mut ContentBlock) {
    if block.kind.text_mut().is_some() {
        if block.html.trim().is_empty() {
            if let Some(text) = block.kind.text_mut() {
                *text = service.text(text).await;
            }
            return;
        }
        let (html, text) = translate_html(service, &block.html).await;
        block.html = html;
        if let Some(slot) = block.kind.text_mut() {
            *slot = text;
        }
        return;
    }

    match &mut block.kind {
        BlockKind::HeaderImageCaption(caption) => {
            caption.caption = service.text(&caption.caption).await;
        }
        BlockKind::ArticleMeta(meta) => {
            for byline in &mut meta.bylines {
                service.field(&mut byline.description).await;
            }
            for date in meta.dates.values_mut() {
                date.label = service.text(&date.label).await;
                date.title = service.text(&date.title).await;
                date.text = service.text(&date.text).await;
            }
        }
        BlockKind::Image(image) => {
            service.field(&mut image.caption).await;
            service.field(&mut image.author).await;
        }
        BlockKind::ArticleFooterTags(tags) => {
            for tag in &mut tags.tags {
                tag.text = service.text(&tag.text).await;
            }
        }
        BlockKind::Ad(_) | BlockKind::PaywallOffer(_) => {}
        BlockKind::Title(_)
        | BlockKind::Subtitle(_)
        | BlockKind::Paragraph(_)
        | BlockKind::Intro(_)
        | BlockKind::Heading(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::FakeTranslator;
    use super::*;
    use crate::models::{
        AdBlock, ArticleMeta, Byline, DateEntry, HeaderCaption, HeadingBlock, HeadingLevel,
        TextBlock,
    };

    fn service() -> TranslationService {
        FakeTranslator::with(&[
            ("Flyet landede", "the plane landed"),
            ("Havnen", "The harbour"),
            ("Journalist", "Reporter"),
            ("Publiceret", "Published"),
        ])
        .service()
    }

    #[tokio::test]
    async fn test_text_blocks_keep_html_and_text_aligned() {
        let blocks = vec![ContentBlock::new(
            0,
            BlockKind::Paragraph(TextBlock {
                text: "Flyet landede".into(),
            }),
            "<p>Flyet landede</p>",
        )];
        let out = translate_content_blocks(&service(), &blocks).await;
        assert_eq!(out[0].html, "<p>The plane landed </p>");
        assert_eq!(
            out[0].kind,
            BlockKind::Paragraph(TextBlock {
                text: "The plane landed".into()
            })
        );
        assert_eq!(out[0].order, 0);
    }

    #[tokio::test]
    async fn test_heading_level_survives() {
        let blocks = vec![ContentBlock::new(
            4,
            BlockKind::Heading(HeadingBlock {
                text: "Havnen".into(),
                level: HeadingLevel::H3,
            }),
            "<h3>Havnen</h3>",
        )];
        let out = translate_content_blocks(&service(), &blocks).await;
        let BlockKind::Heading(heading) = &out[0].kind else {
            panic!("expected heading");
        };
        assert_eq!(heading.level, HeadingLevel::H3);
        assert_eq!(heading.text, "The harbour");
    }

    #[tokio::test]
    async fn test_caption_author_and_untouched_blocks() {
        let mut meta = ArticleMeta::default();
        meta.bylines.push(Byline {
            fullname: "Ane Hansen".into(),
            description: Some("Journalist".into()),
            ..Default::default()
        });
        meta.dates.insert(
            "published".into(),
            DateEntry {
                label: "Publiceret".into(),
                datetime: "2026-01-15T20:29:57+01:00".into(),
                title: String::new(),
                text: "15.01.2026".into(),
            },
        );
        let blocks = vec![
            ContentBlock::new(0, BlockKind::ArticleMeta(meta), "<div></div>"),
            ContentBlock::new(
                1,
                BlockKind::HeaderImageCaption(HeaderCaption {
                    caption: "Havnen".into(),
                    author: Some("Leiff Josefsen".into()),
                }),
                "<figcaption></figcaption>",
            ),
            ContentBlock::new(2, BlockKind::Ad(AdBlock::default()), "<div class=\"ad\"></div>"),
        ];
        let out = translate_content_blocks(&service(), &blocks).await;

        let BlockKind::ArticleMeta(meta) = &out[0].kind else {
            panic!("expected meta");
        };
        assert_eq!(meta.bylines[0].description.as_deref(), Some("Reporter"));
        assert_eq!(meta.bylines[0].fullname, "Ane Hansen");
        let date = &meta.dates["published"];
        assert_eq!(date.label, "Published");
        assert_eq!(date.datetime, "2026-01-15T20:29:57+01:00");

        let BlockKind::HeaderImageCaption(caption) = &out[1].kind else {
            panic!("expected caption");
        };
        assert_eq!(caption.caption, "The harbour");
        assert_eq!(caption.author.as_deref(), Some("Leiff Josefsen"));

        assert_eq!(out[2], blocks[2]);
    }
}
