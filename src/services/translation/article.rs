//! EN article creation from a DA article.

use chrono::Utc;
use tracing::{debug, info};

use super::url::translate_url;
use super::{TranslateError, TranslationService};
use crate::models::layout::{CardLayout, ListLayout, SliderLayout};
use crate::models::{Article, Language, LayoutData};
use crate::repository::{Database, Upserted};

/// Outcome of [`translate_article`].
#[derive(Debug, Clone, PartialEq)]
pub enum Translated {
    Created(Article),
    /// An EN sibling already existed; only `published_url_en` may have changed.
    Existing(Article),
}

impl Translated {
    pub fn article(&self) -> &Article {
        match self {
            Self::Created(a) | Self::Existing(a) => a,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

async fn translate_card(service: &TranslationService, card: &mut CardLayout) {
    service.field(&mut card.kicker).await;
    service.field(&mut card.kicker_floating).await;
    service.field(&mut card.kicker_below).await;
    for part in &mut card.title_parts {
        part.text = service.text(&part.text).await;
    }
}

/// List items point at other articles; reuse their EN titles when known.
async fn translate_list(
    service: &TranslationService,
    db: &Database,
    list: &mut ListLayout,
) -> Result<(), TranslateError> {
    translate_card(service, &mut list.card).await;
    service.field(&mut list.list_title).await;
    for item in &mut list.list_items {
        match db.articles().find_en_by_any_url(&item.url).await? {
            Some(en) => {
                debug!("List item {} reuses EN title", item.url);
                item.title = en.title;
            }
            None => item.title = service.text(&item.title).await,
        }
    }
    Ok(())
}

async fn translate_slider(service: &TranslationService, slider: &mut SliderLayout) {
    service.field(&mut slider.slider_title).await;
    if let Some(link) = slider.header_link.as_mut() {
        link.text = service.text(&link.text).await;
    }
    for item in &mut slider.slider_articles {
        item.title = service.text(&item.title).await;
        service.field(&mut item.kicker).await;
        service.field(&mut item.excerpt).await;
    }
}

/// Create (or find) the EN sibling of a saved DA article.
///
/// Idempotent: an existing EN sibling is returned as is, with only its
/// `published_url_en` back-filled when missing.
pub async fn translate_article(
    service: &TranslationService,
    db: &Database,
    da: &Article,
) -> Result<Translated, TranslateError> {
    if da.language != Language::Da || da.id == 0 {
        return Err(TranslateError::NotCanonical(da.published_url.clone()));
    }
    let repo = db.articles();

    if let Some(mut existing) = repo.find_sibling(da, Language::En).await? {
        if existing.published_url_en.is_none() && !da.published_url.is_empty() {
            if let Some(url) = translate_url(service, &da.published_url).await {
                repo.set_published_url_en(existing.id, &url).await?;
                existing.published_url_en = Some(url);
            }
        }
        return Ok(Translated::Existing(existing));
    }

    let now = Utc::now();
    let mut en = da.clone();
    en.id = 0;
    en.language = Language::En;
    en.original_language = Some(Language::Da);
    en.canonical_id = Some(da.id);
    en.is_temp = false;
    en.created_at = now;
    en.updated_at = now;

    en.title = service.text(&da.title).await;
    service.field(&mut en.content).await;
    service.field(&mut en.excerpt).await;

    match en.layout_data.as_mut() {
        Some(LayoutData::Card(card)) => translate_card(service, card).await,
        Some(LayoutData::WithList(list)) => translate_list(service, db, list).await?,
        Some(LayoutData::Slider(slider)) => translate_slider(service, slider).await,
        None => {}
    }

    en.published_url_en = if da.published_url.is_empty() {
        None
    } else {
        translate_url(service, &da.published_url).await
    };

    match repo.insert(&en).await? {
        Upserted::Created(id) | Upserted::Updated(id) => {
            en.id = id;
            info!("Created EN article {} from DA {}", id, da.id);
            Ok(Translated::Created(en))
        }
        Upserted::Existing(id) => match repo.get(id).await? {
            Some(existing) => Ok(Translated::Existing(existing)),
            None => Ok(Translated::Existing(en)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::FakeTranslator;
    use super::*;
    use crate::models::{LayoutType, ListItem, SliderArticle, TitlePart};

    async fn save(db: &Database, mut article: Article) -> Article {
        db.articles().save(&mut article).await.unwrap();
        article
    }

    #[tokio::test]
    async fn test_list_items_reuse_existing_en_titles() {
        let db = Database::in_memory().await.unwrap();
        let service =
            FakeTranslator::with(&[("Grønland i fokus", "Greenland in focus")]).service();

        let trump_da = save(
            &db,
            Article::new(Language::Da, "Kære Trump", "/samfund/kaere-trump/2327059"),
        )
        .await;
        let mut trump_en = Article::new(Language::En, "Dear Trump", "/samfund/kaere-trump/2327059");
        trump_en.canonical_id = Some(trump_da.id);
        trump_en.original_language = Some(Language::Da);
        save(&db, trump_en).await;

        let mut da = Article::new(
            Language::Da,
            "Grønland i fokus",
            "https://www.sermitsiaq.ag/samfund/fokus/2330001",
        );
        da.layout_type = Some(LayoutType::OneWithListRight);
        da.layout_data = Some(LayoutData::WithList(ListLayout {
            list_items: vec![
                ListItem {
                    title: "Kære Trump".into(),
                    url: "/samfund/kaere-trump/2327059".into(),
                },
                ListItem {
                    title: "hej".into(),
                    url: "/samfund/hej/1".into(),
                },
            ],
            ..Default::default()
        }));
        let da = save(&db, da).await;

        let translated = translate_article(&service, &db, &da).await.unwrap();
        assert!(translated.is_new());
        let en = translated.article();
        assert_eq!(en.title, "Greenland in focus");
        assert_eq!(en.language, Language::En);
        assert_eq!(en.original_language, Some(Language::Da));
        assert_eq!(en.canonical_id, Some(da.id));
        assert_eq!(en.published_url, da.published_url);
        assert_eq!(
            en.published_url_en.as_deref(),
            Some("https://www.sermitsiaq.ag/society/fokus/2330001")
        );

        let Some(LayoutData::WithList(list)) = &en.layout_data else {
            panic!("expected list layout");
        };
        assert_eq!(
            list.list_items[0],
            ListItem {
                title: "Dear Trump".into(),
                url: "/samfund/kaere-trump/2327059".into()
            }
        );
        assert_eq!(list.list_items[1].title, "HEJ");
    }

    #[tokio::test]
    async fn test_second_call_returns_existing_sibling() {
        let db = Database::in_memory().await.unwrap();
        let service = FakeTranslator::default().service();
        let mut da = Article::new(Language::Da, "Nyhed", "https://www.sermitsiaq.ag/sport/nyhed/7");
        da.layout_type = Some(LayoutType::OneFull);
        da.layout_data = Some(LayoutData::Card(CardLayout {
            title_parts: vec![TitlePart {
                text: "Nyhed".into(),
                color_class: None,
            }],
            kicker: Some("sport".into()),
            ..Default::default()
        }));
        let da = save(&db, da).await;

        let first = translate_article(&service, &db, &da).await.unwrap();
        let Some(LayoutData::Card(card)) = &first.article().layout_data else {
            panic!("expected card layout");
        };
        assert_eq!(card.title_parts[0].text, "NYHED");
        assert_eq!(card.kicker.as_deref(), Some("SPORT"));

        let second = translate_article(&service, &db, &da).await.unwrap();
        assert!(!second.is_new());
        assert_eq!(second.article().id, first.article().id);
    }

    #[tokio::test]
    async fn test_slider_container_gets_own_sibling() {
        let db = Database::in_memory().await.unwrap();
        let service = FakeTranslator::default().service();
        let mut da = Article::new(Language::Da, "Job", "");
        da.is_home = true;
        da.layout_type = Some(LayoutType::JobSlider);
        da.display_order = 2000;
        da.layout_data = Some(LayoutData::Slider(SliderLayout {
            row_index: 2,
            slider_title: Some("Ledige stillinger".into()),
            slider_articles: vec![SliderArticle {
                url: "https://www.sermitsiaq.ag/job/a/1".into(),
                title: "Tømrer".into(),
                element_guid: None,
                kicker: None,
                excerpt: None,
                image: None,
                is_paywall: false,
            }],
            ..Default::default()
        }));
        let da = save(&db, da).await;

        let en = translate_article(&service, &db, &da).await.unwrap();
        assert!(en.is_new());
        assert_eq!(en.article().published_url_en, None);
        let Some(LayoutData::Slider(slider)) = &en.article().layout_data else {
            panic!("expected slider layout");
        };
        assert_eq!(slider.slider_title.as_deref(), Some("LEDIGE STILLINGER"));
        assert_eq!(slider.slider_articles[0].title, "TØMRER");

        let again = translate_article(&service, &db, &da).await.unwrap();
        assert_eq!(again.article().id, en.article().id);
    }

    #[tokio::test]
    async fn test_rejects_unsaved_or_non_danish() {
        let db = Database::in_memory().await.unwrap();
        let service = FakeTranslator::default().service();
        let kl = Article::new(Language::Kl, "x", "https://kl.sermitsiaq.ag/a/b/1");
        assert!(matches!(
            translate_article(&service, &db, &kl).await,
            Err(TranslateError::NotCanonical(_))
        ));
    }
}
