//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sermitsiaq_ingest::models::Language;
use sermitsiaq_ingest::scrapers::{BrowserError, PageRenderer, ScrollPolicy};
use sermitsiaq_ingest::services::{TranslateError, TranslationService, Translator};

pub const DA: &str = "https://www.sermitsiaq.ag";
pub const KL: &str = "https://kl.sermitsiaq.ag";
pub const ORIGIN: &str = "https://www.sermitsiaq.com";

/// Serves fixed HTML per URL; unknown URLs fail like a navigation timeout.
#[derive(Default)]
pub struct PageMap {
    pages: Mutex<HashMap<String, String>>,
    pub requests: AtomicUsize,
}

impl PageMap {
    pub fn with(pages: &[(&str, String)]) -> Self {
        let map = Self::default();
        for (url, html) in pages {
            map.set(url, html.clone());
        }
        map
    }

    pub fn set(&self, url: &str, html: String) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(url.to_string(), html);
        }
    }
}

#[async_trait]
impl PageRenderer for PageMap {
    async fn fetch_rendered(
        &self,
        url: &str,
        _wait_for: &str,
        _scroll: ScrollPolicy,
    ) -> Result<String, BrowserError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.lock().map_err(|e| BrowserError::Page(e.to_string()))?;
        pages
            .get(url)
            .cloned()
            .ok_or_else(|| BrowserError::Timeout(url.to_string()))
    }
}

/// Dictionary translator; unknown strings come back prefixed with "EN:".
pub struct Dictionary(pub HashMap<String, String>);

impl Dictionary {
    pub fn service(entries: &[(&str, &str)]) -> TranslationService {
        let map = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TranslationService::new(Arc::new(Self(map)), Duration::ZERO)
    }
}

#[async_trait]
impl Translator for Dictionary {
    fn name(&self) -> &str {
        "dictionary"
    }

    async fn translate(
        &self,
        text: &str,
        _source: Language,
        _target: Language,
    ) -> Result<String, TranslateError> {
        Ok(self
            .0
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("EN: {}", text)))
    }
}

/// One listing card in upstream markup.
pub fn card(guid: &str, path: &str, title: &str, extra_class: &str) -> String {
    format!(
        r#"<article data-element-guid="{guid}" class="{extra_class}" data-instance="inst-{guid}">
             <a itemprop="url" href="{path}"><h2 class="headline">{title}</h2></a>
           </article>"#
    )
}

pub fn listing(cards: &[String]) -> String {
    format!("<html><body>{}</body></html>", cards.concat())
}

pub fn home(rows: &[String]) -> String {
    let rows: String = rows
        .iter()
        .map(|r| format!(r#"<div class="row">{r}</div>"#))
        .collect();
    format!(r#"<html><body><div class="page-content">{rows}</div></body></html>"#)
}
