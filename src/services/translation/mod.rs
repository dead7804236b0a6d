//! DA→EN translation.
//!
//! A [`Translator`] backend does the actual string translation; the
//! [`TranslationService`] wraps it with throttling and the
//! keep-the-source-text failure policy. Article, block, HTML and URL
//! translation are built on top of the service.

mod article;
mod blocks;
mod google;
mod html;
mod ollama;
mod url;

pub use article::{translate_article, Translated};
pub use blocks::translate_content_blocks;
pub use google::GoogleTranslator;
pub use html::{fix_spacing, translate_html};
pub use ollama::OllamaTranslator;
pub use url::{backfill_published_urls, translate_section, translate_url};

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::Language;
use crate::repository::DbError;
use crate::utils::text::is_untranslatable;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translator connection error: {0}")]
    Connection(String),

    #[error("translator API error: {0}")]
    Api(String),

    #[error("unexpected translator response: {0}")]
    Parse(String),

    #[error("article {0} is not a saved DA article")]
    NotCanonical(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

/// A string translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorBackend {
    #[default]
    Google,
    Ollama,
}

impl FromStr for TranslatorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown translator backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default)]
    pub backend: TranslatorBackend,
    #[serde(default = "default_google_endpoint")]
    pub google_endpoint: String,
    #[serde(default = "default_ollama_endpoint")]
    pub ollama_endpoint: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    /// Pause after each string translation.
    #[serde(default = "default_string_delay_ms")]
    pub string_delay_ms: u64,
    /// Pause after each translator call made for an article record.
    #[serde(default = "default_article_delay_ms")]
    pub article_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_google_endpoint() -> String {
    "https://translate.googleapis.com/translate_a/single".to_string()
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3.2:instruct".to_string()
}
fn default_string_delay_ms() -> u64 {
    300
}
fn default_article_delay_ms() -> u64 {
    500
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            backend: TranslatorBackend::default(),
            google_endpoint: default_google_endpoint(),
            ollama_endpoint: default_ollama_endpoint(),
            ollama_model: default_ollama_model(),
            string_delay_ms: default_string_delay_ms(),
            article_delay_ms: default_article_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TranslatorConfig {
    pub fn string_delay(&self) -> Duration {
        Duration::from_millis(self.string_delay_ms)
    }

    pub fn article_delay(&self) -> Duration {
        Duration::from_millis(self.article_delay_ms)
    }

    /// Build the configured backend.
    pub fn build(&self) -> Result<Arc<dyn Translator>, TranslateError> {
        let timeout = Duration::from_secs(self.timeout_secs);
        Ok(match self.backend {
            TranslatorBackend::Google => {
                Arc::new(GoogleTranslator::new(&self.google_endpoint, timeout)?)
            }
            TranslatorBackend::Ollama => Arc::new(OllamaTranslator::new(
                &self.ollama_endpoint,
                &self.ollama_model,
                timeout,
            )?),
        })
    }
}

/// Throttled translator with the keep-source-on-failure policy.
pub struct TranslationService {
    translator: Arc<dyn Translator>,
    delay: Duration,
    source: Language,
    target: Language,
    calls: AtomicUsize,
    failures: AtomicUsize,
}

impl TranslationService {
    /// DA→EN service sleeping `delay` after every translator call.
    pub fn new(translator: Arc<dyn Translator>, delay: Duration) -> Self {
        Self {
            translator,
            delay,
            source: Language::Da,
            target: Language::En,
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Same backend with a different pause.
    pub fn with_delay(&self, delay: Duration) -> Self {
        Self::new(self.translator.clone(), delay)
    }

    pub fn backend_name(&self) -> &str {
        self.translator.name()
    }

    /// Translator calls made and how many of them failed.
    pub fn stats(&self) -> (usize, usize) {
        (
            self.calls.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }

    /// Translate one string, keeping surrounding whitespace.
    ///
    /// Blank or non-alphabetic input is returned unchanged without a call.
    /// On failure the source text is returned.
    pub async fn text(&self, text: &str) -> String {
        if is_untranslatable(text) {
            return text.to_string();
        }
        let core = text.trim();
        let start = text.len() - text.trim_start().len();
        let (leading, trailing) = (&text[..start], &text[start + core.len()..]);

        self.calls.fetch_add(1, Ordering::Relaxed);
        let result = self
            .translator
            .translate(core, self.source, self.target)
            .await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match result {
            Ok(translated) if !translated.trim().is_empty() => {
                format!("{}{}{}", leading, translated.trim(), trailing)
            }
            Ok(_) => text.to_string(),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Translation via {} failed, keeping source: {}", self.translator.name(), e);
                text.to_string()
            }
        }
    }

    pub async fn opt(&self, text: Option<&str>) -> Option<String> {
        match text {
            Some(t) => Some(self.text(t).await),
            None => None,
        }
    }

    /// Translate an optional field in place.
    pub async fn field(&self, slot: &mut Option<String>) {
        if let Some(text) = slot.as_deref() {
            *slot = Some(self.text(text).await);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic translator for tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Looks strings up in a dictionary, otherwise upper-cases them.
    #[derive(Default)]
    pub struct FakeTranslator {
        pub dictionary: HashMap<String, String>,
        pub fail: bool,
        pub seen: Mutex<Vec<String>>,
        /// Set on the first call, to interrupt a run mid-way.
        pub cancels: Option<crate::utils::CancelFlag>,
    }

    impl FakeTranslator {
        pub fn with(entries: &[(&str, &str)]) -> Self {
            Self {
                dictionary: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            }
        }

        pub fn service(self) -> TranslationService {
            TranslationService::new(Arc::new(self), Duration::ZERO)
        }
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        fn name(&self) -> &str {
            "fake"
        }

        async fn translate(
            &self,
            text: &str,
            _source: Language,
            _target: Language,
        ) -> Result<String, TranslateError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(text.to_string());
            }
            if let Some(flag) = &self.cancels {
                flag.cancel();
            }
            if self.fail {
                return Err(TranslateError::Connection("offline".into()));
            }
            Ok(self
                .dictionary
                .get(text)
                .cloned()
                .unwrap_or_else(|| text.to_uppercase()))
        }
    }
}
