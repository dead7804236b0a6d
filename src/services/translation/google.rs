//! Public Google Translate endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{TranslateError, Translator};
use crate::models::Language;

pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TranslateError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| TranslateError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

/// Concatenate the translated sentence chunks of a `translate_a/single` reply.
pub(crate) fn parse_response(body: &Value) -> Result<String, TranslateError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::Parse("missing sentence array".to_string()))?;
    let translated: String = sentences
        .iter()
        .filter_map(|s| s.get(0).and_then(Value::as_str))
        .collect();
    if translated.is_empty() {
        return Err(TranslateError::Parse("empty translation".to_string()));
    }
    Ok(translated)
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn name(&self) -> &str {
        "google"
    }

    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslateError> {
        debug!("Translating {} chars {}→{}", text.len(), source, target);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source.as_str()),
                ("tl", target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| TranslateError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TranslateError::Api(format!("HTTP {}", response.status())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TranslateError::Parse(e.to_string()))?;
        parse_response(&body)
    }
}
