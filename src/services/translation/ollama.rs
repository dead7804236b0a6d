//! Local LLM translation through the Ollama generate API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TranslateError, Translator};
use crate::models::Language;

const PROMPT: &str = r#"Translate the following {source} text into {target}.
Keep names, numbers and punctuation. Respond with ONLY the translation, no quotes, notes or preamble.

{text}"#;

pub struct OllamaTranslator {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

fn language_name(language: Language) -> &'static str {
    match language {
        Language::Da => "Danish",
        Language::Kl => "Greenlandic",
        Language::En => "English",
    }
}

fn build_prompt(text: &str, source: Language, target: Language) -> String {
    PROMPT
        .replace("{source}", language_name(source))
        .replace("{target}", language_name(target))
        .replace("{text}", text)
}

/// Strip wrapping quotes some models add around a bare answer.
fn clean_response(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

impl OllamaTranslator {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self, TranslateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslateError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslateError> {
        let url = format!("{}/api/generate", self.endpoint);
        let request = OllamaRequest {
            model: &self.model,
            prompt: build_prompt(text, source, target),
            stream: false,
            options: OllamaOptions { temperature: 0.1 },
        };

        debug!("Ollama translate with {}", self.model);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslateError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::Api(format!("HTTP {}: {}", status, body)));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::Parse(e.to_string()))?;
        let cleaned = clean_response(&result.response);
        if cleaned.is_empty() {
            return Err(TranslateError::Parse("empty response".to_string()));
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_languages() {
        let prompt = build_prompt("Kære Trump", Language::Da, Language::En);
        assert!(prompt.contains("Danish text into English"));
        assert!(prompt.ends_with("Kære Trump"));
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(clean_response("  \"Dear Trump\"\n"), "Dear Trump");
        assert_eq!(clean_response("Dear \"Trump\""), "Dear \"Trump\"");
    }
}
