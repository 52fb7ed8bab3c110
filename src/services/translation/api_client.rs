use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::TranslationBackend;
use crate::core::config::TranslationConfig;
use crate::core::errors::{TranslationError, TranslationResult};

/// LibreTranslate-compatible HTTP client.
///
/// Performs exactly one request per call; retries, timeouts and fallback
/// are owned by the orchestrator.
pub struct HttpTranslator {
    endpoint: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl HttpTranslator {
    pub fn new(config: &TranslationConfig) -> TranslationResult<Self> {
        // Create HTTP client with timeout and connection pooling
        let http_client = reqwest::Client::builder()
            .timeout(config.call_timeout)
            .pool_max_idle_per_host(config.max_concurrent)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl TranslationBackend for HttpTranslator {
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<String> {
        let body = TranslateRequest {
            q: text,
            source: source_lang,
            target: target_lang,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            let body = serde_json::from_str::<ErrorResponse>(&response_text)
                .map(|e| e.error)
                .unwrap_or(response_text);
            return Err(TranslationError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let translated = parse_response(&response_text)?;
        debug!("Translated {} -> {} chars", text.chars().count(), translated.chars().count());
        Ok(translated)
    }
}

fn parse_response(body: &str) -> TranslationResult<String> {
    serde_json::from_str::<TranslateResponse>(body)
        .map(|r| r.translated_text)
        .map_err(|e| TranslationError::InvalidResponse(e.to_string()))
}
