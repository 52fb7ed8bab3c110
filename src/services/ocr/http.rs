use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::OcrEngine;
use crate::core::config::OcrConfig;
use crate::core::errors::{RecognitionError, RecognitionResult};
use crate::core::types::{Point, RawDetection};
use crate::utils::image_ops::encode_png_async;

/// OCR engine backed by an HTTP recognition service.
///
/// Each tile is PNG-encoded and posted as base64; the service answers with
/// tile-local polygons, text and confidence.
pub struct HttpOcrEngine {
    endpoint: String,
    language: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    image: String,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    detections: Vec<OcrDetection>,
}

#[derive(Debug, Deserialize)]
struct OcrDetection {
    polygon: Vec<[f32; 2]>,
    text: String,
    confidence: f32,
}

impl HttpOcrEngine {
    pub fn new(config: &OcrConfig) -> RecognitionResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.max_concurrent_tiles)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    #[instrument(skip(self, tile), fields(endpoint = %self.endpoint))]
    async fn detect(&self, tile: &DynamicImage) -> RecognitionResult<Vec<RawDetection>> {
        let png = encode_png_async(tile.clone()).await?;
        let body = OcrRequest {
            image: general_purpose::STANDARD.encode(&png),
            language: &self.language,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let parsed = parse_response(&text)?;
        debug!("OCR service returned {} detections", parsed.len());
        Ok(parsed)
    }
}

fn parse_response(body: &str) -> RecognitionResult<Vec<RawDetection>> {
    let response: OcrResponse = serde_json::from_str(body)
        .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))?;

    Ok(response
        .detections
        .into_iter()
        .map(|d| RawDetection {
            polygon: d.polygon.into_iter().map(|[x, y]| Point::new(x, y)).collect(),
            text: d.text,
            confidence: d.confidence,
        })
        .collect())
}
