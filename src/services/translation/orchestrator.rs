// Translation orchestration: distinct strings → batches → cached, retried
// backend calls → back-fill.

use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::cache::{CachedTranslation, TranslationCache};
use super::TranslationBackend;
use crate::core::config::TranslationConfig;
use crate::core::errors::{TranslationError, TranslationResult};
use crate::core::types::{TextRegion, TranslatedRegion};
use crate::middleware::retry::RetryPolicy;
use crate::utils::Metrics;

/// Knobs for one orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub source_lang: String,
    pub target_lang: String,
    pub batch_size: usize,
    /// Pause between consecutive batches
    pub batch_delay: Duration,
    /// Bound on a single backend call
    pub call_timeout: Duration,
    /// Strings translated at once within a batch
    pub max_concurrent: usize,
}

impl OrchestratorSettings {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            batch_size: config.batch_size,
            batch_delay: config.batch_delay,
            call_timeout: config.call_timeout,
            max_concurrent: config.max_concurrent,
        }
    }
}

pub struct TranslationOrchestrator {
    backend: Arc<dyn TranslationBackend>,
    cache: TranslationCache,
    retry_policy: Arc<dyn RetryPolicy>,
    settings: OrchestratorSettings,
    metrics: Option<Metrics>,
}

impl TranslationOrchestrator {
    /// `cache` is owned by the current run; pass a fresh one per run.
    pub fn new(
        settings: OrchestratorSettings,
        backend: Arc<dyn TranslationBackend>,
        cache: TranslationCache,
        retry_policy: Arc<dyn RetryPolicy>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            backend,
            cache,
            retry_policy,
            settings,
            metrics,
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Translate every region's text and attach it.
    ///
    /// Each distinct string is resolved once; the output keeps region order.
    #[instrument(skip(self, regions), fields(regions = regions.len()))]
    pub async fn translate_all(&self, regions: Vec<TextRegion>) -> Vec<TranslatedRegion> {
        let distinct: Vec<String> = regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let batch_size = self.settings.batch_size.max(1);
        let batches: Vec<&[String]> = distinct.chunks(batch_size).collect();
        info!(
            "Translating {} distinct strings from {} regions in {} batches",
            distinct.len(),
            regions.len(),
            batches.len()
        );

        for (i, batch) in batches.iter().enumerate() {
            debug!("Batch {}/{} ({} strings)", i + 1, batches.len(), batch.len());
            self.translate_batch(batch).await;

            // Respect backend rate limits between batches
            if i + 1 < batches.len() && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        regions
            .into_iter()
            .map(|region| {
                let translation = self
                    .cache
                    .translation_for(&region.text)
                    .unwrap_or_else(|| region.text.clone());
                TranslatedRegion { region, translation }
            })
            .collect()
    }

    /// Resolve one batch with bounded concurrency, results in input order.
    pub async fn translate_batch(&self, batch: &[String]) -> Vec<String> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));

        let tasks = batch.iter().map(|text| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.translate_text(text).await
            }
        });

        join_all(tasks).await
    }

    /// Translate a single string through the cache.
    ///
    /// Never fails: when the backend gives up, the source text is returned
    /// (and cached) as its own translation.
    pub async fn translate_text(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        if let Some(hit) = self.cache.get(text) {
            return hit.text;
        }
        self.cache.record_miss();

        let resolved = match self.call_with_retries(text).await {
            Ok(translated) => CachedTranslation::translated(translated),
            Err(e) => {
                warn!(
                    "Failed to translate {:?} after {} attempts, keeping original: {}",
                    text,
                    self.retry_policy.max_attempts(),
                    e
                );
                if let Some(ref m) = self.metrics {
                    m.record_fallback();
                }
                CachedTranslation::fallback(text)
            }
        };

        self.cache.insert(text.to_string(), resolved).text
    }

    async fn call_with_retries(&self, text: &str) -> TranslationResult<String> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let start = Instant::now();

            let call = self
                .backend
                .translate(text, &self.settings.source_lang, &self.settings.target_lang);
            let result = match tokio::time::timeout(self.settings.call_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(TranslationError::Timeout(self.settings.call_timeout)),
            };

            if let Some(ref m) = self.metrics {
                m.record_translation_call(result.is_ok(), start.elapsed());
            }

            let error = match result {
                Ok(translated) => return Ok(translated),
                Err(e) => e,
            };

            match self.retry_policy.next_delay(attempts) {
                Some(delay) => {
                    warn!(
                        "Translation attempt {}/{} failed: {}",
                        attempts,
                        self.retry_policy.max_attempts(),
                        error
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                None => return Err(error),
            }
        }
    }
}
