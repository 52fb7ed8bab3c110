use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run metrics collector.
///
/// Tracks tile recognition, duplicate merging, translation backend usage,
/// cache performance and stage durations. Cheap to clone; all clones share
/// the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Recognition
    tiles_processed: AtomicUsize,
    tiles_failed: AtomicUsize,
    regions_detected: AtomicUsize,

    // Deduplication
    regions_unique: AtomicUsize,
    regions_merged: AtomicUsize,

    // Translation backend
    translation_calls_total: AtomicUsize,
    translation_calls_success: AtomicUsize,
    translation_calls_failed: AtomicUsize,
    translation_fallbacks: AtomicUsize,
    translation_latency_ms: RwLock<Vec<u64>>,

    // Cache
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_size: AtomicUsize,

    // Per-stage wall time, accumulated
    stage_duration_ms: DashMap<String, AtomicU64>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                tiles_processed: AtomicUsize::new(0),
                tiles_failed: AtomicUsize::new(0),
                regions_detected: AtomicUsize::new(0),
                regions_unique: AtomicUsize::new(0),
                regions_merged: AtomicUsize::new(0),
                translation_calls_total: AtomicUsize::new(0),
                translation_calls_success: AtomicUsize::new(0),
                translation_calls_failed: AtomicUsize::new(0),
                translation_fallbacks: AtomicUsize::new(0),
                translation_latency_ms: RwLock::new(Vec::new()),
                cache_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                cache_size: AtomicUsize::new(0),
                stage_duration_ms: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // Recognition Metrics
    pub fn record_tile(&self, success: bool, regions: usize) {
        self.inner.tiles_processed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.inner.tiles_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.regions_detected.fetch_add(regions, Ordering::Relaxed);
    }

    // Deduplication Metrics
    pub fn record_dedup(&self, unique: usize, merged: usize) {
        self.inner.regions_unique.fetch_add(unique, Ordering::Relaxed);
        self.inner.regions_merged.fetch_add(merged, Ordering::Relaxed);
    }

    // Translation Metrics
    pub fn record_translation_call(&self, success: bool, duration: Duration) {
        self.inner.translation_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.translation_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.translation_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .translation_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_fallback(&self) {
        self.inner.translation_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    // Cache Metrics
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_cache_size(&self, size: usize) {
        self.inner.cache_size.store(size, Ordering::Relaxed);
    }

    // Stage Metrics
    pub fn record_stage_duration(&self, stage: &str, duration: Duration) {
        self.inner
            .stage_duration_ms
            .entry(stage.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.inner.translation_latency_ms.read();
        let latency_avg = avg(&latency);
        let latency_p50 = percentile(&latency, 0.5);
        let latency_p95 = percentile(&latency, 0.95);
        drop(latency);

        let cache_hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            cache_hits as f64 / cache_total as f64
        } else {
            0.0
        };

        let stage_durations_ms = self
            .inner
            .stage_duration_ms
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            tiles_processed: self.inner.tiles_processed.load(Ordering::Relaxed),
            tiles_failed: self.inner.tiles_failed.load(Ordering::Relaxed),
            regions_detected: self.inner.regions_detected.load(Ordering::Relaxed),
            regions_unique: self.inner.regions_unique.load(Ordering::Relaxed),
            regions_merged: self.inner.regions_merged.load(Ordering::Relaxed),
            translation_calls_total: self.inner.translation_calls_total.load(Ordering::Relaxed),
            translation_calls_success: self.inner.translation_calls_success.load(Ordering::Relaxed),
            translation_calls_failed: self.inner.translation_calls_failed.load(Ordering::Relaxed),
            translation_fallbacks: self.inner.translation_fallbacks.load(Ordering::Relaxed),
            translation_latency_avg_ms: latency_avg,
            translation_latency_p50_ms: latency_p50,
            translation_latency_p95_ms: latency_p95,
            cache_hits,
            cache_misses,
            cache_hit_rate,
            cache_size: self.inner.cache_size.load(Ordering::Relaxed),
            stage_durations_ms,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tiles_processed: usize,
    pub tiles_failed: usize,
    pub regions_detected: usize,
    pub regions_unique: usize,
    pub regions_merged: usize,
    pub translation_calls_total: usize,
    pub translation_calls_success: usize,
    pub translation_calls_failed: usize,
    pub translation_fallbacks: usize,
    pub translation_latency_avg_ms: u64,
    pub translation_latency_p50_ms: u64,
    pub translation_latency_p95_ms: u64,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub cache_size: usize,
    pub stage_durations_ms: BTreeMap<String, u64>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_tile(true, 4);
        metrics.record_tile(false, 0);
        metrics.record_dedup(3, 1);
        metrics.record_translation_call(true, Duration::from_millis(100));
        metrics.record_translation_call(false, Duration::from_millis(50));
        metrics.record_fallback();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tiles_processed, 2);
        assert_eq!(snapshot.tiles_failed, 1);
        assert_eq!(snapshot.regions_detected, 4);
        assert_eq!(snapshot.regions_unique, 3);
        assert_eq!(snapshot.regions_merged, 1);
        assert_eq!(snapshot.translation_calls_total, 2);
        assert_eq!(snapshot.translation_calls_success, 1);
        assert_eq!(snapshot.translation_calls_failed, 1);
        assert_eq!(snapshot.translation_fallbacks, 1);
        assert_eq!(snapshot.translation_latency_avg_ms, 75);
        assert_eq!(snapshot.cache_hit_rate, 0.5);
    }

    #[test]
    fn test_stage_durations_accumulate() {
        let metrics = Metrics::new();
        metrics.record_stage_duration("recognize", Duration::from_millis(30));
        metrics.record_stage_duration("recognize", Duration::from_millis(12));
        metrics.record_stage_duration("dedup", Duration::from_millis(1));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.stage_durations_ms.get("recognize"), Some(&42));
        assert_eq!(snapshot.stage_durations_ms.get("dedup"), Some(&1));
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = Metrics::new();
        let clone = metrics.clone();
        clone.record_cache_hit();
        assert_eq!(metrics.snapshot().cache_hits, 1);
    }
}
