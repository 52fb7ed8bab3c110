use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::utils::Metrics;

/// Cached outcome for one source string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTranslation {
    pub text: String,
    /// True when the backend gave up and `text` is the untranslated source
    pub fallback: bool,
}

impl CachedTranslation {
    pub fn translated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fallback: false,
        }
    }

    pub fn fallback(source: impl Into<String>) -> Self {
        Self {
            text: source.into(),
            fallback: true,
        }
    }
}

/// Run-scoped translation cache keyed by exact source text.
///
/// Created at the start of a pipeline run and dropped with it; nothing is
/// shared between runs. Entries are write-once: the first translation stored
/// for a key wins, except that a real translation may replace a fallback.
/// Concurrent writers of the same key are serialized by the map's entry lock.
#[derive(Clone, Default)]
pub struct TranslationCache {
    inner: Arc<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: DashMap<String, CachedTranslation>,
    metrics: Option<Metrics>,
}

impl TranslationCache {
    pub fn new(metrics: Option<Metrics>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                metrics,
            }),
        }
    }

    /// Look up a translation, recording a cache hit when found
    pub fn get(&self, source: &str) -> Option<CachedTranslation> {
        let entry = self.inner.entries.get(source)?.value().clone();

        if let Some(ref m) = self.inner.metrics {
            m.record_cache_hit();
        }
        Some(entry)
    }

    /// Record cache miss (for metrics)
    pub fn record_miss(&self) {
        if let Some(ref m) = self.inner.metrics {
            m.record_cache_miss();
        }
    }

    /// Store a translation unless one is already present.
    ///
    /// Returns the value that ended up in the cache.
    pub fn insert(&self, source: String, translation: CachedTranslation) -> CachedTranslation {
        let stored = match self.inner.entries.entry(source) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().fallback && !translation.fallback {
                    occupied.insert(translation);
                }
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => vacant.insert(translation).value().clone(),
        };

        // entry guard is released above; len() takes every shard lock
        if let Some(ref m) = self.inner.metrics {
            m.update_cache_size(self.inner.entries.len());
        }
        stored
    }

    /// Plain lookup for the back-fill step, no metrics
    pub fn translation_for(&self, source: &str) -> Option<String> {
        self.inner.entries.get(source).map(|e| e.text.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Number of keys whose cached value is an untranslated fallback
    pub fn fallback_count(&self) -> usize {
        self.inner.entries.iter().filter(|e| e.fallback).count()
    }
}
