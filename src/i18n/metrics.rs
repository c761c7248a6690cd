//! Translation metrics and observability module.
//!
//! Counts how each `resolve` call was served (cache, stored translation, or
//! provider) and how the provider behaved. One instance is owned by the
//! translation service and reported by the metrics endpoint.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Translations served from the cache store
    cache_hits: AtomicUsize,

    /// Cache lookups that found nothing (or failed)
    cache_misses: AtomicUsize,

    /// Translations served from the FAQ's stored translations
    stored_hits: AtomicUsize,

    /// Calls made to the translation provider
    provider_calls: AtomicUsize,

    /// Provider calls that failed
    provider_failures: AtomicUsize,

    /// Requests that joined a translation already in flight
    coalesced: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stored_hit(&self) {
        self.stored_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_call(&self) {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn stored_hits(&self) -> usize {
        self.stored_hits.load(Ordering::Relaxed)
    }

    pub fn provider_calls(&self) -> usize {
        self.provider_calls.load(Ordering::Relaxed)
    }

    pub fn provider_failures(&self) -> usize {
        self.provider_failures.load(Ordering::Relaxed)
    }

    pub fn coalesced(&self) -> usize {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let total_cache_queries = hits + misses;
        let cache_hit_rate = if total_cache_queries > 0 {
            (hits as f64 / total_cache_queries as f64) * 100.0
        } else {
            0.0
        };

        let calls = self.provider_calls();
        let failures = self.provider_failures();
        let provider_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            stored_hits: self.stored_hits(),
            provider_calls: calls,
            provider_failures: failures,
            provider_success_rate,
            coalesced_requests: self.coalesced(),
        }
    }
}

/// Snapshot of the translation counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub stored_hits: usize,
    pub provider_calls: usize,
    pub provider_failures: usize,

    /// Provider success rate as a percentage (0-100)
    pub provider_success_rate: f64,

    pub coalesced_requests: usize,
}
