// Metrics module - request and cache counters for observability
// Counters are monotonic and updated with relaxed atomics; exact
// precision is not required.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Snapshot of server statistics, serialized for the /metrics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    #[serde(rename = "requestsTotal")]
    pub requests_total: u64,
    #[serde(rename = "cacheHits")]
    pub cache_hits: u64,
    #[serde(rename = "cacheMisses")]
    pub cache_misses: u64,
    #[serde(rename = "cacheEntries")]
    pub cache_entries: u64,
    #[serde(rename = "uptimeSeconds")]
    pub uptime_seconds: u64,
}

/// Server statistics tracker
pub struct Metrics {
    requests_total: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn increment_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Snapshot current counters; `cache_entries` is supplied by the caller
    /// because only the cache knows its entry count.
    pub fn snapshot(&self, cache_entries: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            cache_entries,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
