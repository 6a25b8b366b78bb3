//! Cache Statistics Module
//!
//! Tracks how intercepted tile requests were served.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Fresh cache entries served without touching the network
    pub hits: u64,
    /// Tile requests that went to the network
    pub misses: u64,
    /// Network failures answered with a fresh cached copy
    pub fallbacks: u64,
    /// Network failures answered with an expired cached copy
    pub stale_served: u64,
    /// Origin round-trips that produced a response
    pub network_fetches: u64,
    /// Origin round-trips that failed outright
    pub network_failures: u64,
    /// Tiles persisted to the store
    pub writes: u64,
    /// Persist attempts that failed
    pub write_failures: u64,
    /// Entries removed by eviction passes
    pub evictions: u64,
    /// Requests passed through without interception
    pub bypassed: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no tile requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Records a network failure answered from the cache.
    pub fn record_fallback(&mut self, stale: bool) {
        if stale {
            self.stale_served += 1;
        } else {
            self.fallbacks += 1;
        }
    }

    pub fn record_network_fetch(&mut self) {
        self.network_fetches += 1;
    }

    pub fn record_network_failure(&mut self) {
        self.network_failures += 1;
    }

    /// Records the outcome of a persist attempt.
    pub fn record_write(&mut self, ok: bool) {
        if ok {
            self.writes += 1;
        } else {
            self.write_failures += 1;
        }
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_bypass(&mut self) {
        self.bypassed += 1;
    }
}
