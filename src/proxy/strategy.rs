//! Retrieval Strategy
//!
//! The per-request protocol for intercepted tiles: serve fresh cache hits,
//! otherwise go to the network and write through, and fall back to any
//! cached copy when the network fails.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::Method;
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{current_timestamp_ms, is_fresh, CacheKey, CacheStats, CachedEntry, TileStore};
use crate::error::{Result, TileCacheError};
use crate::proxy::{Origin, OriginResponse};

// == Strategy ==
/// Which retrieval protocol intercepted tiles follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Re-read the cache after a network failure before giving up
    NetworkFirst,
    /// Fall back to the cache snapshot taken before the network attempt
    CacheFirst,
}

impl FromStr for Strategy {
    type Err = TileCacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network-first" => Ok(Strategy::NetworkFirst),
            "cache-first" | "offline-first" => Ok(Strategy::CacheFirst),
            other => Err(TileCacheError::Config(format!("unknown strategy: {}", other))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::NetworkFirst => f.write_str("network-first"),
            Strategy::CacheFirst => f.write_str("cache-first"),
        }
    }
}

// == Tile Source ==
/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSource {
    /// Not intercepted; relayed straight from the origin
    Bypass,
    /// Fresh cache entry, no network round-trip
    Hit,
    /// Answered by the origin
    Miss,
    /// Network failed; fresh cached copy
    Fallback,
    /// Network failed; expired cached copy
    Stale,
}

impl TileSource {
    /// Value of the `x-tile-cache` header, None for bypassed requests.
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            TileSource::Bypass => None,
            TileSource::Hit => Some("hit"),
            TileSource::Miss => Some("miss"),
            TileSource::Fallback => Some("fallback"),
            TileSource::Stale => Some("stale"),
        }
    }
}

// == Tile Response ==
/// What the gateway hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TileResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: TileSource,
}

impl TileResponse {
    pub fn from_origin(response: OriginResponse, source: TileSource) -> Self {
        Self {
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            body: response.body,
            source,
        }
    }

    pub fn from_entry(entry: CachedEntry, source: TileSource) -> Self {
        Self {
            status: entry.meta.status,
            status_text: entry.meta.status_text,
            headers: entry.meta.headers,
            body: entry.body,
            source,
        }
    }
}

/// A response plus whether it was written to the store.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub response: TileResponse,
    pub stored: bool,
}

// == Retrieval Strategy ==
pub struct RetrievalStrategy {
    strategy: Strategy,
    store: Arc<dyn TileStore>,
    origin: Arc<dyn Origin>,
    max_age_ms: u64,
    stats: Arc<RwLock<CacheStats>>,
}

impl RetrievalStrategy {
    pub fn new(
        strategy: Strategy,
        store: Arc<dyn TileStore>,
        origin: Arc<dyn Origin>,
        max_age_ms: u64,
        stats: Arc<RwLock<CacheStats>>,
    ) -> Self {
        Self {
            strategy,
            store,
            origin,
            max_age_ms,
            stats,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Runs the protocol for one tile GET.
    ///
    /// Fails only when the network is unreachable and no cached copy of
    /// any age exists.
    pub async fn retrieve(&self, key: &CacheKey, cache_allowed: bool) -> Result<Retrieval> {
        let cached = self.lookup(key).await;
        if let Some(entry) = &cached {
            if is_fresh(&entry.meta, current_timestamp_ms(), self.max_age_ms) {
                debug!(key = %key, "Serving fresh tile from cache");
                self.stats.write().await.record_hit();
                return Ok(Retrieval {
                    response: TileResponse::from_entry(entry.clone(), TileSource::Hit),
                    stored: false,
                });
            }
        }
        self.stats.write().await.record_miss();

        match self.origin.fetch(&Method::GET, key.url()).await {
            Ok(response) => {
                self.stats.write().await.record_network_fetch();
                let stored = if response.is_cacheable_status() && cache_allowed {
                    self.persist(key, &response).await
                } else {
                    debug!(
                        key = %key,
                        status = response.status,
                        cache_allowed,
                        "Not caching response"
                    );
                    false
                };
                Ok(Retrieval {
                    response: TileResponse::from_origin(response, TileSource::Miss),
                    stored,
                })
            }
            Err(err) => {
                self.stats.write().await.record_network_failure();
                let fallback = match self.strategy {
                    Strategy::NetworkFirst => self.lookup(key).await,
                    Strategy::CacheFirst => cached,
                };

                let Some(entry) = fallback else {
                    warn!(key = %key, error = %err, "Network failed and no cached copy");
                    return Err(err);
                };

                let stale = !is_fresh(&entry.meta, current_timestamp_ms(), self.max_age_ms);
                warn!(key = %key, error = %err, stale, "Network failed, serving cached copy");
                self.stats.write().await.record_fallback(stale);
                let source = if stale {
                    TileSource::Stale
                } else {
                    TileSource::Fallback
                };
                Ok(Retrieval {
                    response: TileResponse::from_entry(entry, source),
                    stored: false,
                })
            }
        }
    }

    /// Cache read that degrades to a miss on storage errors.
    async fn lookup(&self, key: &CacheKey) -> Option<CachedEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Stores a fresh copy stamped with the current time. Failures are
    /// logged and reported as "not stored".
    async fn persist(&self, key: &CacheKey, response: &OriginResponse) -> bool {
        let entry = CachedEntry::new(
            key.clone(),
            response.status,
            response.status_text.clone(),
            response.headers.clone(),
            response.body.clone(),
        );

        let ok = match self.store.put(entry).await {
            Ok(()) => {
                debug!(key = %key, size = response.body.len(), "Cached tile");
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Caching failed");
                false
            }
        };
        self.stats.write().await.record_write(ok);
        ok
    }
}
