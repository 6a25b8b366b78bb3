//! Entry Metadata Module
//!
//! Derives freshness and size bookkeeping for stored tiles.

use tracing::debug;

use crate::cache::{CacheKey, EntryMeta, TileStore};

/// Size assumed for an entry whose body cannot be measured.
pub const SIZE_ESTIMATE_BYTES: u64 = 20_000;

// == Entry Info ==
/// Eviction-relevant facts about one stored tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: CacheKey,
    /// Write time in Unix milliseconds; None when the entry carries no
    /// usable provenance
    pub timestamp: Option<u64>,
    pub size_bytes: u64,
}

/// Write time of an entry. A zero timestamp counts as missing.
pub fn timestamp(meta: &EntryMeta) -> Option<u64> {
    meta.stored_at.filter(|ts| *ts > 0)
}

/// Parses a `Content-Length` header if one is present and well formed.
pub fn content_length(meta: &EntryMeta) -> Option<u64> {
    meta.header("content-length").and_then(|v| v.trim().parse().ok())
}

/// Whether a cached entry may be served without asking the origin.
///
/// False without a timestamp; otherwise true iff the entry's age is at
/// most `max_age_ms`.
pub fn is_fresh(meta: &EntryMeta, now_ms: u64, max_age_ms: u64) -> bool {
    match timestamp(meta) {
        Some(ts) => now_ms.saturating_sub(ts) <= max_age_ms,
        None => false,
    }
}

/// Computes timestamp and size for one entry.
///
/// Size prefers the `Content-Length` header, then the measured body. If
/// the body cannot be materialized, [`SIZE_ESTIMATE_BYTES`] is used so a
/// single unreadable entry never aborts a scan.
pub async fn describe(store: &dyn TileStore, meta: &EntryMeta) -> EntryInfo {
    let size_bytes = match content_length(meta) {
        Some(len) => len,
        None => match store.body_len(&meta.key).await {
            Ok(len) => len,
            Err(e) => {
                debug!(key = %meta.key, error = %e, "Body unmeasurable, using size estimate");
                SIZE_ESTIMATE_BYTES
            }
        },
    };

    EntryInfo {
        key: meta.key.clone(),
        timestamp: timestamp(meta),
        size_bytes,
    }
}
