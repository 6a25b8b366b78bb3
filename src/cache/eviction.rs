//! Eviction Module
//!
//! Keeps the store within its size and count bounds by deleting the oldest
//! tiles first.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::metadata::{self, EntryInfo, SIZE_ESTIMATE_BYTES};
use crate::cache::TileStore;
use crate::error::Result;

// == Eviction Limits ==
/// Hard bounds on what the store may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionLimits {
    pub max_size_bytes: u64,
    pub max_entries: usize,
}

impl EvictionLimits {
    /// True while either bound is violated.
    pub fn exceeded(&self, total_size: u64, total_count: usize) -> bool {
        total_size > self.max_size_bytes || total_count > self.max_entries
    }
}

// == Eviction Report ==
/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Entries considered by the pass
    pub scanned: usize,
    /// Entries deleted
    pub evicted: usize,
    /// Bytes released by the deleted entries
    pub bytes_freed: u64,
    /// Deletions that failed and were skipped
    pub delete_failures: usize,
    /// Store size after the pass
    pub total_size: u64,
    /// Store entry count after the pass
    pub total_count: usize,
}

/// Orders entries oldest first.
///
/// Entries without a timestamp go after every timestamped entry, so tiles
/// of unknown age are the last to be evicted.
pub fn sort_for_eviction(entries: &mut [EntryInfo]) {
    entries.sort_by_key(|entry| (entry.timestamp.is_none(), entry.timestamp));
}

/// Collects timestamp and size for every stored entry.
///
/// Entries whose metadata cannot be read are kept with no timestamp and the
/// fallback size; entries that vanish mid-scan are dropped.
pub async fn scan(store: &dyn TileStore) -> Result<Vec<EntryInfo>> {
    let keys = store.keys().await?;
    let mut entries = Vec::with_capacity(keys.len());

    for key in keys {
        match store.head(&key).await {
            Ok(Some(meta)) => entries.push(metadata::describe(store, &meta).await),
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "Cannot read entry metadata");
                entries.push(EntryInfo {
                    key,
                    timestamp: None,
                    size_bytes: SIZE_ESTIMATE_BYTES,
                });
            }
        }
    }

    Ok(entries)
}

// == Enforce Limits ==
/// Deletes oldest entries until both bounds hold or nothing is left.
///
/// A failed delete is logged and skipped; the pass continues with the next
/// oldest entry. Only a failure to enumerate the store aborts the pass.
pub async fn enforce_limits(
    store: &dyn TileStore,
    limits: EvictionLimits,
) -> Result<EvictionReport> {
    let mut entries = scan(store).await?;
    sort_for_eviction(&mut entries);

    let mut report = EvictionReport {
        scanned: entries.len(),
        total_size: entries.iter().map(|e| e.size_bytes).sum(),
        total_count: entries.len(),
        ..Default::default()
    };

    for entry in &entries {
        if !limits.exceeded(report.total_size, report.total_count) {
            break;
        }
        match store.delete(&entry.key).await {
            Ok(_) => {
                report.total_size = report.total_size.saturating_sub(entry.size_bytes);
                report.total_count -= 1;
                report.evicted += 1;
                report.bytes_freed += entry.size_bytes;
                debug!(key = %entry.key, size = entry.size_bytes, "Evicted tile");
            }
            Err(e) => {
                report.delete_failures += 1;
                warn!(key = %entry.key, error = %e, "Error deleting cache entry");
            }
        }
    }

    if report.evicted > 0 || report.delete_failures > 0 {
        info!(
            evicted = report.evicted,
            bytes_freed = report.bytes_freed,
            delete_failures = report.delete_failures,
            total_size = report.total_size,
            total_count = report.total_count,
            "Eviction pass complete"
        );
    } else {
        debug!(
            total_size = report.total_size,
            total_count = report.total_count,
            "Cache within limits"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, CachedEntry, EntryMeta, MemoryTileStore};
    use crate::error::TileCacheError;
    use async_trait::async_trait;
    use bytes::Bytes;

    fn key(i: usize) -> CacheKey {
        CacheKey::for_url(&format!("https://tiles.example.com/10/{}/1.png", i)).unwrap()
    }

    fn sized_entry(i: usize, stored_at: Option<u64>, size: usize) -> CachedEntry {
        CachedEntry::new(key(i), 200, "OK", Vec::new(), Bytes::from(vec![0u8; size]))
            .with_stored_at(stored_at)
    }

    fn limits(max_size_bytes: u64, max_entries: usize) -> EvictionLimits {
        EvictionLimits {
            max_size_bytes,
            max_entries,
        }
    }

    #[test]
    fn test_sort_puts_missing_timestamps_last() {
        let info = |i, ts| EntryInfo {
            key: key(i),
            timestamp: ts,
            size_bytes: 1,
        };
        let mut entries = vec![
            info(0, None),
            info(1, Some(30)),
            info(2, Some(10)),
            info(3, Some(20)),
        ];
        sort_for_eviction(&mut entries);

        let order: Vec<Option<u64>> = entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(order, vec![Some(10), Some(20), Some(30), None]);
    }

    #[tokio::test]
    async fn test_within_limits_evicts_nothing() {
        let store = MemoryTileStore::new();
        for i in 0..3 {
            store.put(sized_entry(i, Some(i as u64 + 1), 10)).await.unwrap();
        }

        let report = enforce_limits(&store, limits(1_000, 10)).await.unwrap();
        assert_eq!(report.evicted, 0);
        assert_eq!(report.total_count, 3);
        assert_eq!(report.total_size, 30);
    }

    #[tokio::test]
    async fn test_count_bound_evicts_oldest() {
        let store = MemoryTileStore::new();
        for i in 0..5 {
            store.put(sized_entry(i, Some(100 + i as u64), 10)).await.unwrap();
        }

        let report = enforce_limits(&store, limits(u64::MAX, 3)).await.unwrap();
        assert_eq!(report.evicted, 2);
        assert_eq!(store.len().await.unwrap(), 3);
        assert!(store.get(&key(0)).await.unwrap().is_none());
        assert!(store.get(&key(1)).await.unwrap().is_none());
        assert!(store.get(&key(2)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_size_bound_evicts_until_satisfied() {
        let store = MemoryTileStore::new();
        for i in 0..4 {
            store.put(sized_entry(i, Some(100 + i as u64), 100)).await.unwrap();
        }

        let report = enforce_limits(&store, limits(250, 100)).await.unwrap();
        assert_eq!(report.evicted, 2);
        assert_eq!(report.bytes_freed, 200);
        assert_eq!(report.total_size, 200);
        assert!(store.get(&key(3)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_entries_without_timestamp_evicted_last() {
        let store = MemoryTileStore::new();
        store.put(sized_entry(0, None, 10)).await.unwrap();
        store.put(sized_entry(1, Some(500), 10)).await.unwrap();
        store.put(sized_entry(2, Some(900), 10)).await.unwrap();

        enforce_limits(&store, limits(u64::MAX, 1)).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec![key(0)]);
    }

    #[tokio::test]
    async fn test_content_length_drives_size() {
        let store = MemoryTileStore::new();
        let mut entry = sized_entry(0, Some(1), 10);
        entry.meta.headers.push(("Content-Length".to_string(), "5000".to_string()));
        store.put(entry).await.unwrap();

        let report = enforce_limits(&store, limits(4_000, 10)).await.unwrap();
        assert_eq!(report.evicted, 1);
        assert_eq!(report.bytes_freed, 5000);
    }

    // Store whose deletes fail for one key.
    struct FlakyStore {
        inner: MemoryTileStore,
        undeletable: CacheKey,
    }

    #[async_trait]
    impl TileStore for FlakyStore {
        async fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>> {
            self.inner.get(key).await
        }
        async fn head(&self, key: &CacheKey) -> Result<Option<EntryMeta>> {
            self.inner.head(key).await
        }
        async fn body_len(&self, key: &CacheKey) -> Result<u64> {
            self.inner.body_len(key).await
        }
        async fn put(&self, entry: CachedEntry) -> Result<()> {
            self.inner.put(entry).await
        }
        async fn delete(&self, key: &CacheKey) -> Result<bool> {
            if key == &self.undeletable {
                return Err(TileCacheError::Storage("permission denied".to_string()));
            }
            self.inner.delete(key).await
        }
        async fn keys(&self) -> Result<Vec<CacheKey>> {
            self.inner.keys().await
        }
    }

    #[tokio::test]
    async fn test_delete_failure_is_skipped() {
        let store = FlakyStore {
            inner: MemoryTileStore::new(),
            undeletable: key(0),
        };
        for i in 0..4 {
            store.put(sized_entry(i, Some(10 + i as u64), 10)).await.unwrap();
        }

        let report = enforce_limits(&store, limits(u64::MAX, 2)).await.unwrap();
        assert_eq!(report.delete_failures, 1);
        assert_eq!(report.evicted, 2);
        assert_eq!(report.total_count, 2);
        // Oldest survives because its delete failed; the next two went instead.
        assert!(store.get(&key(0)).await.unwrap().is_some());
        assert!(store.get(&key(1)).await.unwrap().is_none());
        assert!(store.get(&key(2)).await.unwrap().is_none());
        assert!(store.get(&key(3)).await.unwrap().is_some());
    }
}
