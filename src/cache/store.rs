//! Cache Store Module
//!
//! The storage seam of the tile cache and its in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheKey, CachedEntry, EntryMeta};
use crate::error::{Result, TileCacheError};

// == Tile Store ==
/// Process-wide mapping from cache key to cached tile.
///
/// Implementations must make `put` atomic per key: a concurrent `get` sees
/// either the previous entry or the new one, never a mix. Writers to the
/// same key are not serialized; the last completed `put` wins.
#[async_trait]
pub trait TileStore: Send + Sync + 'static {
    /// Returns the full entry for `key`, if present.
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>>;

    /// Returns the entry metadata without materializing the body.
    async fn head(&self, key: &CacheKey) -> Result<Option<EntryMeta>>;

    /// Materializes the body of `key` and returns its length.
    async fn body_len(&self, key: &CacheKey) -> Result<u64>;

    /// Inserts or replaces the entry under its key.
    async fn put(&self, entry: CachedEntry) -> Result<()>;

    /// Removes `key`. Returns false when nothing was stored under it.
    async fn delete(&self, key: &CacheKey) -> Result<bool>;

    /// Snapshot of all keys, in no particular order.
    async fn keys(&self) -> Result<Vec<CacheKey>>;

    async fn len(&self) -> Result<usize> {
        Ok(self.keys().await?.len())
    }
}

// == Memory Tile Store ==
/// Tile store backed by a HashMap behind an async RwLock.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    entries: RwLock<HashMap<CacheKey, CachedEntry>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn head(&self, key: &CacheKey) -> Result<Option<EntryMeta>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.meta.clone()))
    }

    async fn body_len(&self, key: &CacheKey) -> Result<u64> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.body.len() as u64)
            .ok_or_else(|| TileCacheError::NotFound(key.to_string()))
    }

    async fn put(&self, entry: CachedEntry) -> Result<()> {
        let key = entry.key().clone();
        self.entries.write().await.insert(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}
