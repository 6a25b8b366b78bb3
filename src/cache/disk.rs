//! Disk Store Module
//!
//! Persists each tile as a single file so that a restart keeps the cache.
//!
//! File layout: a 4-byte big-endian metadata length, the JSON-encoded
//! [`EntryMeta`], then the raw body. Files are named by the SHA-256 of the
//! cache key and written through a temporary file plus rename, so readers
//! only ever observe complete entries.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CachedEntry, EntryMeta, TileStore};
use crate::error::{Result, TileCacheError};

const ENTRY_EXTENSION: &str = "tile";
const LEN_PREFIX: usize = 4;
/// Metadata larger than this marks the file as corrupt.
const MAX_META_LEN: usize = 1024 * 1024;

// == Disk Tile Store ==
/// Tile store keeping one file per entry under a root directory.
#[derive(Debug)]
pub struct DiskTileStore {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl DiskTileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            TileCacheError::Config(format!(
                "cannot create cache directory {}: {}",
                root.display(),
                e
            ))
        })?;
        debug!(root = %root.display(), "Opened disk tile store");
        Ok(Self {
            root,
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.url().as_bytes());
        self.root.join(format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION))
    }

    fn tmp_path_for(&self, path: &Path) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{}-{}.tmp", std::process::id(), n));
        PathBuf::from(name)
    }

    async fn discard_unreadable(path: &Path, error: &TileCacheError) {
        warn!(path = %path.display(), error = %error, "Removing unreadable cache entry");
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Cannot remove cache entry"),
        }
    }

    /// Reads only the metadata block of an entry file.
    async fn read_meta(path: &Path) -> Result<Option<EntryMeta>> {
        let mut file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut prefix = [0u8; LEN_PREFIX];
        file.read_exact(&mut prefix).await?;
        let meta_len = u32::from_be_bytes(prefix) as usize;
        if meta_len > MAX_META_LEN {
            return Err(corrupt(path, "metadata length out of range"));
        }

        let mut meta = vec![0u8; meta_len];
        file.read_exact(&mut meta).await?;
        Ok(Some(serde_json::from_slice(&meta)?))
    }
}

/// Splits a whole entry file into metadata and body.
fn decode_entry(path: &Path, raw: Vec<u8>) -> Result<CachedEntry> {
    if raw.len() < LEN_PREFIX {
        return Err(corrupt(path, "missing length prefix"));
    }
    let mut prefix = [0u8; LEN_PREFIX];
    prefix.copy_from_slice(&raw[..LEN_PREFIX]);
    let meta_len = u32::from_be_bytes(prefix) as usize;
    let body_start = LEN_PREFIX + meta_len;
    if meta_len > MAX_META_LEN || raw.len() < body_start {
        return Err(corrupt(path, "truncated metadata"));
    }

    let meta: EntryMeta = serde_json::from_slice(&raw[LEN_PREFIX..body_start])?;
    let body = Bytes::from(raw).slice(body_start..);
    Ok(CachedEntry { meta, body })
}

fn encode_entry(entry: &CachedEntry) -> Result<Vec<u8>> {
    let meta = serde_json::to_vec(&entry.meta)?;
    let meta_len = u32::try_from(meta.len())
        .ok()
        .filter(|len| (*len as usize) <= MAX_META_LEN)
        .ok_or_else(|| TileCacheError::Storage("entry metadata too large".to_string()))?;

    let mut buf = Vec::with_capacity(LEN_PREFIX + meta.len() + entry.body.len());
    buf.extend_from_slice(&meta_len.to_be_bytes());
    buf.extend_from_slice(&meta);
    buf.extend_from_slice(&entry.body);
    Ok(buf)
}

fn corrupt(path: &Path, reason: &str) -> TileCacheError {
    TileCacheError::Storage(format!("corrupt entry {}: {}", path.display(), reason))
}

#[async_trait]
impl TileStore for DiskTileStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>> {
        let path = self.path_for(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry = decode_entry(&path, raw)?;
        // A digest collision would surface as a foreign key.
        Ok(Some(entry).filter(|entry| entry.key() == key))
    }

    async fn head(&self, key: &CacheKey) -> Result<Option<EntryMeta>> {
        let meta = Self::read_meta(&self.path_for(key)).await?;
        Ok(meta.filter(|meta| &meta.key == key))
    }

    async fn body_len(&self, key: &CacheKey) -> Result<u64> {
        self.get(key)
            .await?
            .map(|entry| entry.body.len() as u64)
            .ok_or_else(|| TileCacheError::NotFound(key.to_string()))
    }

    async fn put(&self, entry: CachedEntry) -> Result<()> {
        let path = self.path_for(entry.key());
        let tmp = self.tmp_path_for(&path);
        let buf = encode_entry(&entry)?;

        if let Err(e) = fs::write(&tmp, &buf).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists stored keys.
    ///
    /// An entry file whose metadata cannot be decoded has no key to report,
    /// so it is removed here; otherwise it would sit outside both bounds.
    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match Self::read_meta(&path).await {
                Ok(Some(meta)) => keys.push(meta.key),
                Ok(None) => {}
                Err(e) => Self::discard_unreadable(&path, &e).await,
            }
        }

        Ok(keys)
    }

    async fn len(&self) -> Result<usize> {
        let mut count = 0;
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            if item.path().extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{enforce_limits, EvictionLimits};

    fn entry(url: &str, body: &'static [u8]) -> CachedEntry {
        let key = CacheKey::for_url(url).unwrap();
        CachedEntry::new(
            key,
            200,
            "OK",
            vec![("content-type".to_string(), "image/png".to_string())],
            Bytes::from_static(body),
        )
    }

    #[tokio::test]
    async fn test_disk_put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskTileStore::open(dir.path()).await.unwrap();
        let e = entry("https://tiles.example.com/3/4/5.png", b"\x89PNG body");

        store.put(e.clone()).await.unwrap();

        let fetched = store.get(e.key()).await.unwrap().unwrap();
        assert_eq!(fetched, e);
        assert_eq!(store.head(e.key()).await.unwrap().unwrap(), e.meta);
        assert_eq!(store.body_len(e.key()).await.unwrap(), 9);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disk_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let e = entry("https://tiles.example.com/3/4/5.png", b"persisted");
        {
            let store = DiskTileStore::open(dir.path()).await.unwrap();
            store.put(e.clone()).await.unwrap();
        }

        let reopened = DiskTileStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec![e.key().clone()]);
        assert_eq!(reopened.get(e.key()).await.unwrap().unwrap().body, e.body);
    }

    #[tokio::test]
    async fn test_disk_overwrite_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskTileStore::open(dir.path()).await.unwrap();
        store
            .put(entry("https://tiles.example.com/3/4/5.png", b"old"))
            .await
            .unwrap();
        let newer = entry("https://tiles.example.com/3/4/5.png", b"newer");
        store.put(newer.clone()).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.get(newer.key()).await.unwrap().unwrap().body, newer.body);

        assert!(store.delete(newer.key()).await.unwrap());
        assert!(!store.delete(newer.key()).await.unwrap());
        assert!(store.get(newer.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_truncated_entry_fails_measurement() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskTileStore::open(dir.path()).await.unwrap();
        let e = entry("https://tiles.example.com/3/4/5.png", b"body");
        store.put(e.clone()).await.unwrap();

        // Keep the length prefix but cut the metadata short.
        let path = store.path_for(e.key());
        let raw = std::fs::read(&path).unwrap();
        std::fs::write(&path, &raw[..LEN_PREFIX + 3]).unwrap();

        assert!(store.body_len(e.key()).await.is_err());
        assert!(store.get(e.key()).await.is_err());
        // Listing drops the unreadable file instead of failing.
        assert!(store.keys().await.unwrap().is_empty());
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_eviction_reclaims_unreadable_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskTileStore::open(dir.path()).await.unwrap();
        let urls = [
            "https://tiles.example.com/3/4/1.png",
            "https://tiles.example.com/3/4/2.png",
            "https://tiles.example.com/3/4/3.png",
        ];
        for url in urls {
            store.put(entry(url, b"tile")).await.unwrap();
        }
        let broken = store.path_for(&CacheKey::for_url(urls[1]).unwrap());
        let raw = std::fs::read(&broken).unwrap();
        std::fs::write(&broken, &raw[..LEN_PREFIX + 2]).unwrap();

        let limits = EvictionLimits {
            max_size_bytes: u64::MAX,
            max_entries: 0,
        };
        let report = enforce_limits(&store, limits).await.unwrap();

        assert_eq!(report.total_count, 0);
        assert_eq!(store.len().await.unwrap(), 0);
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 0);
    }

    #[tokio::test]
    async fn test_disk_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README"), b"not a tile").unwrap();
        let store = DiskTileStore::open(dir.path()).await.unwrap();

        assert!(store.keys().await.unwrap().is_empty());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[test]
    fn test_decode_rejects_short_file() {
        let path = Path::new("short.tile");
        assert!(decode_entry(path, vec![0, 0]).is_err());
        assert!(decode_entry(path, vec![0, 0, 0, 9, b'{']).is_err());
    }
}
