//! Cache Entry Module
//!
//! Defines the request identity and the persisted unit of the tile cache.

use std::fmt;

use axum::http::Method;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

// == Cache Key ==
/// Canonical identity of a cached tile: a GET of a normalized URL.
///
/// Only GET requests are ever keyed, so the method is implied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    url: String,
}

impl CacheKey {
    /// Builds the key for a request, or None when the request is not
    /// cacheable (non-GET method or unparsable URL).
    pub fn for_request(method: &Method, url: &str) -> Option<Self> {
        if method != Method::GET {
            return None;
        }
        Self::for_url(url)
    }

    /// Builds the key for a GET of `url`.
    ///
    /// The URL is parsed and re-serialized so that case differences in the
    /// scheme and host, default ports and fragments do not split entries.
    pub fn for_url(url: &str) -> Option<Self> {
        let mut parsed = Url::parse(url).ok()?;
        parsed.set_fragment(None);
        Some(Self {
            url: parsed.into(),
        })
    }

    pub fn method(&self) -> Method {
        Method::GET
    }

    /// The normalized URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {}", self.url)
    }
}

// == Entry Metadata ==
/// Everything persisted for a tile except its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub key: CacheKey,
    /// Origin status code
    pub status: u16,
    /// Origin reason phrase
    #[serde(default)]
    pub status_text: String,
    /// Origin response headers, in arrival order
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Write time (Unix milliseconds); None for entries written without
    /// provenance
    #[serde(default)]
    pub stored_at: Option<u64>,
}

impl EntryMeta {
    /// Case-insensitive header lookup returning the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// == Cached Entry ==
/// A persisted tile: metadata plus the payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub meta: EntryMeta,
    pub body: Bytes,
}

impl CachedEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        key: CacheKey,
        status: u16,
        status_text: impl Into<String>,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Self {
        Self {
            meta: EntryMeta {
                key,
                status,
                status_text: status_text.into(),
                headers,
                stored_at: Some(current_timestamp_ms()),
            },
            body,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.meta.key
    }

    /// Replaces the write time, mostly useful for seeding stores.
    pub fn with_stored_at(mut self, stored_at: Option<u64>) -> Self {
        self.meta.stored_at = stored_at;
        self
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_only_for_get() {
        let url = "https://a.tile.opentopomap.org/5/10/12.png";
        assert!(CacheKey::for_request(&Method::GET, url).is_some());
        assert!(CacheKey::for_request(&Method::POST, url).is_none());
        assert!(CacheKey::for_request(&Method::HEAD, url).is_none());
    }

    #[test]
    fn test_key_normalizes_url() {
        let a = CacheKey::for_url("HTTPS://A.Tile.OpenTopoMap.org:443/5/10/12.png#frag").unwrap();
        let b = CacheKey::for_url("https://a.tile.opentopomap.org/5/10/12.png").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.url(), "https://a.tile.opentopomap.org/5/10/12.png");
    }

    #[test]
    fn test_key_keeps_query() {
        let a = CacheKey::for_url("https://tiles.example.com/5/10/12.png?style=dark").unwrap();
        let b = CacheKey::for_url("https://tiles.example.com/5/10/12.png").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_rejects_garbage() {
        assert!(CacheKey::for_url("not a url").is_none());
    }

    #[test]
    fn test_key_display() {
        let key = CacheKey::for_url("https://tiles.example.com/1/2/3.png").unwrap();
        assert_eq!(key.to_string(), "GET https://tiles.example.com/1/2/3.png");
    }

    #[test]
    fn test_new_entry_is_stamped() {
        let before = current_timestamp_ms();
        let key = CacheKey::for_url("https://tiles.example.com/1/2/3.png").unwrap();
        let entry = CachedEntry::new(key, 200, "OK", Vec::new(), Bytes::from_static(b"png"));
        let stored_at = entry.meta.stored_at.unwrap();
        assert!(stored_at >= before);
        assert!(stored_at <= current_timestamp_ms());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let key = CacheKey::for_url("https://tiles.example.com/1/2/3.png").unwrap();
        let entry = CachedEntry::new(
            key,
            200,
            "OK",
            vec![("Content-Length".to_string(), "42".to_string())],
            Bytes::new(),
        );
        assert_eq!(entry.meta.header("content-length"), Some("42"));
        assert_eq!(entry.meta.header("etag"), None);
    }

    #[test]
    fn test_meta_without_stored_at_deserializes() {
        let json = r#"{"key":{"url":"https://tiles.example.com/1/2/3.png"},"status":200}"#;
        let meta: EntryMeta = serde_json::from_str(json).unwrap();
        assert!(meta.stored_at.is_none());
        assert!(meta.headers.is_empty());
    }
}
