//! Origin fetching
//!
//! The network side of the proxy: a trait so tests can script the origin,
//! and the reqwest-backed implementation used by the server.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::error::{Result, TileCacheError};

// == Origin Response ==
/// A complete origin answer with its body already read.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl OriginResponse {
    /// Whether the status falls in the cacheable `[200, 400)` range.
    pub fn is_cacheable_status(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

// == Origin ==
/// Source of truth for tiles.
///
/// `fetch` fails only when no response was obtained at all (connection
/// error, timeout, truncated body). Any HTTP status, including 4xx and
/// 5xx, is a successful round-trip.
#[async_trait]
pub trait Origin: Send + Sync + 'static {
    async fn fetch(&self, method: &Method, url: &str) -> Result<OriginResponse>;
}

// == HTTP Origin ==
/// Origin backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: Client,
}

impl HttpOrigin {
    /// Creates an origin whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TileCacheError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, method: &Method, url: &str) -> Result<OriginResponse> {
        debug!(method = %method, url = %url, "Fetching from origin");

        let response = self
            .client
            .request(method.clone(), url)
            .send()
            .await
            .map_err(|e| TileCacheError::Network(e.to_string()))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TileCacheError::Network(e.to_string()))?;

        debug!(url = %url, status = status.as_u16(), size = body.len(), "Origin responded");

        Ok(OriginResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
