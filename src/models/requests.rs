//! Request DTOs for the tile cache API
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;

/// Query string of the explicit proxy endpoint (GET /fetch?url=...)
#[derive(Debug, Clone, Deserialize)]
pub struct FetchParams {
    /// Absolute URL of the upstream resource
    pub url: String,
}

impl FetchParams {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        match url::Url::parse(&self.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => None,
            Ok(url) => Some(format!("Unsupported scheme: {}", url.scheme())),
            Err(e) => Some(format!("Invalid url: {}", e)),
        }
    }
}

/// Administrative commands accepted by POST /admin/command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Run an eviction pass immediately
    Cleanup,
}

/// Request body for POST /admin/command
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub command: Command,
}
