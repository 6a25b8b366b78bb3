//! Error types for the tile cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Tile Cache Error Enum ==
/// Unified error type for the tile cache.
#[derive(Error, Debug)]
pub enum TileCacheError {
    /// The origin could not be reached and no cached copy exists
    #[error("Network failure: {0}")]
    Network(String),

    /// A store read, write or delete failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Entry not present in the store
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration (bad provider pattern, unusable cache dir)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for TileCacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            TileCacheError::Network(_) => StatusCode::BAD_GATEWAY,
            TileCacheError::NotFound(_) => StatusCode::NOT_FOUND,
            TileCacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the tile cache.
pub type Result<T> = std::result::Result<T, TileCacheError>;
