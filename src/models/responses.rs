//! Response DTOs for the tile cache API
//!
//! Defines the structure of outgoing administrative response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, EvictionReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Done,
    Error,
}

/// Response body for POST /admin/command
///
/// `{"status":"done", ...report}` or `{"status":"error","detail":...}`.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten)]
    pub report: Option<EvictionReport>,
}

impl CommandResponse {
    pub fn done(report: EvictionReport) -> Self {
        Self {
            status: CommandStatus::Done,
            detail: None,
            report: Some(report),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Error,
            detail: Some(detail.into()),
            report: None,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: CacheStats,
    /// Entries currently in the store
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Active retrieval strategy
    pub strategy: String,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(counters: CacheStats, total_entries: usize, strategy: impl Into<String>) -> Self {
        let hit_rate = counters.hit_rate();
        Self {
            counters,
            total_entries,
            hit_rate,
            strategy: strategy.into(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
