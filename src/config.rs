//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EvictionLimits;
use crate::proxy::Strategy;

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Tile cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Age in days after which a cached tile is no longer fresh
    pub max_age_days: u64,
    /// Upper bound on the summed size of all cached tiles
    pub max_cache_size_bytes: u64,
    /// Upper bound on the number of cached tiles
    pub max_tile_count: usize,
    /// Elevation tiles above this zoom are served but never stored
    pub dem_max_zoom: u32,
    /// Retrieval strategy for intercepted tiles
    pub strategy: Strategy,
    /// Origin request timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Directory for the on-disk store; None keeps tiles in memory
    pub cache_dir: Option<PathBuf>,
    /// HTTP server port
    pub server_port: u16,
    /// Periodic eviction interval in seconds, 0 disables the task
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_AGE_DAYS` - Tile TTL in days (default: 20)
    /// - `MAX_CACHE_SIZE_BYTES` - Size bound (default: 100 MiB)
    /// - `MAX_TILE_COUNT` - Count bound (default: 5000)
    /// - `DEM_MAX_ZOOM` - Highest cached elevation zoom (default: 12)
    /// - `CACHE_STRATEGY` - `network-first` or `cache-first` (default: network-first)
    /// - `FETCH_TIMEOUT_SECS` - Origin timeout (default: 30)
    /// - `CACHE_DIR` - Enables the disk store when set
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Periodic eviction in seconds (default: 300)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    ///
    /// Missing or unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            max_age_days: parse_var(&lookup, "MAX_AGE_DAYS").unwrap_or(defaults.max_age_days),
            max_cache_size_bytes: parse_var(&lookup, "MAX_CACHE_SIZE_BYTES")
                .unwrap_or(defaults.max_cache_size_bytes),
            max_tile_count: parse_var(&lookup, "MAX_TILE_COUNT")
                .unwrap_or(defaults.max_tile_count),
            dem_max_zoom: parse_var(&lookup, "DEM_MAX_ZOOM").unwrap_or(defaults.dem_max_zoom),
            strategy: lookup("CACHE_STRATEGY")
                .and_then(|v| Strategy::from_str(&v).ok())
                .unwrap_or(defaults.strategy),
            fetch_timeout_secs: parse_var(&lookup, "FETCH_TIMEOUT_SECS")
                .unwrap_or(defaults.fetch_timeout_secs),
            cache_dir: lookup("CACHE_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            server_port: parse_var(&lookup, "SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var(&lookup, "CLEANUP_INTERVAL")
                .unwrap_or(defaults.cleanup_interval),
        }
    }

    /// TTL in milliseconds.
    pub fn max_age_ms(&self) -> u64 {
        self.max_age_days.saturating_mul(MS_PER_DAY)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Size and count bounds for the eviction engine.
    pub fn eviction_limits(&self) -> EvictionLimits {
        EvictionLimits {
            max_size_bytes: self.max_cache_size_bytes,
            max_entries: self.max_tile_count,
        }
    }
}

/// Parses one variable, treating unparsable values as missing.
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_age_days: 20,
            max_cache_size_bytes: 100 * 1024 * 1024,
            max_tile_count: 5000,
            dem_max_zoom: 12,
            strategy: Strategy::NetworkFirst,
            fetch_timeout_secs: 30,
            cache_dir: None,
            server_port: 3000,
            cleanup_interval: 300,
        }
    }
}
