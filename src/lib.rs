//! Tile Cache - A caching proxy for map tiles
//!
//! Intercepts map tile requests, serves them network-first with a TTL-gated
//! cache short-circuit and stale fallback, and keeps the store within size
//! and count bounds by evicting the oldest tiles.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod tasks;
pub mod tile;

pub use api::AppState;
pub use config::Config;
pub use proxy::TileCache;
pub use tasks::spawn_cleanup_task;
