//! Cache Module
//!
//! Tile storage, per-entry bookkeeping and size/count eviction.

mod disk;
mod entry;
pub mod eviction;
pub mod metadata;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use disk::DiskTileStore;
pub use entry::{current_timestamp_ms, CacheKey, CachedEntry, EntryMeta};
pub use eviction::{enforce_limits, EvictionLimits, EvictionReport};
pub use metadata::{is_fresh, EntryInfo, SIZE_ESTIMATE_BYTES};
pub use stats::CacheStats;
pub use store::{MemoryTileStore, TileStore};
