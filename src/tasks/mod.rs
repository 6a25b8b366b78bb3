//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Eviction: enforces the cache size and count bounds at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
