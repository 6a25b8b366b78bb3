//! Eviction Task
//!
//! Background task that periodically enforces the cache bounds, so limits
//! converge even when no new tiles are being written.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::proxy::TileCache;

/// Spawns a background task that runs an eviction pass every interval.
///
/// # Arguments
/// * `cache` - shared cache service
/// * `cleanup_interval_secs` - Interval in seconds between passes
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(cache: Arc<TileCache>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting eviction task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.enforce_limits().await {
                Ok(report) if report.evicted > 0 => {
                    info!("Periodic cleanup: evicted {} entries", report.evicted);
                }
                Ok(_) => debug!("Periodic cleanup: cache within limits"),
                Err(e) => warn!(error = %e, "Periodic cleanup failed"),
            }
        }
    })
}
