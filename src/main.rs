//! Tile Cache - A caching proxy for map tiles
//!
//! Runs the tile cache gateway as an HTTP service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_cache::api::create_router;
use tile_cache::cache::{DiskTileStore, MemoryTileStore, TileStore};
use tile_cache::proxy::HttpOrigin;
use tile_cache::{spawn_cleanup_task, AppState, Config, TileCache};

/// Main entry point for the tile cache proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the tile store (disk when `CACHE_DIR` is set, memory otherwise)
/// 4. Build the cache service around the store and an HTTP origin
/// 5. Start the periodic eviction task
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tile_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tile Cache proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: strategy={}, max_age={}d, max_size={}B, max_tiles={}, dem_max_zoom={}, port={}",
        config.strategy,
        config.max_age_days,
        config.max_cache_size_bytes,
        config.max_tile_count,
        config.dem_max_zoom,
        config.server_port
    );

    let store: Arc<dyn TileStore> = match &config.cache_dir {
        Some(dir) => {
            let store = DiskTileStore::open(dir).await?;
            info!("Disk tile store at {}", store.root().display());
            Arc::new(store)
        }
        None => {
            info!("In-memory tile store");
            Arc::new(MemoryTileStore::new())
        }
    };

    let origin = Arc::new(HttpOrigin::new(config.fetch_timeout())?);
    let cache = Arc::new(TileCache::new(&config, store, origin));

    // Bring a reopened disk store back within bounds before serving.
    let report = cache.enforce_limits().await?;
    info!(
        "Cache ready: {} entries, {} bytes",
        report.total_count, report.total_size
    );

    let cleanup_handle = (config.cleanup_interval > 0)
        .then(|| spawn_cleanup_task(cache.clone(), config.cleanup_interval));

    let app = create_router(AppState::new(cache, &config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the eviction task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Eviction task aborted");
    }
}
