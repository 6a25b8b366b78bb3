//! Cache Gateway
//!
//! Entry point for outbound requests. Classifies each one, runs tile GETs
//! through the retrieval strategy, relays everything else uncached, and
//! schedules eviction after writes.
//!
//! Relayed requests carry their method and URL only. Request headers and
//! bodies are not forwarded, so a bypassed POST reaches the origin empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::Method;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{enforce_limits, CacheKey, CacheStats, EvictionLimits, EvictionReport, TileStore};
use crate::config::Config;
use crate::error::Result;
use crate::proxy::{Origin, RetrievalStrategy, TileResponse, TileSource};
use crate::tile::TileClassifier;

// == Evictor ==
/// Runs eviction passes one at a time.
///
/// At most one pass runs and at most one more waits; a write that lands
/// while a pass is already waiting is covered by that pass.
struct Evictor {
    store: Arc<dyn TileStore>,
    limits: EvictionLimits,
    stats: Arc<RwLock<CacheStats>>,
    running: Mutex<()>,
    queued: AtomicBool,
}

impl Evictor {
    async fn run(&self) -> Result<EvictionReport> {
        let _guard = self.running.lock().await;
        self.queued.store(false, Ordering::SeqCst);
        let report = enforce_limits(self.store.as_ref(), self.limits).await?;
        self.stats.write().await.record_evictions(report.evicted);
        Ok(report)
    }
}

// == Tile Cache ==
/// The cache service: constructed once at start-up and shared by every
/// request handler.
pub struct TileCache {
    classifier: TileClassifier,
    retrieval: RetrievalStrategy,
    origin: Arc<dyn Origin>,
    store: Arc<dyn TileStore>,
    evictor: Arc<Evictor>,
    stats: Arc<RwLock<CacheStats>>,
}

impl TileCache {
    /// Wires the cache over an explicit store and origin.
    pub fn new(config: &Config, store: Arc<dyn TileStore>, origin: Arc<dyn Origin>) -> Self {
        Self::with_classifier(config, TileClassifier::new(config.dem_max_zoom), store, origin)
    }

    /// Same as [`TileCache::new`] with a custom provider set.
    pub fn with_classifier(
        config: &Config,
        classifier: TileClassifier,
        store: Arc<dyn TileStore>,
        origin: Arc<dyn Origin>,
    ) -> Self {
        let stats = Arc::new(RwLock::new(CacheStats::new()));
        let retrieval = RetrievalStrategy::new(
            config.strategy,
            store.clone(),
            origin.clone(),
            config.max_age_ms(),
            stats.clone(),
        );
        let evictor = Arc::new(Evictor {
            store: store.clone(),
            limits: config.eviction_limits(),
            stats: stats.clone(),
            running: Mutex::new(()),
            queued: AtomicBool::new(false),
        });

        Self {
            classifier,
            retrieval,
            origin,
            store,
            evictor,
            stats,
        }
    }

    /// Handles one outbound request.
    ///
    /// Tile GETs go through the retrieval strategy; anything else is
    /// fetched from the origin without caching. The only error a caller sees
    /// is a network failure with nothing cached to fall back on.
    pub async fn handle(&self, method: &Method, url: &str) -> Result<TileResponse> {
        let tile = CacheKey::for_request(method, url)
            .and_then(|key| self.classifier.classify(key.url()).map(|c| (key, c)));

        let Some((key, classification)) = tile else {
            debug!(method = %method, url = %url, "Passing request through");
            self.stats.write().await.record_bypass();
            let response = self.origin.fetch(method, url).await?;
            return Ok(TileResponse::from_origin(response, TileSource::Bypass));
        };

        debug!(
            key = %key,
            provider = %classification.provider,
            zoom = ?classification.zoom,
            cache_allowed = classification.cache_allowed,
            "Intercepted tile request"
        );

        let retrieval = self
            .retrieval
            .retrieve(&key, classification.cache_allowed)
            .await?;
        if retrieval.stored {
            self.schedule_eviction();
        }
        Ok(retrieval.response)
    }

    /// Spawns a background eviction pass unless one is already waiting.
    ///
    /// Returns None when the pending pass will cover this write.
    pub fn schedule_eviction(&self) -> Option<JoinHandle<()>> {
        if self.evictor.queued.swap(true, Ordering::SeqCst) {
            return None;
        }
        let evictor = self.evictor.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = evictor.run().await {
                warn!(error = %e, "Cache cleanup failed");
            }
        }))
    }

    /// Runs an eviction pass now and waits for it.
    pub async fn enforce_limits(&self) -> Result<EvictionReport> {
        self.evictor.run().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    pub fn store(&self) -> &Arc<dyn TileStore> {
        &self.store
    }

    pub fn classifier(&self) -> &TileClassifier {
        &self.classifier
    }
}
