//! API Handlers
//!
//! HTTP request handlers for the proxy and administrative endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Query, Request, State},
    http::{header::HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, TileCacheError};
use crate::models::{
    Command, CommandRequest, CommandResponse, FetchParams, HealthResponse, StatsResponse,
};
use crate::proxy::{TileCache, TileResponse};

/// Header naming how an intercepted tile was served.
pub const CACHE_STATUS_HEADER: &str = "x-tile-cache";

/// Connection-scoped headers that must not be relayed by a proxy.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The cache service
    pub cache: Arc<TileCache>,
    /// Strategy name reported by /stats
    pub strategy: String,
}

impl AppState {
    /// Creates a new AppState around an existing cache service.
    pub fn new(cache: Arc<TileCache>, config: &Config) -> Self {
        Self {
            cache,
            strategy: config.strategy.to_string(),
        }
    }
}

/// Converts a gateway response into an HTTP response.
///
/// Hop-by-hop headers are dropped; intercepted tiles gain the cache status
/// header, bypassed responses are relayed as received.
pub fn into_http_response(tile: TileResponse) -> Result<Response> {
    let status = StatusCode::from_u16(tile.status)
        .map_err(|_| TileCacheError::Internal(format!("invalid upstream status {}", tile.status)))?;

    let mut response = Response::new(Body::from(tile.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &tile.headers {
        if HOP_BY_HOP_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "Dropping malformed upstream header"),
        }
    }
    if let Some(source) = tile.source.header_value() {
        headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(source));
    }

    Ok(response)
}

/// Handler for GET /fetch?url=...
///
/// Explicit proxy form: the map client points its tile template here.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
) -> Result<Response> {
    if let Some(error_msg) = params.validate() {
        return Err(TileCacheError::InvalidRequest(error_msg));
    }

    let tile = state.cache.handle(&Method::GET, &params.url).await?;
    into_http_response(tile)
}

/// Middleware for forward-proxy requests.
///
/// Routing only looks at the path, so `GET http://host/stats HTTP/1.1`
/// would otherwise land on a local endpoint. Any request whose target is in
/// absolute form is handed to the gateway instead; origin-form requests
/// continue to the router. Only the method and URL are forwarded.
pub async fn forward_absolute_form(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let uri = request.uri();
    if uri.scheme().is_none() || uri.authority().is_none() {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let url = uri.to_string();
    match state.cache.handle(&method, &url).await {
        Ok(tile) => into_http_response(tile).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Fallback for origin-form paths with no route.
pub async fn not_found_handler(uri: Uri) -> TileCacheError {
    TileCacheError::NotFound(uri.path().to_string())
}

/// Handler for POST /admin/command
///
/// `cleanup` runs an eviction pass and waits for it to finish.
pub async fn command_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(req) = payload.map_err(|e| TileCacheError::InvalidRequest(e.body_text()))?;

    match req.command {
        Command::Cleanup => match state.cache.enforce_limits().await {
            Ok(report) => {
                info!(evicted = report.evicted, "Cleanup complete");
                Ok(Json(CommandResponse::done(report)).into_response())
            }
            Err(e) => {
                warn!(error = %e, "Cleanup failed");
                Ok((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(CommandResponse::error(e.to_string())),
                )
                    .into_response())
            }
        },
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let counters = state.cache.stats().await;
    let total_entries = state.cache.store().len().await?;

    Ok(Json(StatsResponse::new(
        counters,
        total_entries,
        state.strategy.clone(),
    )))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
