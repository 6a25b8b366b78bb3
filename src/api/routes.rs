//! API Routes
//!
//! Configures the Axum router with the proxy and administrative endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    command_handler, fetch_handler, forward_absolute_form, health_handler, not_found_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /fetch?url=...` - Fetch a resource through the tile cache
/// - `POST /admin/command` - Run an administrative command (`cleanup`)
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
/// - any absolute-form request, whatever its path - Forward proxy
///
/// # Middleware
/// - Forward proxy: absolute-form targets go to the gateway before routing
/// - CORS: Allows any origin so browser map clients can load tiles
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/fetch", get(fetch_handler))
        .route("/admin/command", post(command_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            forward_absolute_form,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
