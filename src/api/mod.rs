//! API Module
//!
//! HTTP handlers and routing for the tile cache proxy.
//!
//! # Endpoints
//! - `GET /fetch?url=...` - Fetch a resource through the tile cache
//! - `POST /admin/command` - Run an administrative command
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint
//! - any absolute-form request - Forward proxy

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
