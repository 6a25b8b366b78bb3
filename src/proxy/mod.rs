//! Proxy Module
//!
//! Request interception: the origin client, the retrieval protocol and the
//! gateway that ties them to the cache.

mod gateway;
mod origin;
mod strategy;

pub use gateway::TileCache;
pub use origin::{HttpOrigin, Origin, OriginResponse};
pub use strategy::{Retrieval, RetrievalStrategy, Strategy, TileResponse, TileSource};
