//! Tile Module
//!
//! Recognizes map tile URLs and the caching policy that applies to them.

mod classifier;

pub use classifier::{extract_zoom, Classification, TileClassifier, TileKind, TileProvider};
