//! Tile Classifier
//!
//! Decides whether a URL is a map tile worth intercepting and whether its
//! response may be stored.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, TileCacheError};

/// `/{z}/{x}/{y}.png`; the first capture is the zoom level.
static ZOOM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)/\d+/\d+\.png").expect("valid zoom pattern"));

const OPENTOPOMAP_PATTERN: &str = r"^https?://(?:\w+\.)*tile\.opentopomap\.org/\d+/\d+/\d+\.png";
const AWS_TERRARIUM_PATTERN: &str =
    r"^https?://s3\.amazonaws\.com/elevation-tiles-prod/terrarium/\d+/\d+/\d+\.png";
const GENERIC_TILE_PATTERN: &str = r"^https?://[^/?#]+(?:/[^?#]*)?/\d+/\d+/\d+\.png(?:[?#]|$)";

// == Tile Kind ==
/// What a tile encodes, which decides its caching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    /// Imagery; always cacheable
    Raster,
    /// Elevation (DEM); cacheable only up to the configured zoom
    Elevation,
}

// == Tile Provider ==
/// A named URL shape that identifies tiles from one source.
#[derive(Debug, Clone)]
pub struct TileProvider {
    name: String,
    kind: TileKind,
    pattern: Regex,
}

impl TileProvider {
    pub fn new(name: impl Into<String>, kind: TileKind, pattern: &str) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            TileCacheError::Config(format!("invalid pattern for provider {}: {}", name, e))
        })?;
        Ok(Self {
            name,
            kind,
            pattern,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TileKind {
        self.kind
    }

    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }
}

/// Built-in providers, most specific first.
///
/// Elevation sources must precede the generic shape so that their zoom
/// policy applies.
static BUILTIN_PROVIDERS: LazyLock<Vec<TileProvider>> = LazyLock::new(|| {
    [
        ("aws-terrarium", TileKind::Elevation, AWS_TERRARIUM_PATTERN),
        ("opentopomap", TileKind::Raster, OPENTOPOMAP_PATTERN),
        ("generic", TileKind::Raster, GENERIC_TILE_PATTERN),
    ]
    .into_iter()
    .map(|(name, kind, pattern)| {
        TileProvider::new(name, kind, pattern).expect("valid built-in provider pattern")
    })
    .collect()
});

// == Classification ==
/// Result of classifying a tile URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Name of the provider whose pattern matched
    pub provider: String,
    pub kind: TileKind,
    /// Zoom level, when the path has a `{z}/{x}/{y}.png` shape
    pub zoom: Option<u32>,
    /// Whether a successful response may be persisted
    pub cache_allowed: bool,
}

/// Extracts `z` from the first `/{z}/{x}/{y}.png` in `url`.
pub fn extract_zoom(url: &str) -> Option<u32> {
    ZOOM_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|z| z.as_str().parse().ok())
}

// == Tile Classifier ==
/// Pure URL classifier over an ordered provider list.
#[derive(Debug, Clone)]
pub struct TileClassifier {
    providers: Vec<TileProvider>,
    dem_max_zoom: u32,
}

impl TileClassifier {
    /// Classifier over the built-in providers.
    pub fn new(dem_max_zoom: u32) -> Self {
        Self::with_providers(BUILTIN_PROVIDERS.clone(), dem_max_zoom)
    }

    /// Classifier over a custom provider list, tried in order.
    pub fn with_providers(providers: Vec<TileProvider>, dem_max_zoom: u32) -> Self {
        Self {
            providers,
            dem_max_zoom,
        }
    }

    pub fn providers(&self) -> &[TileProvider] {
        &self.providers
    }

    /// Returns None for URLs that are not tiles.
    pub fn classify(&self, url: &str) -> Option<Classification> {
        let provider = self.providers.iter().find(|p| p.matches(url))?;
        let zoom = extract_zoom(url);
        let cache_allowed = match provider.kind {
            TileKind::Raster => true,
            TileKind::Elevation => zoom.is_some_and(|z| z <= self.dem_max_zoom),
        };

        Some(Classification {
            provider: provider.name.clone(),
            kind: provider.kind,
            zoom,
            cache_allowed,
        })
    }

    pub fn is_tile(&self, url: &str) -> bool {
        self.providers.iter().any(|p| p.matches(url))
    }
}
