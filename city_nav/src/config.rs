// Data-driven navigation configuration.
//
// `NavConfig` holds the build and query parameters for one navigation
// domain. It is loaded from a JSON object (every field optional, falling back
// to the defaults below) and travels to the worker inside the `Init`
// message, so the caller's builder and the worker's engine agree on the same
// tolerances.
//
// See also: `builder.rs` (reads `weld_tolerance`), `zone.rs` and `grid.rs`
// (read the snapping and search parameters).

use serde::{Deserialize, Serialize};

/// Tunable parameters for building and querying navigation data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Vertices closer than this (world units) are merged by the polygon
    /// builder so that touching triangles share edges.
    pub weld_tolerance: f32,
    /// Snapped endpoints closer than this squared distance skip the polygon
    /// search and return a 2-point path.
    pub coincident_dist_sq: f32,
    /// Polygon snapping rejects points farther than this from the zone.
    /// `None` accepts any distance.
    pub max_snap_distance: Option<f32>,
    /// A grid endpoint on a blocked or out-of-bounds cell moves to the
    /// nearest walkable cell within this many cells (Chebyshev ring).
    /// 0 disables grid snapping, so such endpoints have no path.
    pub grid_snap_radius: u32,
    /// Grid search moves in 8 directions when true, 4 when false.
    pub allow_diagonal: bool,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            weld_tolerance: 1e-4,
            coincident_dist_sq: 0.01,
            max_snap_distance: None,
            grid_snap_radius: 4,
            allow_diagonal: true,
        }
    }
}

impl NavConfig {
    /// Parse a config from a JSON object. Missing fields take defaults; an
    /// empty string is treated as `{}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = NavConfig::default();
        let json = config.to_json().unwrap();
        let restored = NavConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = NavConfig::from_json(r#"{"grid_snap_radius": 0, "max_snap_distance": 2.5}"#)
            .unwrap();
        assert_eq!(config.grid_snap_radius, 0);
        assert_eq!(config.max_snap_distance, Some(2.5));
        assert_eq!(config.weld_tolerance, 1e-4);
        assert!(config.allow_diagonal);
    }

    #[test]
    fn empty_string_is_default() {
        assert_eq!(NavConfig::from_json("  ").unwrap(), NavConfig::default());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(NavConfig::from_json("{ weld").is_err());
        assert!(NavConfig::from_json(r#"{"allow_diagonal": "yes"}"#).is_err());
    }
}
