// Path post-processing.
//
// Turns the waypoints a search produced into the `NavPath` handed back to
// callers: world-space points plus total Euclidean polyline length. A path
// with 0 or 1 points has length 0.

use serde::{Deserialize, Serialize};

use crate::types::Vec3;

/// A found path in world space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavPath {
    pub points: Vec<Vec3>,
    pub length: f32,
}

impl NavPath {
    pub fn from_points(points: Vec<Vec3>) -> Self {
        let length = polyline_length(&points);
        Self { points, length }
    }

    /// Single-point path for a search whose endpoints coincide.
    pub fn single(point: Vec3) -> Self {
        Self {
            points: vec![point],
            length: 0.0,
        }
    }

    pub fn first(&self) -> Option<Vec3> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Vec3> {
        self.points.last().copied()
    }
}

/// Sum of distances between consecutive points.
pub fn polyline_length(points: &[Vec3]) -> f32 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}
