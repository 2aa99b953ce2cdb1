// Query engine: loaded navigation data plus the per-backend query pipeline.
//
// A `NavEngine` is what a worker holds once it is ready. Loading runs the
// immediate validity check (polygon: the group lookup for a probe point on
// the loaded zone must succeed), so an engine that exists is usable.
//
// `find_path` is a pure function of (engine, start, end):
//
// Polygon backend:
//   1. Resolve each endpoint's group; different groups means no path.
//   2. Snap both endpoints onto that group (optionally bounded by
//      `max_snap_distance`); a failed snap means no path.
//   3. Snapped endpoints within `coincident_dist_sq` return a 2-point path.
//   4. Otherwise A* + funnel over the zone.
//
// Grid backend:
//   1. World -> cell (floor), snapped onto a walkable cell within
//      `grid_snap_radius`.
//   2. Same cell returns the single cell-center point (forward transform,
//      never the caller's raw input).
//   3. Otherwise grid A*, each cell mapped back through the forward transform.
//
// "No path" is `Ok(None)`; `Err` is reserved for malformed queries.

use tracing::debug;

use crate::config::NavConfig;
use crate::error::{LoadError, QueryError};
use crate::grid::WalkGrid;
use crate::navdata::NavigationData;
use crate::path::NavPath;
use crate::types::{GroupId, Vec3};
use crate::zone::PolygonZone;

/// A loaded, validated navigation backend.
#[derive(Clone, Debug)]
pub enum NavEngine {
    Polygon(PolygonEngine),
    Grid(GridEngine),
}

#[derive(Clone, Debug)]
pub struct PolygonEngine {
    zone: PolygonZone,
    probe_group: GroupId,
    config: NavConfig,
}

#[derive(Clone, Debug)]
pub struct GridEngine {
    grid: WalkGrid,
    config: NavConfig,
}

impl NavEngine {
    /// Load navigation data and run the validity check.
    pub fn load(data: NavigationData, config: NavConfig) -> Result<Self, LoadError> {
        match data {
            NavigationData::Polygon(zone_data) => {
                let zone = PolygonZone::load(&zone_data)?;
                let probe_group = zone
                    .probe_point()
                    .and_then(|p| zone.group_of(p))
                    .ok_or(LoadError::ValidityCheckFailed)?;
                Ok(NavEngine::Polygon(PolygonEngine {
                    zone,
                    probe_group,
                    config,
                }))
            }
            NavigationData::Grid(grid_data) => {
                let grid = WalkGrid::load(grid_data)?;
                Ok(NavEngine::Grid(GridEngine { grid, config }))
            }
        }
    }

    /// Decode serialized navigation data and load it.
    pub fn from_bytes(bytes: &[u8], config: NavConfig) -> Result<Self, LoadError> {
        Self::load(NavigationData::from_bytes(bytes)?, config)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            NavEngine::Polygon(_) => "polygon",
            NavEngine::Grid(_) => "grid",
        }
    }

    pub fn config(&self) -> &NavConfig {
        match self {
            NavEngine::Polygon(e) => &e.config,
            NavEngine::Grid(e) => &e.config,
        }
    }

    /// Short description of the loaded data for log lines.
    pub fn summary(&self) -> String {
        match self {
            NavEngine::Polygon(e) => format!(
                "{} vertices, {} polygons, {} groups (probe {})",
                e.zone.vertex_count(),
                e.zone.polygon_count(),
                e.zone.group_count(),
                e.probe_group
            ),
            NavEngine::Grid(e) => format!(
                "{}x{} cells, {} walkable",
                e.grid.width(),
                e.grid.height(),
                e.grid.walkable_count()
            ),
        }
    }

    pub fn zone(&self) -> Option<&PolygonZone> {
        match self {
            NavEngine::Polygon(e) => Some(&e.zone),
            NavEngine::Grid(_) => None,
        }
    }

    pub fn grid(&self) -> Option<&WalkGrid> {
        match self {
            NavEngine::Polygon(_) => None,
            NavEngine::Grid(e) => Some(&e.grid),
        }
    }

    /// Find a path between two world positions.
    pub fn find_path(&self, start: Vec3, end: Vec3) -> Result<Option<NavPath>, QueryError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(QueryError::NonFiniteInput);
        }
        Ok(match self {
            NavEngine::Polygon(e) => e.find_path(start, end),
            NavEngine::Grid(e) => e.find_path(start, end),
        })
    }
}

impl PolygonEngine {
    pub fn probe_group(&self) -> GroupId {
        self.probe_group
    }

    fn find_path(&self, start: Vec3, end: Vec3) -> Option<NavPath> {
        let group = self.zone.group_of(start)?;
        let end_group = self.zone.group_of(end)?;
        if group != end_group {
            debug!(%group, %end_group, "endpoints in different groups");
            return None;
        }

        let max = self.config.max_snap_distance;
        let start_node = self.zone.closest_node(start, group, max)?;
        let end_node = self.zone.closest_node(end, group, max)?;

        if start_node.1.distance_squared(end_node.1) <= self.config.coincident_dist_sq {
            return Some(NavPath::from_points(vec![start_node.1, end_node.1]));
        }

        self.zone.find_path(start_node, end_node).map(NavPath::from_points)
    }
}

impl GridEngine {
    fn find_path(&self, start: Vec3, end: Vec3) -> Option<NavPath> {
        let radius = self.config.grid_snap_radius;
        let start_cell = self.grid.snap_cell(self.grid.world_to_cell(start), radius)?;
        let end_cell = self.grid.snap_cell(self.grid.world_to_cell(end), radius)?;

        if start_cell == end_cell {
            return Some(NavPath::single(self.grid.cell_to_world(start_cell)));
        }

        let cells = self
            .grid
            .find_path(start_cell, end_cell, self.config.allow_diagonal)?;
        if cells.is_empty() {
            return None;
        }
        let points = cells.into_iter().map(|c| self.grid.cell_to_world(c)).collect();
        Some(NavPath::from_points(points))
    }
}
