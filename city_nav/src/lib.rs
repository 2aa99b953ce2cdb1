// city_nav: navigation data and path search for city agents.
//
// This crate builds queryable navigation data from world geometry and answers
// path queries over it. It holds no threads and no global state: every
// function is a pure function of its inputs, so it can be unit tested and
// benchmarked directly. The worker thread and the request correlator that
// run it off the simulation loop live in `city_nav_worker`.
//
// Module overview:
// - `types.rs`:    Vec3, GridCell, VertexId / PolyId / GroupId.
// - `geometry.rs`: XZ-plane helpers (orientation, area, closest point on polygon).
// - `navdata.rs`:  NavigationData, the serializable value handed to a worker.
// - `builder.rs`:  Polygon zone builder (weld, clean, group) and grid builder.
// - `zone.rs`:     PolygonZone runtime: adjacency, snapping, A* + funnel.
// - `grid.rs`:     WalkGrid runtime: endpoint snapping, 8-way A* without corner cutting.
// - `engine.rs`:   NavEngine: validity check on load, per-backend query pipeline.
// - `path.rs`:     NavPath (world points + polyline length).
// - `config.rs`:   NavConfig, JSON-loaded build and query parameters.
// - `error.rs`:    BuildError / LoadError / QueryError.
//
// Coordinates are Y-up; all 2D reasoning (polygon winding, portals, grid
// cells) happens on the XZ plane.

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod navdata;
pub mod path;
pub mod types;
pub mod zone;

pub use builder::{WalkableMesh, build_polygon_zone, build_walkability_grid};
pub use config::NavConfig;
pub use engine::NavEngine;
pub use error::{BuildError, LoadError, QueryError};
pub use navdata::{GridData, GridTransform, NavigationData, PolygonZoneData};
pub use path::NavPath;
pub use types::{GridCell, GroupId, PolyId, Vec3, VertexId};
