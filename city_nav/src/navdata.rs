// Serializable navigation data.
//
// `NavigationData` is the value that crosses the worker boundary: the
// builder produces it on the caller's thread, it is serialized once into the
// `Init` message, and the worker decodes its own private copy. Nothing here
// holds derived state (adjacency, centroids); that is rebuilt by the runtime
// types in `zone.rs` and `grid.rs` when the data is loaded.
//
// Two variants:
// - `Polygon`: flat vertex array (x, y, z triples; index = vertex id) plus
//   connected-component groups of convex CCW polygons.
// - `Grid`: row-major walkability matrix plus the world <-> cell transform.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::LoadError;
use crate::types::{GridCell, Vec3};

/// Height added above `surface_height` for grid cell centers, so returned
/// points sit just on top of the walking surface.
pub const GRID_SURFACE_LIFT: f32 = 0.05;

/// Built navigation data for one navigation domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NavigationData {
    Polygon(PolygonZoneData),
    Grid(GridData),
}

impl NavigationData {
    /// Serialize for transfer to a worker.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode data received from a caller. Shape is checked; semantic
    /// validation happens when the data is loaded into an engine.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            NavigationData::Polygon(_) => "polygon",
            NavigationData::Grid(_) => "grid",
        }
    }
}

// ---------------------------------------------------------------------------
// Polygon zone
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonZoneData {
    /// Vertex positions as consecutive x, y, z floats.
    pub vertices: Vec<f32>,
    pub groups: Vec<GroupData>,
}

/// One connected component of the zone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupData {
    pub polygons: Vec<PolygonData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolygonData {
    pub vertex_ids: SmallVec<[u32; 6]>,
}

impl PolygonZoneData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn polygon_count(&self) -> usize {
        self.groups.iter().map(|g| g.polygons.len()).sum()
    }

    /// Position of vertex `id`, if in range.
    pub fn vertex(&self, id: u32) -> Option<Vec3> {
        let i = id as usize * 3;
        let xyz = self.vertices.get(i..i + 3)?;
        Some(Vec3::new(xyz[0], xyz[1], xyz[2]))
    }
}

// ---------------------------------------------------------------------------
// Walkability grid
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridData {
    pub width: u32,
    pub height: u32,
    /// Row-major: cell (x, y) is at `y * width + x`.
    pub walkable: Vec<bool>,
    pub transform: GridTransform,
}

/// Mapping between world positions and grid cells.
///
/// Forward: cell (gx, gy) -> `((gx + 0.5 - offset_x) / scale,
/// surface_height + GRID_SURFACE_LIFT, (gy + 0.5 - offset_z) / scale)`.
/// Inverse: `floor(x * scale + offset_x)`, `floor(z * scale + offset_z)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    /// Cells per world unit.
    pub scale: f32,
    pub offset_x: f32,
    pub offset_z: f32,
    pub surface_height: f32,
}

impl Default for GridTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_z: 0.0,
            surface_height: 0.0,
        }
    }
}

impl GridTransform {
    pub fn is_valid(&self) -> bool {
        self.scale.is_finite()
            && self.scale > 0.0
            && self.offset_x.is_finite()
            && self.offset_z.is_finite()
            && self.surface_height.is_finite()
    }

    /// World position of a cell's center on the walking surface.
    pub fn cell_to_world(&self, cell: GridCell) -> Vec3 {
        Vec3::new(
            (cell.x as f32 + 0.5 - self.offset_x) / self.scale,
            self.surface_height + GRID_SURFACE_LIFT,
            (cell.y as f32 + 0.5 - self.offset_z) / self.scale,
        )
    }

    /// Cell containing a world position (floor semantics; may be out of
    /// the grid's bounds).
    pub fn world_to_cell(&self, pos: Vec3) -> GridCell {
        GridCell::new(
            (pos.x * self.scale + self.offset_x).floor() as i32,
            (pos.z * self.scale + self.offset_z).floor() as i32,
        )
    }
}
