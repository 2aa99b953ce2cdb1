// Navigation data construction from world geometry.
//
// Two entry points, both pure functions of their inputs:
//
// - `build_polygon_zone()`: takes the merged walkable surface of the city as
//   an indexed triangle soup already baked into world space, and produces
//   `NavigationData::Polygon`. Steps:
//   1. **Weld** vertices closer than `weld_tolerance` using a spatial hash
//      with cell size = tolerance (each vertex checks the 27 neighboring
//      cells). Without this, meshes merged from separate street/plaza pieces
//      have duplicate vertices along their seams and no shared edges.
//   2. **Clean** triangles: drop those that collapse after welding, have
//      non-finite corners, are vertical (zero XZ area) or are duplicates;
//      flip the rest to CCW winding on the XZ plane.
//   3. **Group** triangles into connected components by shared edges
//      (union-find). An edge used by more than two triangles is non-manifold
//      and links nothing.
//   4. **Compact** to referenced vertices only, in first-use order.
//
// - `build_walkability_grid()`: validates a boolean matrix against its
//   declared dimensions and transform and packs it row-major.
//
// Vertex ids, polygon order and group order are all assigned in input order,
// so identical input always yields identical data.
//
// See also: `navdata.rs` for the output types, `zone.rs` which derives
// per-edge adjacency from the groups when the data is loaded.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::BuildError;
use crate::geometry::cross_xz;
use crate::navdata::{GridData, GridTransform, GroupData, NavigationData, PolygonData, PolygonZoneData};
use crate::types::Vec3;

/// Triangles with less than this doubled XZ area are treated as vertical or
/// degenerate and dropped.
const MIN_TRIANGLE_AREA: f32 = 1e-10;

/// A walkable surface supplied by the world builder.
#[derive(Clone, Debug, Default)]
pub struct WalkableMesh {
    pub positions: Vec<Vec3>,
    /// Triangle list. `None` for a non-indexed mesh, which is rejected.
    pub indices: Option<Vec<u32>>,
}

impl WalkableMesh {
    pub fn indexed(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices: Some(indices),
        }
    }
}

/// Build a polygon zone from a walkable triangle mesh.
pub fn build_polygon_zone(
    mesh: &WalkableMesh,
    weld_tolerance: f32,
) -> Result<NavigationData, BuildError> {
    let indices = mesh.indices.as_ref().ok_or(BuildError::NotIndexed)?;
    if indices.len() % 3 != 0 {
        return Err(BuildError::MalformedIndices { len: indices.len() });
    }
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= mesh.positions.len()) {
        return Err(BuildError::IndexOutOfRange {
            index: bad,
            vertex_count: mesh.positions.len(),
        });
    }

    let (welded, remap) = weld_vertices(&mesh.positions, weld_tolerance);
    let triangles = clean_triangles(indices, &remap, &welded);
    if triangles.is_empty() {
        return Err(BuildError::EmptyOrDegenerate);
    }

    let group_of_tri = connected_components(&triangles);
    let group_count = group_of_tri.iter().copied().max().map_or(0, |g| g + 1);

    // Compact vertices in first-use order and emit groups.
    let mut compact: Vec<Option<u32>> = vec![None; welded.len()];
    let mut vertices = Vec::new();
    let mut groups = vec![GroupData::default(); group_count];
    for (tri, &group) in triangles.iter().zip(&group_of_tri) {
        let mut vertex_ids: SmallVec<[u32; 6]> = SmallVec::new();
        for &v in tri {
            let id = *compact[v as usize].get_or_insert_with(|| {
                let p = welded[v as usize];
                vertices.extend_from_slice(&[p.x, p.y, p.z]);
                (vertices.len() / 3 - 1) as u32
            });
            vertex_ids.push(id);
        }
        groups[group].polygons.push(PolygonData { vertex_ids });
    }

    let data = PolygonZoneData { vertices, groups };
    debug!(
        input_vertices = mesh.positions.len(),
        vertices = data.vertex_count(),
        polygons = data.polygon_count(),
        groups = data.groups.len(),
        "built polygon zone"
    );
    Ok(NavigationData::Polygon(data))
}

/// Build a walkability grid. `matrix[y][x]` is true for walkable cells and
/// must have exactly `height` rows of `width` cells.
pub fn build_walkability_grid(
    width: u32,
    height: u32,
    matrix: &[Vec<bool>],
    transform: GridTransform,
) -> Result<NavigationData, BuildError> {
    let cols = matrix.iter().map(Vec::len).max().unwrap_or(0);
    let dims_ok = width > 0
        && height > 0
        && matrix.len() == height as usize
        && matrix.iter().all(|row| row.len() == width as usize);
    if !dims_ok {
        return Err(BuildError::InvalidDimensions {
            width,
            height,
            rows: matrix.len(),
            cols,
        });
    }
    if !transform.is_valid() {
        return Err(BuildError::InvalidTransform);
    }

    let walkable: Vec<bool> = matrix.iter().flatten().copied().collect();
    debug!(
        width,
        height,
        walkable = walkable.iter().filter(|&&w| w).count(),
        "built walkability grid"
    );
    Ok(NavigationData::Grid(GridData {
        width,
        height,
        walkable,
        transform,
    }))
}

/// Merge vertices within `tolerance` of an earlier vertex. Returns the welded
/// positions and, per input vertex, its welded index (`None` for non-finite
/// positions).
fn weld_vertices(positions: &[Vec3], tolerance: f32) -> (Vec<Vec3>, Vec<Option<u32>>) {
    let mut welded: Vec<Vec3> = Vec::new();
    let mut remap = Vec::with_capacity(positions.len());

    if tolerance.is_nan() || tolerance <= 0.0 {
        for &p in positions {
            remap.push(p.is_finite().then(|| {
                welded.push(p);
                (welded.len() - 1) as u32
            }));
        }
        return (welded, remap);
    }

    let tol_sq = tolerance * tolerance;
    let inv = 1.0 / tolerance;
    let mut buckets: FxHashMap<(i64, i64, i64), SmallVec<[u32; 2]>> = FxHashMap::default();

    for &p in positions {
        if !p.is_finite() {
            remap.push(None);
            continue;
        }
        let key = (
            (p.x * inv).floor() as i64,
            (p.y * inv).floor() as i64,
            (p.z * inv).floor() as i64,
        );
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = buckets.get(&(key.0 + dx, key.1 + dy, key.2 + dz)) else {
                        continue;
                    };
                    if let Some(&id) = bucket
                        .iter()
                        .find(|&&id| welded[id as usize].distance_squared(p) <= tol_sq)
                    {
                        found = Some(id);
                        break 'search;
                    }
                }
            }
        }
        let id = found.unwrap_or_else(|| {
            welded.push(p);
            let id = (welded.len() - 1) as u32;
            buckets.entry(key).or_default().push(id);
            id
        });
        remap.push(Some(id));
    }
    (welded, remap)
}

/// Remap, filter and orient triangles. Output triangles reference welded
/// vertex indices and are CCW on the XZ plane.
fn clean_triangles(indices: &[u32], remap: &[Option<u32>], welded: &[Vec3]) -> Vec<[u32; 3]> {
    let mut seen: FxHashSet<[u32; 3]> = FxHashSet::default();
    let mut out = Vec::with_capacity(indices.len() / 3);
    let mut dropped = 0usize;

    for tri in indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (
            remap[tri[0] as usize],
            remap[tri[1] as usize],
            remap[tri[2] as usize],
        ) else {
            dropped += 1;
            continue;
        };
        if a == b || b == c || a == c {
            dropped += 1;
            continue;
        }
        let area = cross_xz(welded[a as usize], welded[b as usize], welded[c as usize]);
        if area.abs() < MIN_TRIANGLE_AREA {
            dropped += 1;
            continue;
        }
        let oriented = if area > 0.0 { [a, b, c] } else { [a, c, b] };
        let mut key = oriented;
        key.sort_unstable();
        if !seen.insert(key) {
            dropped += 1;
            continue;
        }
        out.push(oriented);
    }

    if dropped > 0 {
        warn!(dropped, kept = out.len(), "dropped degenerate or duplicate triangles");
    }
    out
}

/// Union-find over triangles joined by manifold shared edges. Returns a
/// group index per triangle, numbered in order of first appearance.
fn connected_components(triangles: &[[u32; 3]]) -> Vec<usize> {
    let mut edges: FxHashMap<(u32, u32), SmallVec<[u32; 2]>> = FxHashMap::default();
    for (t, tri) in triangles.iter().enumerate() {
        for i in 0..3 {
            let (a, b) = (tri[i], tri[(i + 1) % 3]);
            edges.entry((a.min(b), a.max(b))).or_default().push(t as u32);
        }
    }

    let mut parent: Vec<u32> = (0..triangles.len() as u32).collect();
    let mut non_manifold = 0usize;
    for sharers in edges.values() {
        match sharers.as_slice() {
            [a, b] => union(&mut parent, *a, *b),
            [_] => {}
            _ => non_manifold += 1,
        }
    }
    if non_manifold > 0 {
        warn!(non_manifold, "ignored edges shared by more than two triangles");
    }

    let mut group_of_root: FxHashMap<u32, usize> = FxHashMap::default();
    (0..triangles.len() as u32)
        .map(|t| {
            let root = find(&mut parent, t);
            let next = group_of_root.len();
            *group_of_root.entry(root).or_insert(next)
        })
        .collect()
}

fn find(parent: &mut [u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        let grand = parent[parent[x as usize] as usize];
        parent[x as usize] = grand;
        x = grand;
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        // Smaller root wins so results do not depend on edge visit order.
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[hi as usize] = lo;
    }
}

/// A flat quad made of two triangles.
#[cfg(test)]
pub(crate) fn quad_mesh(min_x: f32, min_z: f32, max_x: f32, max_z: f32, y: f32) -> WalkableMesh {
    WalkableMesh::indexed(
        vec![
            Vec3::new(min_x, y, min_z),
            Vec3::new(max_x, y, min_z),
            Vec3::new(max_x, y, max_z),
            Vec3::new(min_x, y, max_z),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon_data(data: NavigationData) -> PolygonZoneData {
        match data {
            NavigationData::Polygon(p) => p,
            NavigationData::Grid(_) => panic!("expected polygon data"),
        }
    }

    #[test]
    fn quad_builds_one_group_of_two() {
        let data = polygon_data(build_polygon_zone(&quad_mesh(0.0, 0.0, 4.0, 4.0, 0.0), 1e-4).unwrap());
        assert_eq!(data.vertex_count(), 4);
        assert_eq!(data.groups.len(), 1);
        assert_eq!(data.groups[0].polygons.len(), 2);
    }

    #[test]
    fn two_disjoint_triangles_make_two_groups() {
        let mesh = WalkableMesh::indexed(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(11.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 1.0),
            ],
            vec![0, 1, 2, 3, 4, 5],
        );
        let data = polygon_data(build_polygon_zone(&mesh, 1e-4).unwrap());
        assert_eq!(data.groups.len(), 2);
        assert_eq!(data.groups[0].polygons.len(), 1);
        assert_eq!(data.groups[1].polygons.len(), 1);
    }

    #[test]
    fn welding_joins_seams() {
        // Two triangles whose shared edge uses separate, nearly equal vertices.
        let mesh = WalkableMesh::indexed(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.00005, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(0.0, 0.0, 1.00003),
            ],
            vec![0, 1, 2, 3, 4, 5],
        );
        let welded = polygon_data(build_polygon_zone(&mesh, 1e-4).unwrap());
        assert_eq!(welded.vertex_count(), 4);
        assert_eq!(welded.groups.len(), 1);

        let unwelded = polygon_data(build_polygon_zone(&mesh, 0.0).unwrap());
        assert_eq!(unwelded.vertex_count(), 6);
        assert_eq!(unwelded.groups.len(), 2);
    }

    #[test]
    fn clockwise_input_is_flipped() {
        let mesh = WalkableMesh::indexed(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
            vec![0, 1, 2],
        );
        let data = polygon_data(build_polygon_zone(&mesh, 1e-4).unwrap());
        let ids = &data.groups[0].polygons[0].vertex_ids;
        let corners: Vec<Vec3> = ids.iter().map(|&i| data.vertex(i).unwrap()).collect();
        assert!(cross_xz(corners[0], corners[1], corners[2]) > 0.0);
    }

    #[test]
    fn vertical_and_collapsed_triangles_dropped() {
        let mesh = WalkableMesh::indexed(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 3.0, 0.0),
                Vec3::new(0.0, 0.0, 0.00001),
            ],
            // Wall triangle, then a triangle that collapses after welding.
            vec![0, 1, 2, 0, 3, 1],
        );
        assert_eq!(
            build_polygon_zone(&mesh, 1e-4),
            Err(BuildError::EmptyOrDegenerate)
        );
    }

    #[test]
    fn unused_vertices_are_compacted() {
        let mut mesh = quad_mesh(0.0, 0.0, 1.0, 1.0, 0.0);
        mesh.positions.insert(0, Vec3::new(99.0, 0.0, 99.0));
        mesh.indices = mesh
            .indices
            .map(|idx| idx.into_iter().map(|i| i + 1).collect());
        let data = polygon_data(build_polygon_zone(&mesh, 1e-4).unwrap());
        assert_eq!(data.vertex_count(), 4);
        assert_eq!(data.vertex(0), Some(Vec3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn non_manifold_edge_links_nothing() {
        // Three triangles fanning off the same edge (0,1).
        let mesh = WalkableMesh::indexed(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.5, 0.0, 1.0),
                Vec3::new(0.5, 0.0, -1.0),
                Vec3::new(0.5, 1.0, 2.0),
            ],
            vec![0, 1, 2, 1, 0, 3, 0, 1, 4],
        );
        let data = polygon_data(build_polygon_zone(&mesh, 1e-4).unwrap());
        assert_eq!(data.groups.len(), 3);
    }

    #[test]
    fn rejects_bad_meshes() {
        let unindexed = WalkableMesh {
            positions: vec![Vec3::ZERO; 3],
            indices: None,
        };
        assert_eq!(build_polygon_zone(&unindexed, 1e-4), Err(BuildError::NotIndexed));

        let ragged = WalkableMesh::indexed(vec![Vec3::ZERO; 3], vec![0, 1]);
        assert_eq!(
            build_polygon_zone(&ragged, 1e-4),
            Err(BuildError::MalformedIndices { len: 2 })
        );

        let out_of_range = WalkableMesh::indexed(vec![Vec3::ZERO; 3], vec![0, 1, 5]);
        assert_eq!(
            build_polygon_zone(&out_of_range, 1e-4),
            Err(BuildError::IndexOutOfRange {
                index: 5,
                vertex_count: 3
            })
        );

        let empty = WalkableMesh::indexed(Vec::new(), Vec::new());
        assert_eq!(build_polygon_zone(&empty, 1e-4), Err(BuildError::EmptyOrDegenerate));
    }

    #[test]
    fn build_is_deterministic() {
        let mesh = quad_mesh(-3.0, -3.0, 3.0, 3.0, 0.5);
        let a = build_polygon_zone(&mesh, 1e-4).unwrap();
        let b = build_polygon_zone(&mesh, 1e-4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn grid_packs_row_major() {
        let matrix = vec![vec![true, false, true], vec![false, true, true]];
        let data = build_walkability_grid(3, 2, &matrix, GridTransform::default()).unwrap();
        match data {
            NavigationData::Grid(grid) => {
                assert_eq!(grid.walkable, vec![true, false, true, false, true, true]);
            }
            NavigationData::Polygon(_) => panic!("expected grid data"),
        }
    }

    #[test]
    fn grid_dimension_mismatch_rejected() {
        let matrix = vec![vec![true, true], vec![true]];
        assert!(matches!(
            build_walkability_grid(2, 2, &matrix, GridTransform::default()),
            Err(BuildError::InvalidDimensions { rows: 2, cols: 2, .. })
        ));
        assert!(matches!(
            build_walkability_grid(0, 0, &[], GridTransform::default()),
            Err(BuildError::InvalidDimensions { .. })
        ));
        let square = vec![vec![true; 2]; 2];
        assert!(matches!(
            build_walkability_grid(2, 3, &square, GridTransform::default()),
            Err(BuildError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn grid_invalid_transform_rejected() {
        let matrix = vec![vec![true; 2]; 2];
        let transform = GridTransform {
            scale: -1.0,
            ..GridTransform::default()
        };
        assert_eq!(
            build_walkability_grid(2, 2, &matrix, transform),
            Err(BuildError::InvalidTransform)
        );
    }
}
