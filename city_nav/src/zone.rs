// Polygon zone runtime: the queryable form of `PolygonZoneData`.
//
// Loading normalizes the serialized groups into one typed structure, built
// once: every polygon knows its group, its CCW vertex ids, its centroid and,
// per edge, the neighbor polygon across that edge (if any). Queries never
// inspect the serialized form again.
//
// Queries:
// - `group_of(point)`: group of the polygon nearest to `point`.
// - `closest_node(point, group, max)`: snap `point` to the nearest point on
//   any polygon of `group`.
// - `find_path(start, end)`: A* over polygons (edge cost = distance between
//   polygon centroids, with the real endpoints standing in for the start and
//   goal polygons), then string pulling through the shared-edge portals of
//   the polygon corridor (simple stupid funnel algorithm).
//
// Search scratch (`g_score`, `came_from`, `closed`) is allocated per query;
// the zone itself is immutable after load and can be queried from any
// number of threads.
//
// See also: `builder.rs` which produces the data, `engine.rs` which wires
// snapping and search together for the worker.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::LoadError;
use crate::geometry::{centroid, closest_point_on_polygon, cross_xz, polygon_area_xz};
use crate::navdata::PolygonZoneData;
use crate::types::{GroupId, PolyId, Vec3, VertexId};

/// Apex and portal points closer than this (squared, XZ) count as equal in
/// the funnel.
const FUNNEL_EQUAL_EPS_SQ: f32 = 1e-6;

#[derive(Clone, Debug)]
struct ZonePoly {
    group: GroupId,
    vertex_ids: SmallVec<[VertexId; 6]>,
    /// `neighbors[i]` is the polygon across edge `(vertex_ids[i], vertex_ids[i + 1])`.
    neighbors: SmallVec<[Option<PolyId>; 6]>,
    centroid: Vec3,
}

/// A loaded polygon navmesh.
#[derive(Clone, Debug)]
pub struct PolygonZone {
    vertices: Vec<Vec3>,
    polys: Vec<ZonePoly>,
    groups: Vec<Vec<PolyId>>,
}

impl PolygonZone {
    /// Validate serialized zone data and build adjacency.
    pub fn load(data: &PolygonZoneData) -> Result<Self, LoadError> {
        if data.vertices.len() % 3 != 0 {
            return Err(LoadError::Malformed(format!(
                "vertex array length {} is not a multiple of 3",
                data.vertices.len()
            )));
        }
        let vertices: Vec<Vec3> = data
            .vertices
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(LoadError::Malformed("non-finite vertex position".into()));
        }

        let mut raw: Vec<(GroupId, SmallVec<[VertexId; 6]>)> = Vec::with_capacity(data.polygon_count());
        let mut groups = Vec::with_capacity(data.groups.len());
        for (g, group) in data.groups.iter().enumerate() {
            let group_id = GroupId(g as u32);
            let mut members = Vec::with_capacity(group.polygons.len());
            for poly in &group.polygons {
                let poly_index = raw.len();
                if poly.vertex_ids.len() < 3 {
                    return Err(LoadError::Malformed(format!(
                        "polygon {poly_index} has {} vertices",
                        poly.vertex_ids.len()
                    )));
                }
                if let Some(&bad) = poly.vertex_ids.iter().find(|&&v| v as usize >= vertices.len()) {
                    return Err(LoadError::Malformed(format!(
                        "polygon {poly_index} references vertex {bad} of {}",
                        vertices.len()
                    )));
                }
                let mut ids: SmallVec<[VertexId; 6]> = poly.vertex_ids.iter().map(|&v| VertexId(v)).collect();
                let corners: SmallVec<[Vec3; 6]> = ids.iter().map(|v| vertices[v.index()]).collect();
                let area = polygon_area_xz(&corners);
                if area == 0.0 {
                    return Err(LoadError::Malformed(format!("polygon {poly_index} has zero area")));
                }
                if area < 0.0 {
                    ids.reverse();
                }
                members.push(PolyId(poly_index as u32));
                raw.push((group_id, ids));
            }
            groups.push(members);
        }

        let centroids: Vec<Vec3> = raw
            .par_iter()
            .map(|(_, ids)| {
                let corners: SmallVec<[Vec3; 6]> = ids.iter().map(|v| vertices[v.index()]).collect();
                centroid(&corners)
            })
            .collect();

        let mut polys: Vec<ZonePoly> = raw
            .into_iter()
            .zip(centroids)
            .map(|((group, vertex_ids), centroid)| ZonePoly {
                group,
                neighbors: SmallVec::from_elem(None, vertex_ids.len()),
                vertex_ids,
                centroid,
            })
            .collect();
        link_neighbors(&mut polys);

        Ok(Self {
            vertices,
            polys,
            groups,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn polygon_count(&self) -> usize {
        self.polys.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn vertex(&self, id: VertexId) -> Vec3 {
        self.vertices[id.index()]
    }

    pub fn group_polygons(&self, group: GroupId) -> &[PolyId] {
        self.groups.get(group.index()).map_or(&[], Vec::as_slice)
    }

    pub fn polygon_group(&self, poly: PolyId) -> GroupId {
        self.polys[poly.index()].group
    }

    pub fn neighbors(&self, poly: PolyId) -> impl Iterator<Item = PolyId> + '_ {
        self.polys[poly.index()].neighbors.iter().flatten().copied()
    }

    /// A point known to lie on the zone, used to validate freshly loaded data.
    pub fn probe_point(&self) -> Option<Vec3> {
        self.vertices.first().copied()
    }

    /// Group of the polygon nearest to `point`.
    pub fn group_of(&self, point: Vec3) -> Option<GroupId> {
        let (poly, _) = self.nearest(point, (0..self.polys.len()).map(|i| PolyId(i as u32)))?;
        Some(self.polys[poly.index()].group)
    }

    /// Snap `point` onto the nearest polygon of `group`. Returns the polygon
    /// and the snapped position, or `None` if the group is empty or the
    /// nearest point is farther than `max_distance`.
    pub fn closest_node(
        &self,
        point: Vec3,
        group: GroupId,
        max_distance: Option<f32>,
    ) -> Option<(PolyId, Vec3)> {
        let (poly, snapped) = self.nearest(point, self.group_polygons(group).iter().copied())?;
        match max_distance {
            Some(max) if snapped.distance_squared(point) > max * max => None,
            _ => Some((poly, snapped)),
        }
    }

    fn nearest(&self, point: Vec3, candidates: impl Iterator<Item = PolyId>) -> Option<(PolyId, Vec3)> {
        let mut best: Option<(PolyId, Vec3, f32)> = None;
        for poly in candidates {
            let q = closest_point_on_polygon(point, &self.corners(poly));
            let d = q.distance_squared(point);
            if best.is_none_or(|(_, _, best_d)| d < best_d) {
                best = Some((poly, q, d));
            }
        }
        best.map(|(poly, q, _)| (poly, q))
    }

    fn corners(&self, poly: PolyId) -> SmallVec<[Vec3; 6]> {
        self.polys[poly.index()]
            .vertex_ids
            .iter()
            .map(|v| self.vertices[v.index()])
            .collect()
    }

    /// Find a path between two snapped positions (polygon, point). Returns
    /// straightened waypoints from `start` to `end`, or `None` if the
    /// polygons are not connected.
    pub fn find_path(&self, start: (PolyId, Vec3), end: (PolyId, Vec3)) -> Option<Vec<Vec3>> {
        let (start_poly, start_pt) = start;
        let (end_poly, end_pt) = end;
        if start_poly == end_poly {
            return Some(vec![start_pt, end_pt]);
        }
        let corridor = self.corridor(start_poly, start_pt, end_poly, end_pt)?;
        let portals: Vec<(Vec3, Vec3)> = corridor
            .windows(2)
            .map(|w| self.portal(w[0], w[1]))
            .collect::<Option<_>>()?;
        Some(string_pull(start_pt, end_pt, &portals))
    }

    /// Left and right endpoints of the edge shared by `from` and `to`, as
    /// seen walking from `from` into `to`.
    fn portal(&self, from: PolyId, to: PolyId) -> Option<(Vec3, Vec3)> {
        let poly = &self.polys[from.index()];
        let n = poly.vertex_ids.len();
        let edge = poly.neighbors.iter().position(|&nb| nb == Some(to))?;
        let right = self.vertices[poly.vertex_ids[edge].index()];
        let left = self.vertices[poly.vertex_ids[(edge + 1) % n].index()];
        Some((left, right))
    }

    /// A* over polygon adjacency. Returns the polygon sequence from
    /// `start` to `goal` inclusive.
    fn corridor(&self, start: PolyId, start_pt: Vec3, goal: PolyId, goal_pt: Vec3) -> Option<Vec<PolyId>> {
        let n = self.polys.len();
        let pos = |p: PolyId| {
            if p == start {
                start_pt
            } else if p == goal {
                goal_pt
            } else {
                self.polys[p.index()].centroid
            }
        };

        let mut g_score = vec![f32::INFINITY; n];
        let mut came_from: Vec<Option<PolyId>> = vec![None; n];
        let mut closed = vec![false; n];
        g_score[start.index()] = 0.0;

        let mut open = BinaryHeap::new();
        open.push(OpenEntry {
            poly: start,
            f_score: start_pt.distance(goal_pt),
        });

        while let Some(current) = open.pop() {
            let ci = current.poly.index();
            if current.poly == goal {
                let mut corridor = vec![goal];
                let mut at = goal;
                while let Some(prev) = came_from[at.index()] {
                    corridor.push(prev);
                    at = prev;
                }
                corridor.reverse();
                return Some(corridor);
            }
            if closed[ci] {
                continue;
            }
            closed[ci] = true;

            let here = pos(current.poly);
            for neighbor in self.neighbors(current.poly) {
                let ni = neighbor.index();
                if closed[ni] {
                    continue;
                }
                let there = pos(neighbor);
                let tentative_g = g_score[ci] + here.distance(there);
                if tentative_g < g_score[ni] {
                    g_score[ni] = tentative_g;
                    came_from[ni] = Some(current.poly);
                    open.push(OpenEntry {
                        poly: neighbor,
                        f_score: tentative_g + there.distance(goal_pt),
                    });
                }
            }
        }
        None
    }

    /// Every distinct polygon edge as a segment, for debug drawing.
    pub fn wireframe(&self) -> Vec<(Vec3, Vec3)> {
        let mut segments = Vec::new();
        for (i, poly) in self.polys.iter().enumerate() {
            let n = poly.vertex_ids.len();
            for e in 0..n {
                // Shared edges are emitted once, by the lower-indexed side.
                if poly.neighbors[e].is_some_and(|nb| nb.index() < i) {
                    continue;
                }
                segments.push((
                    self.vertices[poly.vertex_ids[e].index()],
                    self.vertices[poly.vertex_ids[(e + 1) % n].index()],
                ));
            }
        }
        segments
    }
}

/// Link polygons of the same group that share an edge. Edges used by more
/// than two polygons are left unlinked.
fn link_neighbors(polys: &mut [ZonePoly]) {
    let mut edges: FxHashMap<(VertexId, VertexId), SmallVec<[(usize, usize); 2]>> = FxHashMap::default();
    for (p, poly) in polys.iter().enumerate() {
        let n = poly.vertex_ids.len();
        for e in 0..n {
            let (a, b) = (poly.vertex_ids[e], poly.vertex_ids[(e + 1) % n]);
            edges
                .entry((a.min(b), a.max(b)))
                .or_default()
                .push((p, e));
        }
    }
    for sharers in edges.values() {
        if let [(pa, ea), (pb, eb)] = sharers.as_slice() {
            let (pa, pb) = (*pa, *pb);
            if polys[pa].group != polys[pb].group {
                continue;
            }
            polys[pa].neighbors[*ea] = Some(PolyId(pb as u32));
            polys[pb].neighbors[*eb] = Some(PolyId(pa as u32));
        }
    }
}

/// Straighten a path through a corridor of portals (simple stupid funnel).
/// Each portal is `(left, right)` as seen walking forward.
fn string_pull(start: Vec3, end: Vec3, portals: &[(Vec3, Vec3)]) -> Vec<Vec3> {
    let mut all = Vec::with_capacity(portals.len() + 2);
    all.push((start, start));
    all.extend_from_slice(portals);
    all.push((end, end));

    let same = |a: Vec3, b: Vec3| a.distance_squared_xz(b) < FUNNEL_EQUAL_EPS_SQ;
    let push = |path: &mut Vec<Vec3>, p: Vec3| {
        if path.last().is_none_or(|&last| last != p) {
            path.push(p);
        }
    };

    let mut path = vec![start];
    let (mut apex, mut left, mut right) = (start, start, start);
    let (mut left_i, mut right_i) = (0usize, 0usize);
    let mut i = 1;
    while i < all.len() {
        let (l, r) = all[i];

        // Tighten the right side, or restart from the left corner if the
        // right side crossed over it.
        if cross_xz(apex, right, r) >= 0.0 {
            if same(apex, right) || cross_xz(apex, left, r) < 0.0 {
                right = r;
                right_i = i;
            } else {
                push(&mut path, left);
                apex = left;
                right = apex;
                right_i = left_i;
                i = left_i + 1;
                continue;
            }
        }

        if cross_xz(apex, left, l) <= 0.0 {
            if same(apex, left) || cross_xz(apex, right, l) > 0.0 {
                left = l;
                left_i = i;
            } else {
                push(&mut path, right);
                apex = right;
                left = apex;
                left_i = right_i;
                i = right_i + 1;
                continue;
            }
        }

        i += 1;
    }

    push(&mut path, end);
    path
}

/// Entry in the A* open set (min-heap via reversed ordering).
struct OpenEntry {
    poly: PolyId,
    f_score: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.poly == other.poly
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.poly.cmp(&self.poly))
    }
}
