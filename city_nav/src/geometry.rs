// Geometric primitives for navmesh queries.
//
// All 2D predicates work on the XZ ground plane, treating (x, z) as the
// (horizontal, vertical) axes of an ordinary math plane. "Counter-clockwise"
// means positive `cross_xz` area in that plane; the builder normalizes every
// polygon to that winding and the funnel in `zone.rs` relies on it.

use crate::types::Vec3;

/// Twice the signed XZ area of triangle (a, b, c). Positive when `c` lies to
/// the left of the directed line a -> b.
pub fn cross_xz(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (b.x - a.x) * (c.z - a.z) - (b.z - a.z) * (c.x - a.x)
}

/// Twice the signed XZ area of a polygon given by its corner positions.
pub fn polygon_area_xz(corners: &[Vec3]) -> f32 {
    let n = corners.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = corners[i];
        let b = corners[(i + 1) % n];
        sum += a.x * b.z - b.x * a.z;
    }
    sum
}

/// True if `p` lies inside or on the border of the convex CCW polygon, on
/// the XZ plane.
pub fn point_in_convex_xz(p: Vec3, corners: &[Vec3]) -> bool {
    let n = corners.len();
    (0..n).all(|i| cross_xz(corners[i], corners[(i + 1) % n], p) >= -1e-6)
}

/// Closest point to `p` on the triangle (a, b, c), in 3D.
///
/// Region-based method: classify `p` against the triangle's Voronoi regions
/// (vertex, edge, face) and project onto the matching feature.
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Closest point to `p` on a convex polygon, in 3D. The polygon is fanned
/// into triangles from its first corner.
pub fn closest_point_on_polygon(p: Vec3, corners: &[Vec3]) -> Vec3 {
    let mut best = corners[0];
    let mut best_dist = f32::INFINITY;
    for i in 1..corners.len() - 1 {
        let q = closest_point_on_triangle(p, corners[0], corners[i], corners[i + 1]);
        let d = q.distance_squared(p);
        if d < best_dist {
            best_dist = d;
            best = q;
        }
    }
    best
}

/// Mean of the polygon's corners.
pub fn centroid(corners: &[Vec3]) -> Vec3 {
    let sum = corners.iter().fold(Vec3::ZERO, |acc, &c| acc + c);
    sum * (1.0 / corners.len() as f32)
}
