//! Planar geometry primitives shared by the binding and routing code.
//!
//! Points are plain `(x, y)` tuples in scene coordinates unless a function
//! documents otherwise; conversion between an arrow's local frame and the
//! global frame always happens through an explicit origin argument.

/// A 2D point or vector. Frame (local vs global) is tracked by the caller.
pub type Point = (f64, f64);

/// Axis-aligned bounds as `[min_x, min_y, max_x, max_y]`, global frame.
pub type Bounds = [f64; 4];

pub fn point_distance_sq(a: Point, b: Point) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    dx * dx + dy * dy
}

pub fn point_distance(a: Point, b: Point) -> f64 {
    point_distance_sq(a, b).sqrt()
}

/// Manhattan distance, the natural metric on an orthogonal grid.
pub fn manhattan_dist(a: Point, b: Point) -> f64 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}

pub fn points_equal(a: Point, b: Point) -> bool {
    (a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6
}

/// Rotate `p` around `center` by `angle` radians.
pub fn rotate_point(p: Point, center: Point, angle: f64) -> Point {
    if angle == 0.0 {
        return p;
    }
    let (sin, cos) = angle.sin_cos();
    let dx = p.0 - center.0;
    let dy = p.1 - center.1;
    (
        center.0 + dx * cos - dy * sin,
        center.1 + dx * sin + dy * cos,
    )
}

/// Scale `p` away from (or toward) `origin` by `multiplier`.
pub fn scale_point_from_origin(p: Point, origin: Point, multiplier: f64) -> Point {
    (
        origin.0 + (p.0 - origin.0) * multiplier,
        origin.1 + (p.1 - origin.1) * multiplier,
    )
}

/// z-component of the cross product of two vectors.
pub fn vector_cross(a: Point, b: Point) -> f64 {
    a.0 * b.1 - a.1 * b.0
}

pub fn vector_from_points(to: Point, from: Point) -> Point {
    (to.0 - from.0, to.1 - from.1)
}

/// Sign-based membership test; points on an edge count as inside.
pub fn triangle_includes_point(triangle: [Point; 3], p: Point) -> bool {
    let [a, b, c] = triangle;
    let d1 = vector_cross(vector_from_points(p, a), vector_from_points(b, a));
    let d2 = vector_cross(vector_from_points(p, b), vector_from_points(c, b));
    let d3 = vector_cross(vector_from_points(p, c), vector_from_points(a, c));
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

pub fn bounds_center(bounds: Bounds) -> Point {
    (
        bounds[0] + (bounds[2] - bounds[0]) / 2.0,
        bounds[1] + (bounds[3] - bounds[1]) / 2.0,
    )
}

/// Strict interior test; boundary points are outside.
pub fn point_inside_bounds(p: Point, bounds: Bounds) -> bool {
    p.0 > bounds[0] && p.0 < bounds[2] && p.1 > bounds[1] && p.1 < bounds[3]
}

pub fn common_bounds(aabbs: &[Bounds]) -> Bounds {
    let mut common = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
    for aabb in aabbs {
        common[0] = common[0].min(aabb[0]);
        common[1] = common[1].min(aabb[1]);
        common[2] = common[2].max(aabb[2]);
        common[3] = common[3].max(aabb[3]);
    }
    common
}

pub fn offset_bounds(bounds: Bounds, offset: [f64; 4]) -> Bounds {
    let [up, right, down, left] = offset;
    [
        bounds[0] - left,
        bounds[1] - up,
        bounds[2] + right,
        bounds[3] + down,
    ]
}

/// Intersection of an infinite line through `a` and `b` with the segment
/// `(s1, s2)`, if the segment straddles the line.
pub fn line_segment_intersection(a: Point, b: Point, s1: Point, s2: Point) -> Option<Point> {
    let dir = vector_from_points(b, a);
    let d1 = vector_cross(dir, vector_from_points(s1, a));
    let d2 = vector_cross(dir, vector_from_points(s2, a));
    if d1 * d2 >= 0.0 {
        return None;
    }
    let seg = vector_from_points(s2, s1);
    let denom = vector_cross(dir, seg);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = vector_cross(vector_from_points(s1, a), seg) / denom;
    Some((a.0 + dir.0 * t, a.1 + dir.1 * t))
}

/// Intersections of an infinite line through `a` and `b` with the circle
/// centered at `center` with `radius`.
pub fn line_circle_intersections(a: Point, b: Point, center: Point, radius: f64) -> Vec<Point> {
    if radius <= 0.0 {
        return Vec::new();
    }
    let d = vector_from_points(b, a);
    let f = vector_from_points(a, center);
    let qa = d.0 * d.0 + d.1 * d.1;
    if qa < 1e-12 {
        return Vec::new();
    }
    let qb = 2.0 * (f.0 * d.0 + f.1 * d.1);
    let qc = f.0 * f.0 + f.1 * f.1 - radius * radius;
    let disc = qb * qb - 4.0 * qa * qc;
    if disc <= 0.0 {
        return Vec::new();
    }
    let root = disc.sqrt();
    let t1 = (-qb - root) / (2.0 * qa);
    let t2 = (-qb + root) / (2.0 * qa);
    vec![
        (a.0 + d.0 * t1, a.1 + d.1 * t1),
        (a.0 + d.0 * t2, a.1 + d.1 * t2),
    ]
}

/// Intersections of an infinite line through `a` and `b` with an ellipse
/// centered at the origin with semi-axes `rx`, `ry`.
pub fn line_ellipse_intersections(a: Point, b: Point, rx: f64, ry: f64) -> Vec<Point> {
    if rx <= 0.0 || ry <= 0.0 {
        return Vec::new();
    }
    let d = vector_from_points(b, a);
    let qa = (d.0 * d.0) / (rx * rx) + (d.1 * d.1) / (ry * ry);
    if qa < 1e-12 {
        return Vec::new();
    }
    let qb = 2.0 * ((a.0 * d.0) / (rx * rx) + (a.1 * d.1) / (ry * ry));
    let qc = (a.0 * a.0) / (rx * rx) + (a.1 * a.1) / (ry * ry) - 1.0;
    let disc = qb * qb - 4.0 * qa * qc;
    if disc <= 0.0 {
        return Vec::new();
    }
    let root = disc.sqrt();
    let t1 = (-qb - root) / (2.0 * qa);
    let t2 = (-qb + root) / (2.0 * qa);
    vec![
        (a.0 + d.0 * t1, a.1 + d.1 * t1),
        (a.0 + d.0 * t2, a.1 + d.1 * t2),
    ]
}

/// Width/height of a local point run, measured from the coordinate minima.
pub fn size_from_points(points: &[Point]) -> (f64, f64) {
    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;
    for p in points {
        min_x = min_x.min(p.0);
        min_y = min_y.min(p.1);
        max_x = max_x.max(p.0);
        max_y = max_y.max(p.1);
    }
    if points.is_empty() {
        (0.0, 0.0)
    } else {
        (max_x - min_x, max_y - min_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_preserves_distance() {
        let center = (3.0, 4.0);
        let p = (10.0, -2.0);
        let rotated = rotate_point(p, center, 1.234);
        assert!((point_distance(center, p) - point_distance(center, rotated)).abs() < 1e-9);
    }

    #[test]
    fn triangle_membership() {
        let tri = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)];
        assert!(triangle_includes_point(tri, (2.0, 2.0)));
        assert!(triangle_includes_point(tri, (5.0, 0.0)));
        assert!(!triangle_includes_point(tri, (8.0, 8.0)));
    }

    #[test]
    fn line_hits_circle_twice() {
        let hits = line_circle_intersections((-10.0, 0.0), (10.0, 0.0), (0.0, 0.0), 5.0);
        assert_eq!(hits.len(), 2);
        assert!((hits[0].0 + 5.0).abs() < 1e-9);
        assert!((hits[1].0 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn common_bounds_covers_all() {
        let c = common_bounds(&[[0.0, 0.0, 10.0, 10.0], [-5.0, 2.0, 3.0, 20.0]]);
        assert_eq!(c, [-5.0, 0.0, 10.0, 20.0]);
    }
}
