//! Arrow endpoint ↔ shape binding.
//!
//! Simple arrows bind through a `focus`/`gap` pair: the focus is a signed
//! ratio on the shape's "focus image" (the scaled-down similar shape all
//! focus points lie on) and the gap is the stand-off distance from the
//! border. Elbow arrows bind through a fixed outline ratio instead, so the
//! endpoint tracks the outline through move/resize/rotate.

use crate::config::{BindingConfig, RoutingConfig};
use crate::geometry::{
    Bounds, Point, line_ellipse_intersections, line_segment_intersection,
    line_circle_intersections, point_distance, point_distance_sq, point_inside_bounds,
    points_equal, rotate_point, vector_from_points,
};
use crate::heading::{Heading, heading_for_point_from_element};
use crate::scene::{
    ArrowElement, ArrowUpdate, Binding, BoundElementRef, Element, Scene, ShapeElement, ShapeKind,
};

/// Which end of an arrow a binding operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    End,
}

impl Edge {
    pub(crate) fn point_index(self, points_len: usize) -> usize {
        match self {
            Edge::Start => 0,
            Edge::End => points_len - 1,
        }
    }

    pub(crate) fn adjacent_index(self, points_len: usize) -> usize {
        match self {
            Edge::Start => 1,
            Edge::End => points_len - 2,
        }
    }
}

/// Hover margin for binding, adaptive to shape size and zoom.
///
/// Diamonds get a `1/√2` ratio so they feel as grabby as rectangles of the
/// same box.
pub fn max_binding_gap(
    shape: &ShapeElement,
    width: f64,
    height: f64,
    zoom: f64,
    config: &BindingConfig,
) -> f64 {
    let zoom_value = if zoom > 0.0 && zoom < 1.0 { zoom } else { 1.0 };
    let shape_ratio = if shape.kind == ShapeKind::Diamond {
        std::f64::consts::FRAC_1_SQRT_2
    } else {
        1.0
    };
    let smaller_dimension = shape_ratio * width.min(height);

    (0.25 * smaller_dimension)
        .min(32.0)
        .max(16.0)
        .max(config.highlight_thickness / zoom_value + config.highlight_offset)
}

/// Signed distance from `p` to the shape border: negative inside, positive
/// outside. Rotation is handled by moving `p` into the element frame.
pub fn distance_to_shape(shape: &ShapeElement, p: Point) -> f64 {
    let center = shape.center();
    let rotated = rotate_point(p, center, -shape.angle);
    let px = (rotated.0 - center.0).abs();
    let py = (rotated.1 - center.1).abs();
    let hw = shape.width / 2.0;
    let hh = shape.height / 2.0;

    match shape.kind {
        ShapeKind::Rectangle => (px - hw).max(py - hh),
        ShapeKind::Diamond => {
            let norm = hh.hypot(hw);
            if norm == 0.0 {
                return 0.0;
            }
            (hh * px + hw * py - hh * hw) / norm
        }
        ShapeKind::Ellipse => {
            if hw <= 0.0 || hh <= 0.0 {
                return 0.0;
            }
            let closest = closest_point_on_ellipse(px, py, hw, hh);
            let inside = (px / hw) * (px / hw) + (py / hh) * (py / hh) < 1.0;
            let dist = point_distance((px, py), closest);
            if inside { -dist } else { dist }
        }
    }
}

/// Numerical closest-point search on an origin-centered ellipse, positive
/// quadrant. Four iterations are enough for hit-testing accuracy.
fn closest_point_on_ellipse(px: f64, py: f64, a: f64, b: f64) -> Point {
    let mut tx = std::f64::consts::FRAC_1_SQRT_2;
    let mut ty = std::f64::consts::FRAC_1_SQRT_2;
    for _ in 0..4 {
        let x = a * tx;
        let y = b * ty;
        let ex = (a * a - b * b) * tx.powi(3) / a;
        let ey = (b * b - a * a) * ty.powi(3) / b;
        let rx = x - ex;
        let ry = y - ey;
        let qx = px - ex;
        let qy = py - ey;
        let r = ry.hypot(rx);
        let q = qy.hypot(qx);
        tx = (((qx * r) / q + ex) / a).clamp(0.0, 1.0);
        ty = (((qy * r) / q + ey) / b).clamp(0.0, 1.0);
        let t = ty.hypot(tx);
        tx /= t;
        ty /= t;
    }
    (a * tx, b * ty)
}

/// Whether `p` is close enough to the shape border to bind, with an optional
/// whole-interior test for elbow arrows.
pub fn binding_border_test(
    shape: &ShapeElement,
    p: Point,
    zoom: f64,
    full_shape: bool,
    config: &BindingConfig,
) -> bool {
    let threshold = max_binding_gap(shape, shape.width, shape.height, zoom, config);
    distance_to_shape(shape, p).abs() <= threshold
        || (full_shape && point_inside_bounds(p, shape.aabb(None)))
}

/// Topmost bindable shape under `p`, if any.
///
/// With `consider_all` the full z-stack is inspected: a sole hit wins
/// outright, otherwise hits passing the exact border test are preferred,
/// otherwise the smallest shape.
pub fn hovered_element_for_binding<'a>(
    p: Point,
    scene: &'a Scene,
    zoom: f64,
    full_shape: bool,
    consider_all: bool,
    config: &BindingConfig,
) -> Option<&'a ShapeElement> {
    if consider_all {
        let mut hits: Vec<&ShapeElement> = Vec::new();
        for element in scene.elements() {
            if let Element::Shape(shape) = element
                && binding_border_test(shape, p, zoom, full_shape, config)
            {
                hits.push(shape);
            }
        }
        if hits.is_empty() {
            return None;
        }
        if hits.len() == 1 {
            return Some(hits[0]);
        }
        let border_hits: Vec<&ShapeElement> = hits
            .iter()
            .copied()
            .filter(|shape| binding_border_test(shape, p, zoom, false, config))
            .collect();
        if border_hits.len() == 1 {
            return Some(border_hits[0]);
        }
        return hits.into_iter().min_by(|a, b| {
            let area_a = a.width * a.width + a.height * a.height;
            let area_b = b.width * b.width + b.height * b.height;
            area_a.total_cmp(&area_b)
        });
    }

    // Hit-test from the top of the z-stack down.
    let mut hovered = None;
    for element in scene.elements() {
        if let Element::Shape(shape) = element
            && binding_border_test(shape, p, zoom, full_shape, config)
        {
            hovered = Some(shape);
        }
    }
    hovered
}

/// Normalized homogeneous line `(c, n, m)` through `p` and `q` for
/// `n·x + m·y + c = 0`; `c` is the signed distance from the origin.
fn line_through(p: Point, q: Point) -> (f64, f64, f64) {
    let n = p.1 - q.1;
    let m = q.0 - p.0;
    let c = p.0 * q.1 - q.0 * p.1;
    let norm = n.hypot(m);
    if norm < 1e-12 {
        return (0.0, 0.0, 0.0);
    }
    (c / norm, n / norm, m / norm)
}

/// Move a global point into the element-center frame (rotation removed).
fn to_element_frame(shape: &ShapeElement, p: Point) -> Point {
    let center = shape.center();
    let rotated = rotate_point(p, center, -shape.angle);
    (rotated.0 - center.0, rotated.1 - center.1)
}

fn from_element_frame(shape: &ShapeElement, p: Point) -> Point {
    let center = shape.center();
    rotate_point((p.0 + center.0, p.1 + center.1), center, shape.angle)
}

/// Signed focus ratio in `[-1, 1]` for the line through `a` (farther from
/// the shape) and `b` (closer). Degenerate geometry yields `0`.
pub fn determine_focus_distance(shape: &ShapeElement, a: Point, b: Point) -> f64 {
    if shape.width <= 0.0 || shape.height <= 0.0 || points_equal(a, b) {
        return 0.0;
    }
    let a_rel = to_element_frame(shape, a);
    let b_rel = to_element_frame(shape, b);
    let (c, n, m) = line_through(a_rel, b_rel);
    let q = shape.height / shape.width;
    let hw = shape.width / 2.0;
    let hh = shape.height / 2.0;
    let n_abs = n.abs();
    let m_abs = m.abs();

    let ret = match shape.kind {
        ShapeKind::Rectangle => c / (hw * (n_abs + q * m_abs)),
        ShapeKind::Diamond => {
            if m_abs < n_abs {
                c / (n_abs * hw)
            } else {
                c / (m_abs * hh)
            }
        }
        ShapeKind::Ellipse => c / (hw * (n * n + q * q * m * m).sqrt()),
    };
    if ret.is_finite() { ret } else { 0.0 }
}

/// Corner/vertex candidates of the focus image at scale `s`, element frame.
fn focus_image_corners(shape: &ShapeElement, s: f64) -> [Point; 4] {
    let hx = s * shape.width / 2.0;
    let hy = s * shape.height / 2.0;
    match shape.kind {
        ShapeKind::Diamond => [(0.0, hy), (hx, 0.0), (0.0, -hy), (-hx, 0.0)],
        _ => [(hx, hy), (hx, -hy), (-hx, -hy), (-hx, hy)],
    }
}

/// Inverse of [`determine_focus_distance`]: the global focus point for a
/// binding's focus ratio, selected from the scaled corner candidates by the
/// orientation of the line through the adjacent point.
pub fn determine_focus_point(shape: &ShapeElement, focus: f64, adjacent: Point) -> Point {
    if focus == 0.0 {
        return shape.center();
    }
    let adjacent_rel = to_element_frame(shape, adjacent);
    let orientation = focus.signum();

    let point = match shape.kind {
        ShapeKind::Ellipse => focus_point_for_ellipse(shape, focus, adjacent_rel),
        _ => {
            let corners = focus_image_corners(shape, focus.abs());
            let mut max_distance = 0.0;
            let mut tangent_point = corners[0];
            for corner in corners {
                let (c, _, _) = line_through(adjacent_rel, corner);
                let distance = orientation * c;
                if distance > max_distance {
                    max_distance = distance;
                    tangent_point = corner;
                }
            }
            tangent_point
        }
    };
    from_element_frame(shape, point)
}

/// Tangent point of the focus-image ellipse through `point` (element frame).
fn focus_point_for_ellipse(shape: &ShapeElement, relative_distance: f64, point: Point) -> Point {
    let a = shape.width * relative_distance.abs() / 2.0;
    let b = shape.height * relative_distance.abs() / 2.0;
    let orientation = relative_distance.signum();
    let px = point.0;
    let py = if point.1 == 0.0 { 0.0001 } else { point.1 };

    let squares = px * px * b * b + py * py * a * a;
    // Tangent m·x + n·y + 1 = 0.
    let m = (-px * b * b
        + orientation * py * (squares - a * a * b * b).max(0.0).sqrt())
        / squares;
    let mut n = (-m * px - 1.0) / py;
    if n == 0.0 {
        n = if n.is_sign_negative() { -0.01 } else { 0.01 };
    }
    let x = -(a * a * m) / (n * n * b * b + m * m * a * a);
    (x, (-m * x - 1.0) / n)
}

/// Intersections between the infinite line through `a` and `b` and the
/// shape border inflated by `gap`, sorted by distance from `a`. Returns two
/// points or none; grazing a single corner counts as a miss.
pub fn intersect_element_with_line(
    shape: &ShapeElement,
    a: Point,
    b: Point,
    gap: f64,
) -> Vec<Point> {
    let a_rel = to_element_frame(shape, a);
    let b_rel = to_element_frame(shape, b);

    let mut intersections: Vec<Point> = match shape.kind {
        ShapeKind::Ellipse => line_ellipse_intersections(
            a_rel,
            b_rel,
            shape.width / 2.0 + gap,
            shape.height / 2.0 + gap,
        ),
        _ => {
            let corners = focus_image_corners(shape, 1.0);
            let mut hits = Vec::new();
            for i in 0..4 {
                let s1 = corners[i];
                let s2 = corners[(i + 1) % 4];
                let (o1, o2) = offset_segment_outward(s1, s2, gap);
                if let Some(hit) = line_segment_intersection(a_rel, b_rel, o1, o2) {
                    hits.push(hit);
                }
            }
            for corner in corners {
                hits.extend(line_circle_intersections(a_rel, b_rel, corner, gap));
            }
            hits
        }
    };

    if intersections.len() < 2 {
        return Vec::new();
    }
    intersections
        .sort_by(|p1, p2| point_distance_sq(*p1, a_rel).total_cmp(&point_distance_sq(*p2, a_rel)));
    let first = intersections[0];
    let last = intersections[intersections.len() - 1];
    vec![
        from_element_frame(shape, first),
        from_element_frame(shape, last),
    ]
}

/// Shift a border segment outward (away from the element center at the
/// origin) by `distance`.
fn offset_segment_outward(s1: Point, s2: Point, distance: f64) -> (Point, Point) {
    let dir = vector_from_points(s2, s1);
    let len = dir.0.hypot(dir.1);
    if len < 1e-12 || distance == 0.0 {
        return (s1, s2);
    }
    let mut normal = (dir.1 / len, -dir.0 / len);
    let mid = ((s1.0 + s2.0) / 2.0, (s1.1 + s2.1) / 2.0);
    if normal.0 * mid.0 + normal.1 * mid.1 < 0.0 {
        normal = (-normal.0, -normal.1);
    }
    (
        (s1.0 + normal.0 * distance, s1.1 + normal.1 * distance),
        (s2.0 + normal.0 * distance, s2.1 + normal.1 * distance),
    )
}

/// Focus and gap for binding one arrow end to `shape`.
pub fn calculate_focus_and_gap(arrow: &ArrowElement, shape: &ShapeElement, edge: Edge) -> (f64, f64) {
    let len = arrow.points.len();
    if len < 2 {
        return (0.0, 1.0);
    }
    let edge_point = arrow.point_at_index_global(edge.point_index(len));
    let adjacent_point = arrow.point_at_index_global(edge.adjacent_index(len));
    let focus = determine_focus_distance(shape, adjacent_point, edge_point);
    let gap = distance_to_shape(shape, edge_point).max(1.0);
    (focus, gap)
}

/// Nudge fixed-point ratio components off the exact midline so heading
/// classification stays stable under floating-point noise.
pub fn normalize_fixed_point(fixed_point: [f64; 2]) -> [f64; 2] {
    let mut normalized = fixed_point;
    for ratio in &mut normalized {
        if (*ratio - 0.5).abs() < 0.0001 {
            *ratio = 0.5001;
        }
    }
    normalized
}

/// Global point for a fixed outline ratio, honoring shape rotation.
pub fn global_fixed_point_of(fixed_point: [f64; 2], shape: &ShapeElement) -> Point {
    let [fx, fy] = normalize_fixed_point(fixed_point);
    rotate_point(
        (shape.x + shape.width * fx, shape.y + shape.height * fy),
        shape.center(),
        shape.angle,
    )
}

/// Snap a global point onto the shape outline at the fixed binding
/// distance, along the row or column the point already occupies.
pub fn bind_point_to_snap_to_element_outline(
    p: Point,
    other_point: Point,
    shape: &ShapeElement,
    config: &BindingConfig,
) -> Point {
    let p = if shape.kind == ShapeKind::Rectangle {
        avoid_rectangular_corner(shape, p, config)
    } else {
        p
    };
    let aabb = shape.aabb(None);
    let heading = heading_for_point_from_element(shape, aabb, p);
    let gap = config.fixed_binding_distance;

    let mut intersections = Vec::new();
    intersections.extend(intersect_element_with_line(
        shape,
        (p.0, p.1 - 2.0 * shape.height),
        (p.0, p.1 + 2.0 * shape.height),
        gap,
    ));
    intersections.extend(intersect_element_with_line(
        shape,
        (p.0 - 2.0 * shape.width, p.1),
        (p.0 + 2.0 * shape.width, p.1),
        gap,
    ));

    let heading_is_horizontal = heading.is_horizontal();
    let dist = distance_to_shape(shape, p);
    let is_inner = if heading_is_horizontal {
        dist < shape.width * -0.1
    } else {
        dist < shape.height * -0.1
    };

    if is_inner {
        return heading_to_mid_bind_point(other_point, shape, aabb);
    }

    intersections.sort_by(|i1, i2| {
        point_distance_sq(*i1, p).total_cmp(&point_distance_sq(*i2, p))
    });
    // Keep the intersection on the row (or column) the point sits on.
    intersections
        .into_iter()
        .find(|i| {
            if heading_is_horizontal {
                (p.1 - i.1).abs() < 0.1
            } else {
                (p.0 - i.0).abs() < 0.1
            }
        })
        .unwrap_or(p)
}

/// Midpoint of the shape side facing `p`, used when the endpoint sits deep
/// inside the shape.
fn heading_to_mid_bind_point(p: Point, shape: &ShapeElement, aabb: Bounds) -> Point {
    let center = crate::geometry::bounds_center(aabb);
    let heading = Heading::from_vector(vector_from_points(p, center));
    let raw = match heading {
        Heading::Up => ((aabb[0] + aabb[2]) / 2.0 + 0.1, aabb[1]),
        Heading::Right => (aabb[2], (aabb[1] + aabb[3]) / 2.0 + 0.1),
        Heading::Down => ((aabb[0] + aabb[2]) / 2.0 - 0.1, aabb[3]),
        Heading::Left => (aabb[0], (aabb[1] + aabb[3]) / 2.0 - 0.1),
    };
    rotate_point(raw, center, shape.angle)
}

/// Snap toward side midpoints when the pointer is within the tolerance band
/// around a shape's center lines.
pub fn snap_to_mid(shape: &ShapeElement, p: Point, config: &BindingConfig) -> Point {
    let ShapeElement {
        x,
        y,
        width,
        height,
        angle,
        ..
    } = *shape;
    let center = (x + width / 2.0 - 0.1, y + height / 2.0 - 0.1);
    let non_rotated = rotate_point(p, center, -angle);
    let tolerance = config.mid_snap_tolerance;
    let vertical_threshold = (tolerance * height).clamp(5.0, 80.0);
    let horizontal_threshold = (tolerance * width).clamp(5.0, 80.0);
    let gap = config.fixed_binding_distance;

    if non_rotated.0 <= x + width / 2.0
        && non_rotated.1 > center.1 - vertical_threshold
        && non_rotated.1 < center.1 + vertical_threshold
    {
        return rotate_point((x - gap, center.1), center, angle);
    } else if non_rotated.1 <= y + height / 2.0
        && non_rotated.0 > center.0 - horizontal_threshold
        && non_rotated.0 < center.0 + horizontal_threshold
    {
        return rotate_point((center.0, y - gap), center, angle);
    } else if non_rotated.0 >= x + width / 2.0
        && non_rotated.1 > center.1 - vertical_threshold
        && non_rotated.1 < center.1 + vertical_threshold
    {
        return rotate_point((x + width + gap, center.1), center, angle);
    } else if non_rotated.1 >= y + height / 2.0
        && non_rotated.0 > center.0 - horizontal_threshold
        && non_rotated.0 < center.0 + horizontal_threshold
    {
        return rotate_point((center.0, y + height + gap), center, angle);
    }

    p
}

/// Push a point sitting on a rectanguloid corner off the corner so outline
/// snapping has a defined row/column to work with.
pub fn avoid_rectangular_corner(shape: &ShapeElement, p: Point, config: &BindingConfig) -> Point {
    let center = shape.center();
    let non_rotated = rotate_point(p, center, -shape.angle);
    let gap = config.fixed_binding_distance;
    let ShapeElement {
        x,
        y,
        width,
        height,
        angle,
        ..
    } = *shape;

    if non_rotated.0 < x && non_rotated.1 < y {
        // Top left
        if non_rotated.1 - y > -gap {
            return rotate_point((x - gap, y), center, angle);
        }
        return rotate_point((x, y - gap), center, angle);
    } else if non_rotated.0 < x && non_rotated.1 > y + height {
        // Bottom left
        if non_rotated.0 - x > -gap {
            return rotate_point((x, y + height + gap), center, angle);
        }
        return rotate_point((x - gap, y + height), center, angle);
    } else if non_rotated.0 > x + width && non_rotated.1 > y + height {
        // Bottom right
        if non_rotated.0 - x < width + gap {
            return rotate_point((x + width, y + height + gap), center, angle);
        }
        return rotate_point((x + width + gap, y + height), center, angle);
    } else if non_rotated.0 > x + width && non_rotated.1 < y {
        // Top right
        if non_rotated.0 - x < width + gap {
            return rotate_point((x + width, y - gap), center, angle);
        }
        return rotate_point((x + width + gap, y), center, angle);
    }

    p
}

/// Element-relative outline ratio for an elbow arrow endpoint.
pub fn calculate_fixed_point_for_elbow_arrow_binding(
    arrow: &ArrowElement,
    shape: &ShapeElement,
    edge: Edge,
    config: &BindingConfig,
) -> [f64; 2] {
    let len = arrow.points.len();
    let global_point = arrow.point_at_index_global(edge.point_index(len));
    let snapped = bind_point_to_snap_to_element_outline(global_point, global_point, shape, config);
    let mid = shape.center();
    let non_rotated = rotate_point(snapped, mid, -shape.angle);
    normalize_fixed_point([
        (non_rotated.0 - shape.x) / shape.width,
        (non_rotated.1 - shape.y) / shape.height,
    ])
}

/// Binding distance of `p` to `shape`, or `None` when out of range.
fn distance_for_binding(
    p: Point,
    shape: &ShapeElement,
    zoom: f64,
    config: &BindingConfig,
) -> Option<f64> {
    let distance = distance_to_shape(shape, p);
    let bind_distance = max_binding_gap(shape, shape.width, shape.height, zoom, config);
    (distance <= bind_distance).then_some(distance)
}

/// Heading an elbow endpoint should leave with when snapped near `shape`.
///
/// Out of binding range the heading falls back to the raw endpoint-to-
/// endpoint vector; without any shape it degenerates the same way.
pub fn get_heading_for_elbow_arrow_snap(
    p: Point,
    other_point: Point,
    shape: Option<&ShapeElement>,
    aabb: Option<Bounds>,
    orig_point: Point,
    zoom: f64,
    config: &BindingConfig,
) -> Heading {
    let other_point_heading = Heading::from_vector(vector_from_points(other_point, p));

    let (Some(shape), Some(aabb)) = (shape, aabb) else {
        return other_point_heading;
    };

    if distance_for_binding(orig_point, shape, zoom, config).is_none() {
        return Heading::from_vector(vector_from_points(p, shape.center()));
    }

    heading_for_point_from_element(shape, aabb, p)
}

/// Clamp an oversized gap down to the visible highlight band.
fn normalize_point_binding(focus: f64, gap: f64, shape: &ShapeElement, config: &BindingConfig) -> (f64, f64) {
    let max_gap = max_binding_gap(shape, shape.width, shape.height, 1.0, config);
    let gap = if gap > max_gap {
        config.highlight_thickness + config.highlight_offset
    } else {
        gap
    };
    (focus, gap)
}

/// Bind one arrow end to a shape, keeping the reverse `bound_elements`
/// reference in sync.
pub fn bind_arrow(scene: &mut Scene, arrow_id: &str, shape_id: &str, edge: Edge, config: &RoutingConfig) {
    let Some(arrow) = scene.get_arrow(arrow_id) else {
        return;
    };
    let Some(shape) = scene.get_shape(shape_id) else {
        return;
    };

    let (focus, gap) = calculate_focus_and_gap(arrow, shape, edge);
    let (focus, gap) = normalize_point_binding(focus, gap, shape, &config.binding);
    let fixed_point = arrow
        .elbowed
        .then(|| calculate_fixed_point_for_elbow_arrow_binding(arrow, shape, edge, &config.binding));
    let binding = Binding {
        element_id: shape_id.to_string(),
        focus,
        gap,
        fixed_point,
    };

    let mut update = ArrowUpdate::default();
    match edge {
        Edge::Start => update.start_binding = Some(Some(binding)),
        Edge::End => update.end_binding = Some(Some(binding)),
    }
    scene.commit_arrow(arrow_id, update);

    if let Some(shape) = scene.get_shape(shape_id)
        && !shape.has_bound_element(arrow_id)
    {
        let mut bound = shape.bound_elements.clone();
        bound.push(BoundElementRef {
            id: arrow_id.to_string(),
        });
        scene.commit_shape_bound_elements(shape_id, bound);
    }
}

/// Clear one arrow end's binding and the bound shape's back-reference.
/// Deleted shapes are still cleaned up.
pub fn unbind_arrow(scene: &mut Scene, arrow_id: &str, edge: Edge) {
    let Some(arrow) = scene.get_arrow(arrow_id) else {
        return;
    };
    let binding = match edge {
        Edge::Start => arrow.start_binding.clone(),
        Edge::End => arrow.end_binding.clone(),
    };
    let Some(binding) = binding else {
        return;
    };

    let mut update = ArrowUpdate::default();
    match edge {
        Edge::Start => update.start_binding = Some(None),
        Edge::End => update.end_binding = Some(None),
    }
    scene.commit_arrow(arrow_id, update);

    let still_bound_elsewhere = scene
        .get_arrow(arrow_id)
        .map(|arrow| {
            [&arrow.start_binding, &arrow.end_binding]
                .into_iter()
                .flatten()
                .any(|b| b.element_id == binding.element_id)
        })
        .unwrap_or(false);
    if still_bound_elsewhere {
        return;
    }

    if let Some(Element::Shape(shape)) = scene.get_including_deleted(&binding.element_id) {
        let bound: Vec<BoundElementRef> = shape
            .bound_elements
            .iter()
            .filter(|r| r.id != arrow_id)
            .cloned()
            .collect();
        scene.commit_shape_bound_elements(&binding.element_id, bound);
    }
}

/// Remove every binding that references any of the deleted ids, both on
/// arrows pointing at deleted shapes and in deleted shapes' back-references.
pub fn fix_bindings_after_deletion(scene: &mut Scene, deleted_ids: &[&str]) {
    let arrow_edges: Vec<(String, Edge)> = scene
        .elements()
        .filter_map(Element::as_arrow)
        .flat_map(|arrow| {
            let mut edges = Vec::new();
            if let Some(binding) = &arrow.start_binding
                && deleted_ids.contains(&binding.element_id.as_str())
            {
                edges.push((arrow.id.clone(), Edge::Start));
            }
            if let Some(binding) = &arrow.end_binding
                && deleted_ids.contains(&binding.element_id.as_str())
            {
                edges.push((arrow.id.clone(), Edge::End));
            }
            edges
        })
        .collect();
    for (arrow_id, edge) in arrow_edges {
        unbind_arrow(scene, &arrow_id, edge);
    }
}

/// Gap re-scaling applied while a bound shape is being resized, before the
/// new size is committed.
pub fn maybe_recalculate_gap_when_scaling(
    shape: &ShapeElement,
    binding: &Binding,
    new_size: Option<(f64, f64)>,
    config: &BindingConfig,
) -> Binding {
    let Some((new_width, new_height)) = new_size else {
        return binding.clone();
    };
    let scaled = binding.gap
        * if new_width < new_height {
            new_width / shape.width
        } else {
            new_height / shape.height
        };
    let new_gap = max_binding_gap(shape, new_width, new_height, 1.0, config)
        .min(scaled)
        .max(1.0);
    Binding {
        gap: new_gap,
        ..binding.clone()
    }
}

/// Recompute every arrow bound to `changed_id` after it moved, resized or
/// rotated. Simple arrows get their endpoints re-projected from focus/gap;
/// elbow arrows are fully re-routed. Stale back-references are skipped.
pub fn update_bound_elements(
    scene: &mut Scene,
    changed_id: &str,
    new_size: Option<(f64, f64)>,
    config: &RoutingConfig,
) {
    let Some(changed) = scene.get_shape(changed_id) else {
        return;
    };
    let bound_ids: Vec<String> = changed.bound_elements.iter().map(|r| r.id.clone()).collect();

    for arrow_id in bound_ids {
        let Some(arrow) = scene.get_arrow(&arrow_id).cloned() else {
            continue;
        };
        let Some(changed) = scene.get_shape(changed_id) else {
            return;
        };
        let references_changed = [&arrow.start_binding, &arrow.end_binding]
            .into_iter()
            .flatten()
            .any(|binding| binding.element_id == changed_id);
        if !references_changed {
            continue;
        }

        let rescale = |binding: &Option<Binding>| {
            binding.as_ref().map(|b| {
                if b.element_id == changed_id {
                    maybe_recalculate_gap_when_scaling(changed, b, new_size, &config.binding)
                } else {
                    b.clone()
                }
            })
        };
        let start_binding = rescale(&arrow.start_binding);
        let end_binding = rescale(&arrow.end_binding);

        let endpoint_for = |edge: Edge, binding: &Option<Binding>| -> Option<Point> {
            let binding = binding.as_ref()?;
            if binding.element_id != changed_id {
                return None;
            }
            let shape = scene.get_shape(&binding.element_id)?;
            update_bound_point(&arrow, edge, binding, shape)
        };
        let new_start = endpoint_for(Edge::Start, &start_binding);
        let new_end = endpoint_for(Edge::End, &end_binding);

        if arrow.elbowed {
            let mut endpoints = vec![arrow.points[0], arrow.points[arrow.points.len() - 1]];
            if let Some(p) = new_start {
                endpoints[0] = p;
            }
            if let Some(p) = new_end {
                endpoints[1] = p;
            }
            let updates = crate::route::ElbowArrowUpdates {
                points: Some(endpoints),
                fixed_segments: None,
                start_binding: Some(start_binding.clone()),
                end_binding: Some(end_binding.clone()),
            };
            match crate::route::update_elbow_arrow_points(
                &arrow,
                scene,
                updates,
                &crate::route::RouteOptions::default(),
                config,
                None,
            ) {
                Ok(mut update) => {
                    update.start_binding = Some(start_binding);
                    update.end_binding = Some(end_binding);
                    scene.commit_arrow(&arrow_id, update);
                }
                Err(err) => {
                    tracing::warn!(arrow = %arrow_id, %err, "bound elbow arrow update failed");
                }
            }
            continue;
        }

        let mut points = arrow.points.clone();
        if let Some(p) = new_start {
            points[0] = p;
        }
        if let Some(p) = new_end {
            let last = points.len() - 1;
            points[last] = p;
        }
        // Rebase so the first point stays the local origin.
        let offset = points[0];
        let points: Vec<Point> = points
            .iter()
            .map(|p| (p.0 - offset.0, p.1 - offset.1))
            .collect();
        let (width, height) = crate::geometry::size_from_points(&points);
        scene.commit_arrow(
            &arrow_id,
            ArrowUpdate {
                points: Some(points),
                x: Some(arrow.x + offset.0),
                y: Some(arrow.y + offset.1),
                width: Some(width),
                height: Some(height),
                start_binding: Some(start_binding),
                end_binding: Some(end_binding),
                ..ArrowUpdate::default()
            },
        );
    }
}

/// Recompute a simple arrow's bound endpoint from its focus/gap pair.
/// Returns the new local point, or `None` when nothing needs to move.
pub fn update_bound_point(
    arrow: &ArrowElement,
    edge: Edge,
    binding: &Binding,
    shape: &ShapeElement,
) -> Option<Point> {
    let len = arrow.points.len();
    if len < 2 {
        return None;
    }

    if arrow.elbowed {
        if let Some(fixed_point) = binding.fixed_point {
            let global = global_fixed_point_of(fixed_point, shape);
            return Some(arrow.point_from_absolute(global));
        }
    }

    let adjacent_point = arrow.point_at_index_global(edge.adjacent_index(len));
    let focus_point = determine_focus_point(shape, binding.focus, adjacent_point);

    let new_edge_point = if binding.gap == 0.0 {
        focus_point
    } else {
        // The focus point is always inside the shape, so the line through
        // the adjacent point is guaranteed to cross the inflated border.
        let intersections =
            intersect_element_with_line(shape, adjacent_point, focus_point, binding.gap);
        intersections.first().copied().unwrap_or(focus_point)
    };

    Some(arrow.point_from_absolute(new_edge_point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::scene::{Element, ShapeKind};

    fn shape(kind: ShapeKind, x: f64, y: f64, width: f64, height: f64) -> ShapeElement {
        ShapeElement {
            id: "s".to_string(),
            kind,
            x,
            y,
            width,
            height,
            angle: 0.0,
            bound_elements: Vec::new(),
            is_deleted: false,
            version: 0,
        }
    }

    fn arrow(id: &str, x: f64, y: f64, points: Vec<Point>, elbowed: bool) -> ArrowElement {
        let (width, height) = crate::geometry::size_from_points(&points);
        ArrowElement {
            id: id.to_string(),
            x,
            y,
            width,
            height,
            angle: 0.0,
            points,
            elbowed,
            start_binding: None,
            end_binding: None,
            start_arrowhead: false,
            end_arrowhead: true,
            fixed_segments: None,
            start_is_special: false,
            end_is_special: false,
            is_deleted: false,
            version: 0,
        }
    }

    #[test]
    fn small_square_gap_hits_the_floor() {
        let config = BindingConfig::default();
        let square = shape(ShapeKind::Rectangle, 0.0, 0.0, 40.0, 40.0);
        // 0.25 × 40 = 10 is under the 16px floor.
        assert_eq!(max_binding_gap(&square, 40.0, 40.0, 1.0, &config), 16.0);
    }

    #[test]
    fn large_shape_gap_is_capped() {
        let config = BindingConfig::default();
        let big = shape(ShapeKind::Rectangle, 0.0, 0.0, 400.0, 400.0);
        assert_eq!(max_binding_gap(&big, 400.0, 400.0, 1.0, &config), 32.0);
    }

    #[test]
    fn zoomed_out_gap_tracks_highlight() {
        let config = BindingConfig::default();
        let square = shape(ShapeKind::Rectangle, 0.0, 0.0, 40.0, 40.0);
        // 10 / 0.25 + 4 = 44
        assert_eq!(max_binding_gap(&square, 40.0, 40.0, 0.25, &config), 44.0);
    }

    #[test]
    fn rectangle_distance_is_signed() {
        let rect = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        assert_eq!(distance_to_shape(&rect, (150.0, 50.0)), 50.0);
        assert_eq!(distance_to_shape(&rect, (50.0, 50.0)), -50.0);
        assert_eq!(distance_to_shape(&rect, (100.0, 50.0)), 0.0);
    }

    #[test]
    fn focus_distance_roundtrips_through_focus_point() {
        let rect = shape(ShapeKind::Rectangle, -50.0, -50.0, 100.0, 100.0);
        let adjacent = (-200.0, -20.0);
        let edge_point = (-55.0, -10.0);
        let focus = determine_focus_distance(&rect, adjacent, edge_point);
        assert!(focus.abs() <= 1.0);
        let focus_point = determine_focus_point(&rect, focus, adjacent);
        // The focus point lies on the line adjacent → original edge point.
        let recomputed = determine_focus_distance(&rect, adjacent, focus_point);
        assert!((focus - recomputed).abs() < 0.05);
    }

    #[test]
    fn focus_of_center_ray_is_zero() {
        let rect = shape(ShapeKind::Rectangle, -50.0, -50.0, 100.0, 100.0);
        let focus = determine_focus_distance(&rect, (-200.0, 0.0), (-60.0, 0.0));
        assert!(focus.abs() < 1e-9);
    }

    #[test]
    fn degenerate_shape_focus_is_zero() {
        let flat = shape(ShapeKind::Rectangle, 0.0, 0.0, 0.0, 100.0);
        assert_eq!(determine_focus_distance(&flat, (10.0, 10.0), (20.0, 20.0)), 0.0);
    }

    #[test]
    fn line_intersects_inflated_rectangle_twice() {
        let rect = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let hits = intersect_element_with_line(&rect, (-100.0, 50.0), (200.0, 50.0), 5.0);
        assert_eq!(hits.len(), 2);
        assert!((hits[0].0 + 5.0).abs() < 1e-6);
        assert!((hits[1].0 - 105.0).abs() < 1e-6);
    }

    #[test]
    fn outline_snap_lands_at_fixed_distance() {
        let config = BindingConfig::default();
        let rect = shape(ShapeKind::Rectangle, -150.0, -150.0, 100.0, 100.0);
        let snapped =
            bind_point_to_snap_to_element_outline((-45.0, -100.0), (-45.0, -100.0), &rect, &config);
        assert!((snapped.0 - -45.0).abs() < 1e-6);
        assert!((snapped.1 - -100.0).abs() < 1e-6);
    }

    #[test]
    fn fixed_point_normalization_avoids_midline() {
        let normalized = normalize_fixed_point([0.5, 0.25]);
        assert!((normalized[0] - 0.5).abs() > 0.00005);
        assert_eq!(normalized[1], 0.25);
        let nudged = normalize_fixed_point([0.49995, 0.50005]);
        assert!((nudged[0] - 0.5).abs() > 0.00005);
        assert!((nudged[1] - 0.5).abs() > 0.00005);
    }

    #[test]
    fn binding_is_symmetric_and_unbind_clears_both_sides() {
        let config = RoutingConfig::default();
        let mut scene = Scene::new();
        scene.insert(Element::Shape(shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0)));
        scene.insert(Element::Arrow(arrow(
            "a",
            120.0,
            50.0,
            vec![(0.0, 0.0), (80.0, 0.0)],
            false,
        )));

        bind_arrow(&mut scene, "a", "s", Edge::Start, &config);
        let bound_arrow = scene.get_arrow("a").unwrap();
        assert_eq!(
            bound_arrow.start_binding.as_ref().unwrap().element_id,
            "s"
        );
        assert!(scene.get_shape("s").unwrap().has_bound_element("a"));

        unbind_arrow(&mut scene, "a", Edge::Start);
        assert!(scene.get_arrow("a").unwrap().start_binding.is_none());
        assert!(!scene.get_shape("s").unwrap().has_bound_element("a"));
    }

    #[test]
    fn deletion_cleanup_clears_stale_references() {
        let config = RoutingConfig::default();
        let mut scene = Scene::new();
        scene.insert(Element::Shape(shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0)));
        scene.insert(Element::Arrow(arrow(
            "a",
            120.0,
            50.0,
            vec![(0.0, 0.0), (80.0, 0.0)],
            false,
        )));
        bind_arrow(&mut scene, "a", "s", Edge::Start, &config);
        scene.mark_deleted("s");
        fix_bindings_after_deletion(&mut scene, &["s"]);
        assert!(scene.get_arrow("a").unwrap().start_binding.is_none());
    }

    #[test]
    fn hover_prefers_smallest_shape_when_stacked() {
        let config = BindingConfig::default();
        let mut scene = Scene::new();
        let mut big = shape(ShapeKind::Rectangle, 0.0, 0.0, 300.0, 300.0);
        big.id = "big".to_string();
        let mut small = shape(ShapeKind::Rectangle, 100.0, 100.0, 80.0, 80.0);
        small.id = "small".to_string();
        scene.insert(Element::Shape(big));
        scene.insert(Element::Shape(small));

        let hovered =
            hovered_element_for_binding((140.0, 140.0), &scene, 1.0, true, true, &config).unwrap();
        assert_eq!(hovered.id, "small");
    }

    #[test]
    fn gap_rescaling_shrinks_with_the_shape() {
        let config = BindingConfig::default();
        let rect = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let binding = Binding {
            element_id: "s".to_string(),
            focus: 0.0,
            gap: 20.0,
            fixed_point: None,
        };
        let rescaled =
            maybe_recalculate_gap_when_scaling(&rect, &binding, Some((50.0, 100.0)), &config);
        assert_eq!(rescaled.gap, 10.0);
    }
}
