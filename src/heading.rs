//! Cardinal heading classification.
//!
//! A heading is the direction an arrow endpoint faces away from its bound
//! shape. It is always one of the four axis directions, never diagonal;
//! ties in vector classification break toward the horizontal axis.

use crate::geometry::{
    Bounds, Point, bounds_center, rotate_point, scale_point_from_origin, triangle_includes_point,
    vector_from_points,
};
use crate::scene::{ShapeElement, ShapeKind};

/// Cone scaling applied to shape corners when classifying a point, so that
/// points well outside the shape still land in exactly one cone.
const SEARCH_CONE_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Up,
    Right,
    Down,
    Left,
}

impl Heading {
    /// 180° negation, used to forbid immediate path reversal.
    pub fn flip(self) -> Heading {
        match self {
            Heading::Up => Heading::Down,
            Heading::Right => Heading::Left,
            Heading::Down => Heading::Up,
            Heading::Left => Heading::Right,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Heading::Left | Heading::Right)
    }

    /// Classify a free vector. Exactly one of the four headings; ties go to
    /// the horizontal axis.
    pub fn from_vector(v: Point) -> Heading {
        let abs_x = v.0.abs();
        let abs_y = v.1.abs();
        if v.0 > abs_y {
            Heading::Right
        } else if v.0 <= -abs_y {
            Heading::Left
        } else if v.1 > abs_x {
            Heading::Down
        } else {
            Heading::Up
        }
    }

    /// Heading of the segment `prev → p`.
    pub fn from_points(p: Point, prev: Point) -> Heading {
        Heading::from_vector(vector_from_points(p, prev))
    }
}

/// Whether the segment `prev → p` runs closer to horizontal than vertical.
pub fn segment_is_horizontal(p: Point, prev: Point) -> bool {
    (p.1 - prev.1).abs() < (p.0 - prev.0).abs()
}

/// Classify where `p` sits relative to a shape.
///
/// Rectanguloids use four triangular cones spanned from the center of the
/// rotated shape's AABB to its corners, scaled outward. Diamonds get an
/// out-of-bounds fast path on the raw box, then the same cone test against
/// the diamond's own rotated vertices.
pub fn heading_for_point_from_element(element: &ShapeElement, aabb: Bounds, p: Point) -> Heading {
    let mid_point = bounds_center(aabb);

    if element.kind == ShapeKind::Diamond {
        if p.0 < element.x {
            return Heading::Left;
        } else if p.1 < element.y {
            return Heading::Up;
        } else if p.0 > element.x + element.width {
            return Heading::Right;
        } else if p.1 > element.y + element.height {
            return Heading::Down;
        }

        let vertex = |corner: Point| {
            rotate_point(
                scale_point_from_origin(corner, mid_point, SEARCH_CONE_MULTIPLIER),
                mid_point,
                element.angle,
            )
        };
        let top = vertex((element.x + element.width / 2.0, element.y));
        let right = vertex((element.x + element.width, element.y + element.height / 2.0));
        let bottom = vertex((element.x + element.width / 2.0, element.y + element.height));
        let left = vertex((element.x, element.y + element.height / 2.0));

        return if triangle_includes_point([top, right, mid_point], p) {
            heading_for_diamond_cone(top, right, mid_point)
        } else if triangle_includes_point([right, bottom, mid_point], p) {
            heading_for_diamond_cone(right, bottom, mid_point)
        } else if triangle_includes_point([bottom, left, mid_point], p) {
            heading_for_diamond_cone(bottom, left, mid_point)
        } else {
            heading_for_diamond_cone(left, top, mid_point)
        };
    }

    let top_left = scale_point_from_origin((aabb[0], aabb[1]), mid_point, SEARCH_CONE_MULTIPLIER);
    let top_right = scale_point_from_origin((aabb[2], aabb[1]), mid_point, SEARCH_CONE_MULTIPLIER);
    let bottom_left = scale_point_from_origin((aabb[0], aabb[3]), mid_point, SEARCH_CONE_MULTIPLIER);
    let bottom_right = scale_point_from_origin((aabb[2], aabb[3]), mid_point, SEARCH_CONE_MULTIPLIER);

    if triangle_includes_point([top_left, top_right, mid_point], p) {
        Heading::Up
    } else if triangle_includes_point([top_right, bottom_right, mid_point], p) {
        Heading::Right
    } else if triangle_includes_point([bottom_right, bottom_left, mid_point], p) {
        Heading::Down
    } else {
        Heading::Left
    }
}

/// Cone classification for rotated diamond sides, bucketed by the compass
/// angle of the cone bisector: `[315°, 45°) → Up`, `[45°, 135°) → Right`,
/// `[135°, 225°) → Down`, the rest `Left`.
fn heading_for_diamond_cone(a: Point, b: Point, center: Point) -> Heading {
    let bisector = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
    let v = vector_from_points(bisector, center);
    // Compass angle: 0° points up on a y-down canvas, growing clockwise.
    let mut deg = v.0.atan2(-v.1).to_degrees();
    if deg < 0.0 {
        deg += 360.0;
    }
    if !(45.0..315.0).contains(&deg) {
        Heading::Up
    } else if deg < 135.0 {
        Heading::Right
    } else if deg < 225.0 {
        Heading::Down
    } else {
        Heading::Left
    }
}
