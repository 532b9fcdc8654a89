//! Dynamic corridor construction.
//!
//! The two corridors bound the routing search space around the endpoints.
//! They are built so they always touch (no gap between them), which keeps
//! the search grid connected. Per edge the formula picks the midpoint
//! between the two element boxes when they face each other on that axis, an
//! outward-padded own edge when they do not, or falls back to the common
//! bounds.

use crate::geometry::{Bounds, Point, common_bounds, vector_cross};

/// Build the two adjacent corridors for boxes `a` and `b`.
///
/// `start_difference`/`end_difference` are per-edge paddings
/// (`[up, right, down, left]`). `start_element_bounds`/`end_element_bounds`
/// are the unpadded element boxes used for midpoint calculation; they
/// default to `a`/`b`.
pub(crate) fn generate_dynamic_aabbs(
    a: Bounds,
    b: Bounds,
    common: Bounds,
    start_difference: [f64; 4],
    end_difference: [f64; 4],
    disable_side_hack: bool,
    start_element_bounds: Option<Bounds>,
    end_element_bounds: Option<Bounds>,
) -> [Bounds; 2] {
    let start_el = start_element_bounds.unwrap_or(a);
    let end_el = end_element_bounds.unwrap_or(b);
    let [start_up, start_right, start_down, start_left] = start_difference;
    let [end_up, end_right, end_down, end_left] = end_difference;

    let first: Bounds = [
        if a[0] > b[2] {
            if a[1] > b[3] || a[3] < b[1] {
                ((start_el[0] + end_el[2]) / 2.0).min(a[0] - start_left)
            } else {
                (start_el[0] + end_el[2]) / 2.0
            }
        } else if a[0] > b[0] {
            a[0] - start_left
        } else {
            common[0] - start_left
        },
        if a[1] > b[3] {
            if a[0] > b[2] || a[2] < b[0] {
                ((start_el[1] + end_el[3]) / 2.0).min(a[1] - start_up)
            } else {
                (start_el[1] + end_el[3]) / 2.0
            }
        } else if a[1] > b[1] {
            a[1] - start_up
        } else {
            common[1] - start_up
        },
        if a[2] < b[0] {
            if a[1] > b[3] || a[3] < b[1] {
                ((start_el[2] + end_el[0]) / 2.0).max(a[2] + start_right)
            } else {
                (start_el[2] + end_el[0]) / 2.0
            }
        } else if a[2] < b[2] {
            a[2] + start_right
        } else {
            common[2] + start_right
        },
        if a[3] < b[1] {
            if a[0] > b[2] || a[2] < b[0] {
                ((start_el[3] + end_el[1]) / 2.0).max(a[3] + start_down)
            } else {
                (start_el[3] + end_el[1]) / 2.0
            }
        } else if a[3] < b[3] {
            a[3] + start_down
        } else {
            common[3] + start_down
        },
    ];
    let second: Bounds = [
        if b[0] > a[2] {
            if b[1] > a[3] || b[3] < a[1] {
                ((end_el[0] + start_el[2]) / 2.0).min(b[0] - end_left)
            } else {
                (end_el[0] + start_el[2]) / 2.0
            }
        } else if b[0] > a[0] {
            b[0] - end_left
        } else {
            common[0] - end_left
        },
        if b[1] > a[3] {
            if b[0] > a[2] || b[2] < a[0] {
                ((end_el[1] + start_el[3]) / 2.0).min(b[1] - end_up)
            } else {
                (end_el[1] + start_el[3]) / 2.0
            }
        } else if b[1] > a[1] {
            b[1] - end_up
        } else {
            common[1] - end_up
        },
        if b[2] < a[0] {
            if b[1] > a[3] || b[3] < a[1] {
                ((end_el[2] + start_el[0]) / 2.0).max(b[2] + end_right)
            } else {
                (end_el[2] + start_el[0]) / 2.0
            }
        } else if b[2] < a[2] {
            b[2] + end_right
        } else {
            common[2] + end_right
        },
        if b[3] < a[1] {
            if b[0] > a[2] || b[2] < a[0] {
                ((end_el[3] + start_el[1]) / 2.0).max(b[3] + end_down)
            } else {
                (end_el[3] + start_el[1]) / 2.0
            }
        } else if b[3] < a[3] {
            b[3] + end_down
        } else {
            common[3] + end_down
        },
    ];

    let c = common_bounds(&[first, second]);
    if !disable_side_hack
        && first[2] - first[0] + second[2] - second[0] > c[2] - c[0] + 1e-11
        && first[3] - first[1] + second[3] - second[1] > c[3] - c[1] + 1e-11
    {
        // Diagonal placement with no straight channel: split the overlap
        // along a cut plane into an L-shaped partition. The side of the cut
        // follows the orientation of the diagonal, decided by a cross
        // product between box-corner vectors.
        let end_center: Point = (
            (second[0] + second[2]) / 2.0,
            (second[1] + second[3]) / 2.0,
        );
        if b[0] > a[2] && a[1] > b[3] {
            // BOTTOM LEFT
            let c_x = first[2] + (second[0] - first[2]) / 2.0;
            let c_y = second[3] + (first[1] - second[3]) / 2.0;

            if vector_cross(
                (a[2] - end_center.0, a[1] - end_center.1),
                (a[0] - end_center.0, a[3] - end_center.1),
            ) > 0.0
            {
                return [
                    [first[0], first[1], c_x, first[3]],
                    [c_x, second[1], second[2], second[3]],
                ];
            }
            return [
                [first[0], c_y, first[2], first[3]],
                [second[0], second[1], second[2], c_y],
            ];
        } else if a[2] < b[0] && a[3] < b[1] {
            // TOP LEFT
            let c_x = first[2] + (second[0] - first[2]) / 2.0;
            let c_y = first[3] + (second[1] - first[3]) / 2.0;

            if vector_cross(
                (a[0] - end_center.0, a[1] - end_center.1),
                (a[2] - end_center.0, a[3] - end_center.1),
            ) > 0.0
            {
                return [
                    [first[0], first[1], first[2], c_y],
                    [second[0], c_y, second[2], second[3]],
                ];
            }
            return [
                [first[0], first[1], c_x, first[3]],
                [c_x, second[1], second[2], second[3]],
            ];
        } else if a[0] > b[2] && a[3] < b[1] {
            // TOP RIGHT
            let c_x = second[2] + (first[0] - second[2]) / 2.0;
            let c_y = first[3] + (second[1] - first[3]) / 2.0;

            if vector_cross(
                (a[2] - end_center.0, a[1] - end_center.1),
                (a[0] - end_center.0, a[3] - end_center.1),
            ) > 0.0
            {
                return [
                    [c_x, first[1], first[2], first[3]],
                    [second[0], second[1], c_x, second[3]],
                ];
            }
            return [
                [first[0], first[1], first[2], c_y],
                [second[0], c_y, second[2], second[3]],
            ];
        } else if a[0] > b[2] && a[1] > b[3] {
            // BOTTOM RIGHT
            let c_x = second[2] + (first[0] - second[2]) / 2.0;
            let c_y = second[3] + (first[1] - second[3]) / 2.0;

            if vector_cross(
                (a[0] - end_center.0, a[1] - end_center.1),
                (a[2] - end_center.0, a[3] - end_center.1),
            ) > 0.0
            {
                return [
                    [c_x, first[1], first[2], first[3]],
                    [second[0], second[1], c_x, second[3]],
                ];
            }
            return [
                [first[0], c_y, first[2], first[3]],
                [second[0], second[1], second[2], c_y],
            ];
        }
    }

    [first, second]
}
