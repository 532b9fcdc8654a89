//! Route post-processing: collapse grid-snap noise and keep only corners.

use crate::geometry::{Point, point_distance};
use crate::heading::segment_is_horizontal;

/// Interior points closer than this to their predecessor are grid-snap
/// noise left behind by dongle projection.
const SHORT_SEGMENT_THRESHOLD: f64 = 0.3;

/// Drop interior points that sit on top of their predecessor. The first and
/// last point always survive.
pub(crate) fn remove_short_segments(points: Vec<Point>) -> Vec<Point> {
    if points.len() < 4 {
        return points;
    }
    let last = points.len() - 1;
    let mut result: Vec<Point> = Vec::with_capacity(points.len());
    for (idx, p) in points.iter().enumerate() {
        if idx == 0 || idx == last {
            result.push(*p);
            continue;
        }
        if point_distance(points[idx - 1], *p) > SHORT_SEGMENT_THRESHOLD {
            result.push(*p);
        }
    }
    result
}

/// Keep only points where the path changes orientation, plus both ends.
pub(crate) fn corner_points(points: Vec<Point>) -> Vec<Point> {
    if points.len() <= 1 {
        return points;
    }
    let mut previous_horizontal = segment_is_horizontal(points[1], points[0]);
    let last = points.len() - 1;
    let mut result = Vec::with_capacity(points.len());
    for (idx, p) in points.iter().enumerate() {
        if idx == 0 || idx == last {
            result.push(*p);
            continue;
        }
        let next_horizontal = segment_is_horizontal(points[idx + 1], *p);
        if previous_horizontal != next_horizontal {
            result.push(*p);
        }
        previous_horizontal = next_horizontal;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collinear_points_are_dropped() {
        let points = vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (20.0, 0.0),
            (20.0, 10.0),
            (20.0, 30.0),
            (40.0, 30.0),
        ];
        let corners = corner_points(points);
        assert_eq!(
            corners,
            vec![(0.0, 0.0), (20.0, 0.0), (20.0, 30.0), (40.0, 30.0)]
        );
    }

    #[test]
    fn short_interior_segments_are_dropped() {
        let points = vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (10.1, 0.0),
            (10.1, 20.0),
            (30.0, 20.0),
        ];
        let cleaned = remove_short_segments(points);
        assert_eq!(
            cleaned,
            vec![(0.0, 0.0), (10.0, 0.0), (10.1, 20.0), (30.0, 20.0)]
        );
    }

    #[test]
    fn endpoints_always_survive() {
        let points = vec![(0.0, 0.0), (0.1, 0.0), (0.15, 0.0), (0.2, 0.0)];
        let cleaned = remove_short_segments(points);
        assert_eq!(cleaned.first(), Some(&(0.0, 0.0)));
        assert_eq!(cleaned.last(), Some(&(0.2, 0.0)));
    }
}
