//! Fixed-segment handling.
//!
//! Pinned segments survive re-routing. Four edit classes arrive here:
//! renormalization (merge collinear and sub-threshold segments), release
//! (a pin removed, the freed run restored from a fresh default route),
//! move (a pin dragged parallel to itself) and endpoint drag (only the
//! transition runs next to the endpoints are recomputed).

use tracing::warn;

use crate::config::RoutingConfig;
use crate::debug::DebugSink;
use crate::geometry::{Point, point_distance, points_equal};
use crate::heading::{Heading, segment_is_horizontal};
use crate::scene::{ArrowElement, ArrowUpdate, FixedSegment, Scene, ShapeElement};

use super::simplify::{corner_points, remove_short_segments};
use super::{
    ElbowArrowState, RouteOptions, elbow_arrow_data, normalize_arrow_element_update,
    route_elbow_arrow,
};

/// Merge collinear neighbor segments and drop segments shorter than the
/// dedup threshold, keeping fixed-segment indices consistent. Falls back to
/// a full re-route when no pins survive.
pub(crate) fn handle_segment_renormalization(
    arrow: &ArrowElement,
    scene: &Scene,
    config: &RoutingConfig,
    sink: Option<&mut dyn DebugSink>,
) -> ArrowUpdate {
    let Some(mut next_fixed_segments) = arrow.fixed_segments.clone() else {
        return ArrowUpdate {
            x: Some(arrow.x),
            y: Some(arrow.y),
            points: Some(arrow.points.clone()),
            fixed_segments: Some(Vec::new()),
            start_is_special: Some(arrow.start_is_special),
            end_is_special: Some(arrow.end_is_special),
            ..ArrowUpdate::default()
        };
    };

    let global: Vec<Point> = arrow
        .points
        .iter()
        .map(|p| (arrow.x + p.0, arrow.y + p.1))
        .collect();

    // Pass 1: unify segments that continue in the same direction.
    let mut merged: Vec<Point> = Vec::new();
    for (i, p) in global.iter().enumerate() {
        if i < 2 {
            merged.push(*p);
            continue;
        }
        let current_heading = Heading::from_points(*p, global[i - 1]);
        let previous_heading = Heading::from_points(global[i - 1], global[i - 2]);
        if current_heading == previous_heading {
            if let Some(seg) = next_fixed_segments.iter_mut().find(|s| s.index == i) {
                seg.start = (global[i - 2].0 - arrow.x, global[i - 2].1 - arrow.y);
            }
            if let Some(prev_pos) = next_fixed_segments.iter().position(|s| s.index == i - 1) {
                next_fixed_segments.remove(prev_pos);
            }
            merged.pop();
            for seg in next_fixed_segments.iter_mut() {
                if seg.index > i - 1 {
                    seg.index -= 1;
                }
            }
        }
        merged.push(*p);
    }

    // Pass 2: drop segments shorter than the dedup threshold.
    let mut next_points: Vec<Point> = Vec::new();
    for (i, p) in merged.iter().enumerate() {
        if i < 3 {
            next_points.push(*p);
            continue;
        }
        if point_distance(merged[i - 2], merged[i - 1]) < config.dedup_threshold {
            let prev_prev_pos = next_fixed_segments.iter().position(|s| s.index == i - 2);
            let prev_pos = next_fixed_segments.iter().position(|s| s.index == i - 1);
            if let Some(pos) = prev_pos {
                next_fixed_segments.remove(pos);
            }
            if let Some(pos) = prev_prev_pos {
                if pos < next_fixed_segments.len() {
                    next_fixed_segments.remove(pos);
                }
            }
            next_points.truncate(next_points.len().saturating_sub(2));
            for seg in next_fixed_segments.iter_mut() {
                if seg.index > i - 2 {
                    seg.index -= 2;
                }
            }
            let is_horizontal = segment_is_horizontal(*p, merged[i - 1]);
            next_points.push((
                if is_horizontal { p.0 } else { merged[i - 2].0 },
                if is_horizontal { merged[i - 2].1 } else { p.1 },
            ));
            continue;
        }
        next_points.push(*p);
    }

    let filtered: Vec<FixedSegment> = next_fixed_segments
        .into_iter()
        .filter(|seg| seg.index != 1 && seg.index != next_points.len() - 1)
        .collect();

    if filtered.is_empty() {
        let local: Vec<Point> = next_points
            .iter()
            .map(|p| (p.0 - arrow.x, p.1 - arrow.y))
            .collect();
        let state = ElbowArrowState::from(arrow);
        let data = elbow_arrow_data(&state, scene, &local, &RouteOptions::default(), config);
        return match route_elbow_arrow(&state, &data, sink) {
            Some(path) => normalize_arrow_element_update(
                &corner_points(remove_short_segments(path)),
                filtered,
                false,
                false,
                config,
            ),
            None => {
                warn!("renormalization re-route failed; keeping previous geometry");
                ArrowUpdate::default()
            }
        };
    }

    normalize_arrow_element_update(
        &next_points,
        filtered,
        arrow.start_is_special,
        arrow.end_is_special,
        config,
    )
}

/// A pinned segment was released: route the freed stretch as if it were its
/// own arrow and splice the result back between the surviving pins.
pub(crate) fn handle_segment_release(
    arrow: &ArrowElement,
    fixed_segments: &[FixedSegment],
    scene: &Scene,
    config: &RoutingConfig,
    sink: Option<&mut dyn DebugSink>,
) -> ArrowUpdate {
    let new_indices: Vec<usize> = fixed_segments.iter().map(|s| s.index).collect();
    let old_segments = arrow.fixed_segments.clone().unwrap_or_default();
    let Some(deleted_pos) = old_segments
        .iter()
        .position(|s| !new_indices.contains(&s.index))
    else {
        return ArrowUpdate {
            points: Some(arrow.points.clone()),
            ..ArrowUpdate::default()
        };
    };

    let deleted_idx = old_segments[deleted_pos].index;
    let prev_segment = deleted_pos.checked_sub(1).map(|i| old_segments[i].clone());
    let next_segment = old_segments.get(deleted_pos + 1).cloned();

    // Route a sub-arrow covering only the freed stretch.
    let prev_end = prev_segment.as_ref().map_or((0.0, 0.0), |s| s.end);
    let x = arrow.x + prev_end.0;
    let y = arrow.y + prev_end.1;
    let last_point = arrow.points[arrow.points.len() - 1];
    let sub_target = next_segment.as_ref().map_or(last_point, |s| s.start);
    let sub_points = vec![
        (0.0, 0.0),
        (arrow.x + sub_target.0 - x, arrow.y + sub_target.1 - y),
    ];
    let state = ElbowArrowState {
        x,
        y,
        start_binding: if prev_segment.is_some() {
            None
        } else {
            arrow.start_binding.clone()
        },
        end_binding: if next_segment.is_some() {
            None
        } else {
            arrow.end_binding.clone()
        },
        start_arrowhead: false,
        end_arrowhead: false,
    };
    let data = elbow_arrow_data(&state, scene, &sub_points, &RouteOptions::default(), config);
    let Some(path) = route_elbow_arrow(&state, &data, sink) else {
        warn!("segment release re-route failed; keeping previous geometry");
        return ArrowUpdate::default();
    };
    let restored = normalize_arrow_element_update(
        &corner_points(remove_short_segments(path)),
        fixed_segments.to_vec(),
        false,
        false,
        config,
    );
    let restored_points = restored.points.unwrap_or_default();

    // Stitch: old points before the freed stretch, the restored run, old
    // points after it.
    let mut next_points: Vec<Point> = Vec::new();
    if let Some(prev) = &prev_segment {
        for i in 0..prev.index {
            next_points.push((arrow.x + arrow.points[i].0, arrow.y + arrow.points[i].1));
        }
    }
    for p in &restored_points {
        next_points.push((arrow.x + prev_end.0 + p.0, arrow.y + prev_end.1 + p.1));
    }
    if let Some(next) = &next_segment {
        for i in next.index..arrow.points.len() {
            next_points.push((arrow.x + arrow.points[i].0, arrow.y + arrow.points[i].1));
        }
    }

    let original_segment_count_diff = next_segment
        .as_ref()
        .map_or(arrow.points.len(), |s| s.index) as isize
        - prev_segment.as_ref().map_or(0, |s| s.index) as isize
        - 1;

    let mut next_fixed_segments: Vec<FixedSegment> = fixed_segments
        .iter()
        .cloned()
        .map(|mut seg| {
            if seg.index > deleted_idx {
                let shifted = seg.index as isize - original_segment_count_diff
                    + restored_points.len() as isize
                    - 1;
                seg.index = shifted.max(1) as usize;
            }
            seg
        })
        .collect();

    // Collapse collinear joints and double up reversal joints so the stitch
    // stays a valid elbow path.
    let mut simplified: Vec<Point> = Vec::new();
    let count = next_points.len();
    for (i, p) in next_points.iter().enumerate() {
        if i > 0 && i + 1 < count {
            let prev_heading = Heading::from_points(*p, next_points[i - 1]);
            let next_heading = Heading::from_points(next_points[i + 1], *p);
            if prev_heading == next_heading {
                for seg in next_fixed_segments.iter_mut() {
                    if seg.index > i {
                        seg.index -= 1;
                    }
                }
                continue;
            } else if prev_heading == next_heading.flip() {
                for seg in next_fixed_segments.iter_mut() {
                    if seg.index > i {
                        seg.index += 1;
                    }
                }
                simplified.push(*p);
                simplified.push(*p);
                continue;
            }
        }
        simplified.push(*p);
    }

    normalize_arrow_element_update(&simplified, next_fixed_segments, false, false, config)
}

/// A pinned segment was dragged parallel to itself: override its two points
/// in place, realign the neighbor joints, and keep a two-point buffer at a
/// bound end by inserting one extra boundary point when needed.
#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_segment_move(
    arrow: &ArrowElement,
    mut fixed_segments: Vec<FixedSegment>,
    start_heading: Heading,
    end_heading: Heading,
    hovered_start: Option<&ShapeElement>,
    hovered_end: Option<&ShapeElement>,
    config: &RoutingConfig,
) -> ArrowUpdate {
    let old_segments = arrow.fixed_segments.as_deref().unwrap_or(&[]);
    let actively_modified = fixed_segments.iter().enumerate().find_map(|(i, segment)| {
        match old_segments.get(i) {
            None => Some(i),
            Some(old) if old.index != segment.index => Some(i),
            Some(old) => {
                let x_moved = segment.start.0 != old.start.0 && segment.end.0 != old.end.0;
                let y_moved = segment.start.1 != old.start.1 && segment.end.1 != old.end.1;
                (x_moved != y_moved).then_some(i)
            }
        }
    });
    let Some(modified_idx) = actively_modified else {
        return ArrowUpdate {
            points: Some(arrow.points.clone()),
            ..ArrowUpdate::default()
        };
    };
    if fixed_segments[modified_idx].index == 0
        || fixed_segments[modified_idx].index >= arrow.points.len()
    {
        return ArrowUpdate {
            points: Some(arrow.points.clone()),
            ..ArrowUpdate::default()
        };
    }

    let first_segment_pinned = old_segments.iter().any(|s| s.index == 1);
    let last_segment_pinned = old_segments
        .iter()
        .any(|s| s.index == arrow.points.len() - 1);

    let base_padding = config.base_padding;
    let segment_length = point_distance(
        fixed_segments[modified_idx].start,
        fixed_segments[modified_idx].end,
    );
    let segment_is_too_short = segment_length < base_padding + 5.0;

    // Moving the very first segment of a bound arrow: leave room for the
    // connection stub by shifting the segment start inward.
    if !first_segment_pinned && fixed_segments[modified_idx].index == 1 && hovered_start.is_some()
    {
        let start_is_horizontal = start_heading.is_horizontal();
        let start_is_positive = if start_is_horizontal {
            start_heading == Heading::Right
        } else {
            start_heading == Heading::Down
        };
        let padding = match (start_is_positive, segment_is_too_short) {
            (true, true) => segment_length / 2.0,
            (true, false) => base_padding,
            (false, true) => -segment_length / 2.0,
            (false, false) => -base_padding,
        };
        let start = fixed_segments[modified_idx].start;
        fixed_segments[modified_idx].start = (
            start.0 + if start_is_horizontal { padding } else { 0.0 },
            start.1 + if start_is_horizontal { 0.0 } else { padding },
        );
    }

    if !last_segment_pinned
        && fixed_segments[modified_idx].index == arrow.points.len() - 1
        && hovered_end.is_some()
    {
        let end_is_horizontal = end_heading.is_horizontal();
        let end_is_positive = if end_is_horizontal {
            end_heading == Heading::Right
        } else {
            end_heading == Heading::Down
        };
        let padding = match (end_is_positive, segment_is_too_short) {
            (true, true) => segment_length / 2.0,
            (true, false) => base_padding,
            (false, true) => -segment_length / 2.0,
            (false, false) => -base_padding,
        };
        let end = fixed_segments[modified_idx].end;
        fixed_segments[modified_idx].end = (
            end.0 + if end_is_horizontal { padding } else { 0.0 },
            end.1 + if end_is_horizontal { 0.0 } else { padding },
        );
    }

    // Work in global coordinates from here on.
    let mut next_fixed_segments: Vec<FixedSegment> = fixed_segments
        .iter()
        .map(|seg| FixedSegment {
            index: seg.index,
            start: (arrow.x + seg.start.0, arrow.y + seg.start.1),
            end: (arrow.x + seg.end.0, arrow.y + seg.end.1),
        })
        .collect();
    let mut new_points: Vec<Point> = arrow
        .points
        .iter()
        .map(|p| (arrow.x + p.0, arrow.y + p.1))
        .collect();

    let start_idx = next_fixed_segments[modified_idx].index - 1;
    let end_idx = next_fixed_segments[modified_idx].index;
    let start = next_fixed_segments[modified_idx].start;
    let end = next_fixed_segments[modified_idx].end;

    let prev_segment_is_horizontal = (start_idx >= 1
        && !points_equal(new_points[start_idx], new_points[start_idx - 1]))
    .then(|| segment_is_horizontal(new_points[start_idx - 1], new_points[start_idx]));
    let next_segment_is_horizontal = (end_idx + 1 < new_points.len()
        && !points_equal(new_points[end_idx], new_points[end_idx + 1]))
    .then(|| segment_is_horizontal(new_points[end_idx + 1], new_points[end_idx]));

    // Slide the neighboring joints along with the moved segment.
    if let Some(horizontal) = prev_segment_is_horizontal {
        if horizontal {
            new_points[start_idx - 1].1 = start.1;
        } else {
            new_points[start_idx - 1].0 = start.0;
        }
    }
    new_points[start_idx] = start;
    new_points[end_idx] = end;
    if let Some(horizontal) = next_segment_is_horizontal {
        if horizontal {
            new_points[end_idx + 1].1 = end.1;
        } else {
            new_points[end_idx + 1].0 = end.0;
        }
    }

    // Neighboring pinned segments follow the moved joint.
    if let Some(prev_pos) = next_fixed_segments
        .iter()
        .position(|seg| seg.index == start_idx)
    {
        let horizontal = segment_is_horizontal(
            next_fixed_segments[prev_pos].end,
            next_fixed_segments[prev_pos].start,
        );
        if horizontal {
            next_fixed_segments[prev_pos].start.1 = start.1;
        } else {
            next_fixed_segments[prev_pos].start.0 = start.0;
        }
        next_fixed_segments[prev_pos].end = start;
    }
    if let Some(next_pos) = next_fixed_segments
        .iter()
        .position(|seg| seg.index == end_idx + 1)
    {
        let horizontal = segment_is_horizontal(
            next_fixed_segments[next_pos].end,
            next_fixed_segments[next_pos].start,
        );
        if horizontal {
            next_fixed_segments[next_pos].end.1 = end.1;
        } else {
            next_fixed_segments[next_pos].end.0 = end.0;
        }
        next_fixed_segments[next_pos].start = end;
    }

    // Moving the first segment needs an extra boundary point.
    if !first_segment_pinned && start_idx == 0 {
        let start_is_horizontal = if hovered_start.is_some() {
            start_heading.is_horizontal()
        } else {
            segment_is_horizontal(new_points[1], new_points[0])
        };
        let origin = (arrow.x + arrow.points[0].0, arrow.y + arrow.points[0].1);
        new_points.insert(
            0,
            (
                if start_is_horizontal { start.0 } else { origin.0 },
                if start_is_horizontal { origin.1 } else { start.1 },
            ),
        );
        if hovered_start.is_some() {
            new_points.insert(0, origin);
        }
        let bump = if hovered_start.is_some() { 2 } else { 1 };
        for seg in next_fixed_segments.iter_mut() {
            seg.index += bump;
        }
    }

    // Same at the far end.
    if !last_segment_pinned && end_idx == arrow.points.len() - 1 {
        let end_is_horizontal = end_heading.is_horizontal();
        let terminal = (
            arrow.x + arrow.points[arrow.points.len() - 1].0,
            arrow.y + arrow.points[arrow.points.len() - 1].1,
        );
        new_points.push((
            if end_is_horizontal { end.0 } else { terminal.0 },
            if end_is_horizontal { terminal.1 } else { end.1 },
        ));
        if hovered_end.is_some() {
            new_points.push(terminal);
        }
    }

    let localized: Vec<FixedSegment> = next_fixed_segments
        .into_iter()
        .map(|seg| FixedSegment {
            index: seg.index,
            start: (seg.start.0 - arrow.x, seg.start.1 - arrow.y),
            end: (seg.end.0 - arrow.x, seg.end.1 - arrow.y),
        })
        .collect();

    // Moving a segment discards any special endpoint extension.
    normalize_arrow_element_update(&new_points, localized, false, false, config)
}

/// Endpoints moved while pins exist: recompute only the transition segments
/// next to each endpoint, leaving interior pinned coordinates untouched.
/// When the connecting segment's orientation must flip to match a newly
/// snapped heading, an extra "special" point is toggled at that end.
#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_endpoint_drag(
    arrow: &ArrowElement,
    updated_points: &[Point],
    fixed_segments: Vec<FixedSegment>,
    start_heading: Heading,
    end_heading: Heading,
    start_global_point: Point,
    end_global_point: Point,
    hovered_start: Option<&ShapeElement>,
    hovered_end: Option<&ShapeElement>,
    config: &RoutingConfig,
) -> ArrowUpdate {
    let mut start_is_special = arrow.start_is_special;
    let mut end_is_special = arrow.end_is_special;
    let base_padding = config.base_padding;

    let count = updated_points.len();
    let global_updated: Vec<Point> = (0..count)
        .map(|i| {
            if i == 0 || i == count - 1 {
                (arrow.x + updated_points[i].0, arrow.y + updated_points[i].1)
            } else {
                (arrow.x + arrow.points[i].0, arrow.y + arrow.points[i].1)
            }
        })
        .collect();

    // Compensate pinned coordinates for the moved start point.
    let mut next_fixed_segments: Vec<FixedSegment> = fixed_segments
        .iter()
        .map(|seg| FixedSegment {
            index: seg.index,
            start: (
                arrow.x + (seg.start.0 - updated_points[0].0),
                arrow.y + (seg.start.1 - updated_points[0].1),
            ),
            end: (
                arrow.x + (seg.end.0 - updated_points[0].0),
                arrow.y + (seg.end.1 - updated_points[0].1),
            ),
        })
        .collect();

    let mut new_points: Vec<Point> = Vec::new();

    // Interior points survive verbatim.
    let offset = 2 + usize::from(start_is_special);
    let end_offset = 2 + usize::from(end_is_special);
    while ((new_points.len() + offset) as isize) < count as isize - end_offset as isize {
        new_points.push(global_updated[new_points.len() + offset]);
    }

    let at = |i: isize| -> Point {
        global_updated[i.clamp(0, count as isize - 1) as usize]
    };

    // Reconnect the start transition.
    {
        let second_point = at(if start_is_special { 2 } else { 1 });
        let third_point = at(if start_is_special { 3 } else { 2 });
        let start_is_horizontal = start_heading.is_horizontal();
        let second_is_horizontal = Heading::from_vector((
            second_point.0 - third_point.0,
            second_point.1 - third_point.1,
        ))
        .is_horizontal();

        if hovered_start.is_some() && start_is_horizontal == second_is_horizontal {
            let positive = if start_is_horizontal {
                start_heading == Heading::Right
            } else {
                start_heading == Heading::Down
            };
            let pad = if positive { base_padding } else { -base_padding };
            new_points.insert(
                0,
                (
                    if second_is_horizontal {
                        start_global_point.0 + pad
                    } else {
                        third_point.0
                    },
                    if second_is_horizontal {
                        third_point.1
                    } else {
                        start_global_point.1 + pad
                    },
                ),
            );
            new_points.insert(
                0,
                (
                    if start_is_horizontal {
                        start_global_point.0 + pad
                    } else {
                        start_global_point.0
                    },
                    if start_is_horizontal {
                        start_global_point.1
                    } else {
                        start_global_point.1 + pad
                    },
                ),
            );
            if !start_is_special {
                start_is_special = true;
                for seg in next_fixed_segments.iter_mut() {
                    if seg.index > 1 {
                        seg.index += 1;
                    }
                }
            }
        } else {
            new_points.insert(
                0,
                (
                    if second_is_horizontal {
                        start_global_point.0
                    } else {
                        second_point.0
                    },
                    if second_is_horizontal {
                        second_point.1
                    } else {
                        start_global_point.1
                    },
                ),
            );
            if start_is_special {
                start_is_special = false;
                for seg in next_fixed_segments.iter_mut() {
                    if seg.index > 1 {
                        seg.index -= 1;
                    }
                }
            }
        }
        new_points.insert(0, start_global_point);
    }

    // Reconnect the end transition.
    {
        let second_to_last = at(count as isize - if end_is_special { 3 } else { 2 });
        let third_to_last = at(count as isize - if end_is_special { 4 } else { 3 });
        let end_is_horizontal = end_heading.is_horizontal();
        let second_is_horizontal = segment_is_horizontal(third_to_last, second_to_last);

        if hovered_end.is_some() && end_is_horizontal == second_is_horizontal {
            let positive = if end_is_horizontal {
                end_heading == Heading::Right
            } else {
                end_heading == Heading::Down
            };
            let pad = if positive { base_padding } else { -base_padding };
            new_points.push((
                if second_is_horizontal {
                    end_global_point.0 + pad
                } else {
                    third_to_last.0
                },
                if second_is_horizontal {
                    third_to_last.1
                } else {
                    end_global_point.1 + pad
                },
            ));
            new_points.push((
                if end_is_horizontal {
                    end_global_point.0 + pad
                } else {
                    end_global_point.0
                },
                if end_is_horizontal {
                    end_global_point.1
                } else {
                    end_global_point.1 + pad
                },
            ));
            end_is_special = true;
        } else {
            new_points.push((
                if second_is_horizontal {
                    end_global_point.0
                } else {
                    second_to_last.0
                },
                if second_is_horizontal {
                    second_to_last.1
                } else {
                    end_global_point.1
                },
            ));
            end_is_special = false;
        }
    }

    new_points.push(end_global_point);

    // Re-derive pinned coordinates from the stitched run, local to the new
    // origin.
    let last_point_idx = new_points.len() - 1;
    let final_segments: Vec<FixedSegment> = next_fixed_segments
        .into_iter()
        .map(|seg| {
            let index = seg.index.clamp(1, last_point_idx);
            FixedSegment {
                index,
                start: (
                    new_points[index - 1].0 - start_global_point.0,
                    new_points[index - 1].1 - start_global_point.1,
                ),
                end: (
                    new_points[index].0 - start_global_point.0,
                    new_points[index].1 - start_global_point.1,
                ),
            }
        })
        .collect();

    normalize_arrow_element_update(
        &new_points,
        final_segments,
        start_is_special,
        end_is_special,
        config,
    )
}
