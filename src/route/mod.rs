//! Elbow arrow routing pipeline.
//!
//! One entry point, [`update_elbow_arrow_points`], recomputes an elbow
//! arrow's geometry for any edit: binding changes, endpoint drags, pinned
//! segment moves and releases, shape moves and resizes. The result is a
//! partial [`ArrowUpdate`] the host commits atomically through
//! [`Scene::commit_arrow`]; on failure the arrow's previous geometry stays
//! untouched.

mod astar;
mod corridor;
mod grid;
pub mod heap;
mod segments;
mod simplify;

use tracing::{debug, warn};

use crate::binding::{
    self, distance_to_shape, get_heading_for_elbow_arrow_snap, global_fixed_point_of,
    hovered_element_for_binding,
};
use crate::config::RoutingConfig;
use crate::debug::DebugSink;
use crate::error::EngineError;
use crate::geometry::{
    Bounds, Point, common_bounds, point_inside_bounds, points_equal, size_from_points,
};
use crate::heading::Heading;
use crate::scene::{ArrowElement, ArrowUpdate, Binding, FixedSegment, Scene, ShapeElement};

use astar::astar;
use corridor::generate_dynamic_aabbs;
use grid::calculate_grid;
use simplify::{corner_points, remove_short_segments};

pub(crate) use segments::{
    handle_endpoint_drag, handle_segment_move, handle_segment_release,
    handle_segment_renormalization,
};

/// Host-side state accompanying an update.
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// A pointer drag is in flight: endpoints hover-bind instead of
    /// following committed bindings.
    pub is_dragging: bool,
    pub zoom: f64,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            is_dragging: false,
            zoom: 1.0,
        }
    }
}

/// Requested changes for one elbow arrow. `None` fields keep the arrow's
/// current value.
#[derive(Debug, Clone, Default)]
pub struct ElbowArrowUpdates {
    /// Either a full replacement point array of the same length, or exactly
    /// the two new endpoints.
    pub points: Option<Vec<Point>>,
    pub fixed_segments: Option<Vec<FixedSegment>>,
    pub start_binding: Option<Option<Binding>>,
    pub end_binding: Option<Option<Binding>>,
}

/// Reduced arrow state the routing core works on; lets fixed-segment
/// handlers route synthetic sub-arrows without fabricating elements.
#[derive(Debug, Clone)]
pub(crate) struct ElbowArrowState {
    pub x: f64,
    pub y: f64,
    pub start_binding: Option<Binding>,
    pub end_binding: Option<Binding>,
    pub start_arrowhead: bool,
    pub end_arrowhead: bool,
}

impl From<&ArrowElement> for ElbowArrowState {
    fn from(arrow: &ArrowElement) -> Self {
        Self {
            x: arrow.x,
            y: arrow.y,
            start_binding: arrow.start_binding.clone(),
            end_binding: arrow.end_binding.clone(),
            start_arrowhead: arrow.start_arrowhead,
            end_arrowhead: arrow.end_arrowhead,
        }
    }
}

/// Everything the A* stage needs, assembled once per update.
#[derive(Debug, Clone)]
pub(crate) struct ElbowArrowData {
    pub dynamic_aabbs: [Bounds; 2],
    pub start_dongle_position: Point,
    pub start_global_point: Point,
    pub start_heading: Heading,
    pub end_dongle_position: Point,
    pub end_global_point: Point,
    pub end_heading: Heading,
    pub common_bounds: Bounds,
    pub hovered_start_element: Option<ShapeElement>,
    pub hovered_end_element: Option<ShapeElement>,
}

/// Per-edge corridor padding for a heading: `head` on the facing edge,
/// `side` elsewhere. Order is `[up, right, down, left]`.
fn offset_from_heading(heading: Heading, head: f64, side: f64) -> [f64; 4] {
    match heading {
        Heading::Up => [head, side, side, side],
        Heading::Right => [side, head, side, side],
        Heading::Down => [side, side, head, side],
        Heading::Left => [side, side, side, head],
    }
}

/// Resolve the effective global position of one endpoint: the hover/bind
/// snap while dragging, the tracked fixed point when bound, the raw point
/// otherwise.
fn get_global_point(
    fixed_point: Option<[f64; 2]>,
    initial_point: Point,
    other_point: Point,
    hovered: Option<&ShapeElement>,
    is_dragging: bool,
    config: &RoutingConfig,
) -> Point {
    if is_dragging {
        if let Some(element) = hovered
            && distance_to_shape(element, initial_point) <= 0.0
        {
            let snap = binding::bind_point_to_snap_to_element_outline(
                initial_point,
                other_point,
                element,
                &config.binding,
            );
            return binding::snap_to_mid(element, snap, &config.binding);
        }
        return initial_point;
    }

    if let Some(element) = hovered {
        let fixed_global = global_fixed_point_of(fixed_point.unwrap_or([0.0, 0.0]), element);
        // Resize scales the stored ratio off the outline; re-snap then.
        return if (distance_to_shape(element, fixed_global)
            - config.binding.fixed_binding_distance)
            .abs()
            > 0.01
        {
            binding::bind_point_to_snap_to_element_outline(
                fixed_global,
                other_point,
                element,
                &config.binding,
            )
        } else {
            fixed_global
        };
    }

    initial_point
}

fn get_bind_point_heading(
    p: Point,
    other_point: Point,
    hovered: Option<&ShapeElement>,
    orig_point: Point,
    zoom: f64,
    config: &RoutingConfig,
) -> Heading {
    let aabb = hovered.map(|element| {
        let distance = distance_to_shape(element, p);
        element.aabb(Some([distance; 4]))
    });
    get_heading_for_elbow_arrow_snap(
        p,
        other_point,
        hovered,
        aabb,
        orig_point,
        zoom,
        &config.binding,
    )
}

/// Projection of an endpoint onto the inner edge of its corridor along the
/// forced heading: a fixed, always-reachable search node.
fn dongle_position(bounds: Bounds, heading: Heading, p: Point) -> Point {
    match heading {
        Heading::Up => (p.0, bounds[1]),
        Heading::Right => (bounds[2], p.1),
        Heading::Down => (p.0, bounds[3]),
        Heading::Left => (bounds[0], p.1),
    }
}

/// Assemble corridors, headings, dongles and bounds for one routing pass.
pub(crate) fn elbow_arrow_data(
    state: &ElbowArrowState,
    scene: &Scene,
    next_points: &[Point],
    options: &RouteOptions,
    config: &RoutingConfig,
) -> ElbowArrowData {
    let base_padding = config.base_padding;
    let fixed_distance = config.binding.fixed_binding_distance;

    let orig_start_global: Point = (state.x + next_points[0].0, state.y + next_points[0].1);
    let orig_end_global: Point = (
        state.x + next_points[next_points.len() - 1].0,
        state.y + next_points[next_points.len() - 1].1,
    );

    let (hovered_start_element, hovered_end_element) = if options.is_dragging {
        (
            hovered_element_for_binding(
                orig_start_global,
                scene,
                options.zoom,
                true,
                true,
                &config.binding,
            )
            .cloned(),
            hovered_element_for_binding(
                orig_end_global,
                scene,
                options.zoom,
                true,
                true,
                &config.binding,
            )
            .cloned(),
        )
    } else {
        (
            state
                .start_binding
                .as_ref()
                .and_then(|binding| scene.get_shape(&binding.element_id))
                .cloned(),
            state
                .end_binding
                .as_ref()
                .and_then(|binding| scene.get_shape(&binding.element_id))
                .cloned(),
        )
    };

    let start_global_point = get_global_point(
        state.start_binding.as_ref().and_then(|b| b.fixed_point),
        orig_start_global,
        orig_end_global,
        hovered_start_element.as_ref(),
        options.is_dragging,
        config,
    );
    let end_global_point = get_global_point(
        state.end_binding.as_ref().and_then(|b| b.fixed_point),
        orig_end_global,
        orig_start_global,
        hovered_end_element.as_ref(),
        options.is_dragging,
        config,
    );

    let start_heading = get_bind_point_heading(
        start_global_point,
        end_global_point,
        hovered_start_element.as_ref(),
        orig_start_global,
        options.zoom,
        config,
    );
    let end_heading = get_bind_point_heading(
        end_global_point,
        start_global_point,
        hovered_end_element.as_ref(),
        orig_end_global,
        options.zoom,
        config,
    );

    let start_point_bounds: Bounds = [
        start_global_point.0 - 2.0,
        start_global_point.1 - 2.0,
        start_global_point.0 + 2.0,
        start_global_point.1 + 2.0,
    ];
    let end_point_bounds: Bounds = [
        end_global_point.0 - 2.0,
        end_global_point.1 - 2.0,
        end_global_point.0 + 2.0,
        end_global_point.1 + 2.0,
    ];

    let start_arrowhead_pad = if state.start_arrowhead {
        fixed_distance * 6.0
    } else {
        fixed_distance * 2.0
    };
    let end_arrowhead_pad = if state.end_arrowhead {
        fixed_distance * 6.0
    } else {
        fixed_distance * 2.0
    };

    let start_element_bounds = hovered_start_element
        .as_ref()
        .map(|element| element.aabb(Some(offset_from_heading(start_heading, start_arrowhead_pad, 1.0))))
        .unwrap_or(start_point_bounds);
    let end_element_bounds = hovered_end_element
        .as_ref()
        .map(|element| element.aabb(Some(offset_from_heading(end_heading, end_arrowhead_pad, 1.0))))
        .unwrap_or(end_point_bounds);

    // With an endpoint inside the other element's padded box there is no
    // unobstructed channel; collapse to point bounds and search freely.
    let bounds_overlap = point_inside_bounds(
        start_global_point,
        hovered_end_element
            .as_ref()
            .map(|element| {
                element.aabb(Some(offset_from_heading(end_heading, base_padding, base_padding)))
            })
            .unwrap_or(end_point_bounds),
    ) || point_inside_bounds(
        end_global_point,
        hovered_start_element
            .as_ref()
            .map(|element| {
                element.aabb(Some(offset_from_heading(start_heading, base_padding, base_padding)))
            })
            .unwrap_or(start_point_bounds),
    );

    let common_bounds_ = common_bounds(&if bounds_overlap {
        [start_point_bounds, end_point_bounds]
    } else {
        [start_element_bounds, end_element_bounds]
    });

    let neither_hovered =
        hovered_start_element.is_none() && hovered_end_element.is_none();
    let dynamic_aabbs = generate_dynamic_aabbs(
        if bounds_overlap {
            start_point_bounds
        } else {
            start_element_bounds
        },
        if bounds_overlap {
            end_point_bounds
        } else {
            end_element_bounds
        },
        common_bounds_,
        if bounds_overlap {
            offset_from_heading(
                start_heading,
                if neither_hovered { 0.0 } else { base_padding },
                0.0,
            )
        } else {
            offset_from_heading(
                start_heading,
                if neither_hovered {
                    0.0
                } else {
                    base_padding - start_arrowhead_pad
                },
                base_padding,
            )
        },
        if bounds_overlap {
            offset_from_heading(
                end_heading,
                if neither_hovered { 0.0 } else { base_padding },
                0.0,
            )
        } else {
            offset_from_heading(
                end_heading,
                if neither_hovered {
                    0.0
                } else {
                    base_padding - end_arrowhead_pad
                },
                base_padding,
            )
        },
        bounds_overlap,
        hovered_start_element.as_ref().map(|element| element.aabb(None)),
        hovered_end_element.as_ref().map(|element| element.aabb(None)),
    );

    let start_dongle_position =
        dongle_position(dynamic_aabbs[0], start_heading, start_global_point);
    let end_dongle_position = dongle_position(dynamic_aabbs[1], end_heading, end_global_point);

    ElbowArrowData {
        dynamic_aabbs,
        start_dongle_position,
        start_global_point,
        start_heading,
        end_dongle_position,
        end_global_point,
        end_heading,
        common_bounds: common_bounds_,
        hovered_start_element,
        hovered_end_element,
    }
}

/// Run the grid search between the dongles. Returns the raw global route
/// including the true endpoints, or `None` when no route exists.
pub(crate) fn route_elbow_arrow(
    state: &ElbowArrowState,
    data: &ElbowArrowData,
    mut sink: Option<&mut dyn DebugSink>,
) -> Option<Vec<Point>> {
    let mut grid = calculate_grid(
        &data.dynamic_aabbs,
        data.start_dongle_position,
        data.start_heading,
        data.end_dongle_position,
        data.end_heading,
        data.common_bounds,
    );

    if let Some(sink) = sink.as_deref_mut() {
        sink.bounds(data.dynamic_aabbs[0], "corridor:start");
        sink.bounds(data.dynamic_aabbs[1], "corridor:end");
        sink.bounds(data.common_bounds, "common");
    }

    let start_dongle = grid.node_index_at_point(data.start_dongle_position);
    let end_dongle = grid.node_index_at_point(data.end_dongle_position);

    // The true endpoints themselves may not be stepped on while bound.
    if let Some(end_node) = grid.node_index_at_point(data.end_global_point)
        && data.hovered_end_element.is_some()
    {
        grid.data[end_node].closed = true;
    }
    if let Some(start_node) = grid.node_index_at_point(data.start_global_point)
        && state.start_binding.is_some()
    {
        grid.data[start_node].closed = true;
    }

    let dongle_overlap = match (start_dongle, end_dongle) {
        (Some(start), Some(end)) => {
            point_inside_bounds(grid.data[start].pos, data.dynamic_aabbs[1])
                || point_inside_bounds(grid.data[end].pos, data.dynamic_aabbs[0])
        }
        _ => false,
    };

    let start_idx = start_dongle.or_else(|| grid.node_index_at_point(data.start_global_point))?;
    let end_idx = end_dongle.or_else(|| grid.node_index_at_point(data.end_global_point))?;

    let obstacles: &[Bounds] = if dongle_overlap {
        &[]
    } else {
        &data.dynamic_aabbs
    };
    let path = astar(
        start_idx,
        end_idx,
        &mut grid,
        data.start_heading,
        data.end_heading,
        obstacles,
    )?;

    let mut points: Vec<Point> = path;
    if start_dongle.is_some() {
        points.insert(0, data.start_global_point);
    }
    if end_dongle.is_some() {
        points.push(data.end_global_point);
    }

    if let Some(sink) = sink.as_deref_mut() {
        for window in points.windows(2) {
            sink.segment(window[0], window[1], "route");
        }
    }

    Some(points)
}

/// Every consecutive pair differs on at most one axis (within tolerance).
pub fn validate_elbow_points(points: &[Point], tolerance: f64) -> bool {
    points
        .windows(2)
        .all(|w| (w[1].0 - w[0].0).abs() < tolerance || (w[1].1 - w[0].1).abs() < tolerance)
}

/// Rebase a global point run onto its own first point and assemble the
/// commit payload.
pub(crate) fn normalize_arrow_element_update(
    global: &[Point],
    next_fixed_segments: Vec<FixedSegment>,
    start_is_special: bool,
    end_is_special: bool,
    config: &RoutingConfig,
) -> ArrowUpdate {
    let max_pos = config.max_pos;
    let offset_x = global[0].0;
    let offset_y = global[0].1;
    let points: Vec<Point> = global
        .iter()
        .map(|p| {
            (
                (p.0 - offset_x).clamp(-max_pos, max_pos),
                (p.1 - offset_y).clamp(-max_pos, max_pos),
            )
        })
        .collect();
    let (width, height) = size_from_points(&points);

    ArrowUpdate {
        points: Some(points),
        x: Some(offset_x.clamp(-max_pos, max_pos)),
        y: Some(offset_y.clamp(-max_pos, max_pos)),
        width: Some(width),
        height: Some(height),
        fixed_segments: Some(next_fixed_segments),
        start_is_special: Some(start_is_special),
        end_is_special: Some(end_is_special),
        start_binding: None,
        end_binding: None,
    }
}

/// Route with no fixed segments: search, simplify, normalize.
fn route_and_normalize(
    state: &ElbowArrowState,
    data: &ElbowArrowData,
    config: &RoutingConfig,
    sink: Option<&mut dyn DebugSink>,
) -> Option<ArrowUpdate> {
    let path = route_elbow_arrow(state, data, sink)?;
    Some(normalize_arrow_element_update(
        &corner_points(remove_short_segments(path)),
        Vec::new(),
        false,
        false,
        config,
    ))
}

/// Recompute an elbow arrow's point run for a set of updates.
///
/// Dispatches across the edit classes: renormalization, plain re-route,
/// fixed segment release, fixed segment move, resize passthrough and
/// endpoint drag. A failed search is non-fatal: it is logged and an empty
/// update is returned so the previous geometry stays committed.
pub fn update_elbow_arrow_points(
    arrow: &ArrowElement,
    scene: &Scene,
    updates: ElbowArrowUpdates,
    options: &RouteOptions,
    config: &RoutingConfig,
    mut sink: Option<&mut dyn DebugSink>,
) -> Result<ArrowUpdate, EngineError> {
    if arrow.points.len() < 2 {
        return Ok(ArrowUpdate {
            points: updates.points,
            ..ArrowUpdate::default()
        });
    }

    let max_pos = config.max_pos;
    let mut arrow = arrow.clone();
    arrow.x = arrow.x.clamp(-max_pos, max_pos);
    arrow.y = arrow.y.clamp(-max_pos, max_pos);
    let mut updates = updates;
    if let Some(points) = updates.points.as_mut() {
        if points.len() != arrow.points.len() && points.len() != 2 {
            return Err(EngineError::InvalidPointUpdate {
                expected: arrow.points.len(),
                got: points.len(),
            });
        }
        for p in points.iter_mut() {
            *p = (p.0.clamp(-max_pos, max_pos), p.1.clamp(-max_pos, max_pos));
        }
    }
    if let Some(segments) = updates.fixed_segments.as_ref() {
        for segment in segments {
            if segment.start.0 != segment.end.0 && segment.start.1 != segment.end.1 {
                return Err(EngineError::SkewedFixedSegment {
                    index: segment.index,
                });
            }
        }
    }

    let fixed_segments: Vec<FixedSegment> = updates
        .fixed_segments
        .clone()
        .or_else(|| arrow.fixed_segments.clone())
        .unwrap_or_default();

    let updated_points: Vec<Point> = match &updates.points {
        Some(points) if points.len() == 2 => {
            let mut merged = arrow.points.clone();
            merged[0] = points[0];
            let last = merged.len() - 1;
            merged[last] = points[1];
            merged
        }
        Some(points) => points.clone(),
        None => arrow.points.clone(),
    };

    let start_binding = updates
        .start_binding
        .clone()
        .unwrap_or_else(|| arrow.start_binding.clone());
    let end_binding = updates
        .end_binding
        .clone()
        .unwrap_or_else(|| arrow.end_binding.clone());
    let start_element = start_binding
        .as_ref()
        .and_then(|binding| scene.get_shape(&binding.element_id));
    let end_element = end_binding
        .as_ref()
        .and_then(|binding| scene.get_shape(&binding.element_id));
    let points_valid = validate_elbow_points(&updated_points, config.dedup_threshold);

    // A stale binding (or an empty snapshot) means the unbind pass has not
    // caught up yet; renormalize the raw points and wait for it.
    let stale_start = start_binding.is_some() && start_element.is_none();
    let stale_end = end_binding.is_some() && end_element.is_none();
    if points_valid && (stale_start || stale_end || scene.is_empty()) {
        let global: Vec<Point> = updated_points
            .iter()
            .map(|p| (arrow.x + p.0, arrow.y + p.1))
            .collect();
        return Ok(normalize_arrow_element_update(
            &global,
            arrow.fixed_segments.clone().unwrap_or_default(),
            arrow.start_is_special,
            arrow.end_is_special,
            config,
        ));
    }

    let mut state = ElbowArrowState::from(&arrow);
    state.start_binding = start_binding;
    state.end_binding = end_binding;

    // Renormalization: nothing changed, merge collinear/short segments.
    if updates.points.is_none()
        && updates.fixed_segments.is_none()
        && updates.start_binding.is_none()
        && updates.end_binding.is_none()
    {
        return Ok(handle_segment_renormalization(&arrow, scene, config, sink));
    }

    // Short circuit on no-op to avoid a wasted search.
    let bindings_unchanged = updates.start_binding.as_ref() == Some(&arrow.start_binding)
        && updates.end_binding.as_ref() == Some(&arrow.end_binding);
    let points_unchanged = updates.points.as_ref().is_none_or(|points| {
        points.len() == arrow.points.len()
            && points
                .iter()
                .zip(arrow.points.iter())
                .all(|(a, b)| points_equal(*a, *b))
    });
    if bindings_unchanged && points_unchanged && points_valid {
        return Ok(ArrowUpdate::default());
    }

    let data = elbow_arrow_data(&state, scene, &updated_points, options, config);
    debug!(
        start_heading = ?data.start_heading,
        end_heading = ?data.end_heading,
        "routing elbow arrow"
    );

    if fixed_segments.is_empty() {
        return match route_and_normalize(&state, &data, config, sink) {
            Some(update) => Ok(update),
            None => {
                warn!("no elbow route found; keeping previous geometry");
                Ok(ArrowUpdate::default())
            }
        };
    }

    if arrow.fixed_segments.as_ref().map_or(0, Vec::len) > fixed_segments.len() {
        return Ok(handle_segment_release(
            &arrow,
            &fixed_segments,
            scene,
            config,
            sink,
        ));
    }

    if updates.points.is_none() {
        return Ok(handle_segment_move(
            &arrow,
            fixed_segments,
            data.start_heading,
            data.end_heading,
            data.hovered_start_element.as_ref(),
            data.hovered_end_element.as_ref(),
            config,
        ));
    }

    if updates.fixed_segments.is_some() {
        // Resize: the host supplies consistent points and segments.
        return Ok(ArrowUpdate {
            points: Some(updated_points),
            fixed_segments: Some(fixed_segments),
            ..ArrowUpdate::default()
        });
    }

    Ok(handle_endpoint_drag(
        &arrow,
        &updated_points,
        fixed_segments,
        data.start_heading,
        data.end_heading,
        data.start_global_point,
        data.end_global_point,
        data.hovered_start_element.as_ref(),
        data.hovered_end_element.as_ref(),
        config,
    ))
}
