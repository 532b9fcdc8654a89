use orthoroute::binding::{self, Edge};
use orthoroute::config::RoutingConfig;
use orthoroute::geometry::Point;
use orthoroute::route::heap::BinaryHeap;
use orthoroute::route::{ElbowArrowUpdates, RouteOptions, update_elbow_arrow_points};
use orthoroute::scene::{
    ArrowElement, Element, Scene, ShapeElement, ShapeKind,
};

fn rectangle(id: &str, x: f64, y: f64, width: f64, height: f64) -> Element {
    Element::Shape(ShapeElement {
        id: id.to_string(),
        kind: ShapeKind::Rectangle,
        x,
        y,
        width,
        height,
        angle: 0.0,
        bound_elements: Vec::new(),
        is_deleted: false,
        version: 0,
    })
}

fn elbow_arrow(id: &str, x: f64, y: f64, points: Vec<Point>) -> ArrowElement {
    let (width, height) = orthoroute::geometry::size_from_points(&points);
    ArrowElement {
        id: id.to_string(),
        x,
        y,
        width,
        height,
        angle: 0.0,
        points,
        elbowed: true,
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

fn assert_points_close(actual: &[Point], expected: &[Point]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "point count mismatch: {actual:?} vs {expected:?}"
    );
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a.0 - e.0).abs() < 1e-6 && (a.1 - e.1).abs() < 1e-6,
            "point mismatch: {actual:?} vs {expected:?}"
        );
    }
}

fn assert_orthogonal(points: &[Point]) {
    for w in points.windows(2) {
        let dx = (w[1].0 - w[0].0).abs();
        let dy = (w[1].1 - w[0].1).abs();
        assert!(
            dx < 1e-6 || dy < 1e-6,
            "diagonal segment in {points:?}"
        );
    }
}

fn assert_no_reversal(points: &[Point]) {
    use orthoroute::heading::Heading;
    for w in points.windows(3) {
        let h1 = Heading::from_points(w[1], w[0]);
        let h2 = Heading::from_points(w[2], w[1]);
        assert_ne!(h1.flip(), h2, "reversal in {points:?}");
    }
}

/// Route an unbound elbow arrow between two global points.
fn route_unbound(start: Point, end: Point) -> (Vec<Point>, f64, f64, f64, f64) {
    let config = RoutingConfig::default();
    let scene = Scene::new();
    let arrow = elbow_arrow("a", start.0, start.1, vec![(0.0, 0.0), (1.0, 1.0)]);
    let update = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            points: Some(vec![(0.0, 0.0), (end.0 - start.0, end.1 - start.1)]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();
    (
        update.points.unwrap(),
        update.x.unwrap(),
        update.y.unwrap(),
        update.width.unwrap(),
        update.height.unwrap(),
    )
}

#[test]
fn unbound_elbow_arrow_routes_orthogonally() {
    // Scenario: global (-45, -100.1) to (45, 99.9).
    let (points, x, y, width, height) = route_unbound((-45.0, -100.1), (45.0, 99.9));
    assert_points_close(
        &points,
        &[(0.0, 0.0), (0.0, 100.0), (90.0, 100.0), (90.0, 200.0)],
    );
    assert!((x - -45.0).abs() < 1e-9);
    assert!((y - -100.1).abs() < 1e-9);
    assert!((width - 90.0).abs() < 1e-6);
    assert!((height - 200.0).abs() < 1e-6);
}

fn bound_pair_scene() -> (Scene, ArrowElement) {
    let config = RoutingConfig::default();
    let mut scene = Scene::new();
    scene.insert(rectangle("r1", -150.0, -150.0, 100.0, 100.0));
    scene.insert(rectangle("r2", 50.0, 50.0, 100.0, 100.0));
    scene.insert(Element::Arrow(elbow_arrow(
        "a",
        -45.0,
        -100.1,
        vec![(0.0, 0.0), (90.0, 200.0)],
    )));
    binding::bind_arrow(&mut scene, "a", "r1", Edge::Start, &config);
    binding::bind_arrow(&mut scene, "a", "r2", Edge::End, &config);
    let arrow = scene.get_arrow("a").unwrap().clone();
    (scene, arrow)
}

#[test]
fn bound_elbow_arrow_routes_between_rectangles() {
    // Scenario: rectangles at (-150, -150) and (50, 50), arrow bound on
    // both ends.
    let config = RoutingConfig::default();
    let (scene, arrow) = bound_pair_scene();
    assert!(arrow.start_binding.is_some());
    assert!(arrow.end_binding.is_some());

    let update = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            points: Some(vec![(0.0, 0.0), (90.0, 200.0)]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();

    let points = update.points.unwrap();
    assert_points_close(
        &points,
        &[(0.0, 0.0), (45.0, 0.0), (45.0, 200.0), (90.0, 200.0)],
    );
    assert_orthogonal(&points);
    assert_no_reversal(&points);
}

#[test]
fn routing_is_idempotent() {
    let config = RoutingConfig::default();
    let (scene, arrow) = bound_pair_scene();
    let updates = || ElbowArrowUpdates {
        points: Some(vec![(0.0, 0.0), (90.0, 200.0)]),
        ..ElbowArrowUpdates::default()
    };
    let first = update_elbow_arrow_points(
        &arrow,
        &scene,
        updates(),
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();
    let second = update_elbow_arrow_points(
        &arrow,
        &scene,
        updates(),
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();
    // Bit-identical output for identical input.
    assert_eq!(first.points, second.points);
    assert_eq!(first.x, second.x);
    assert_eq!(first.y, second.y);
}

#[test]
fn routes_stay_orthogonal_across_configurations() {
    let cases = [
        ((-45.0, -100.1), (45.0, 99.9)),
        ((0.0, 0.0), (250.0, 200.0)),
        ((0.0, 0.0), (-180.0, 75.0)),
        ((10.0, 10.0), (10.0, 310.0)),
        ((5.0, 5.0), (305.0, 5.0)),
    ];
    for (start, end) in cases {
        let (points, ..) = route_unbound(start, end);
        assert!(points.len() >= 2);
        assert_orthogonal(&points);
        assert_no_reversal(&points);
    }
}

#[test]
fn binding_references_stay_symmetric() {
    let (mut scene, arrow) = bound_pair_scene();
    assert_eq!(
        arrow.start_binding.as_ref().unwrap().element_id,
        "r1"
    );
    assert!(scene.get_shape("r1").unwrap().has_bound_element("a"));
    assert!(scene.get_shape("r2").unwrap().has_bound_element("a"));

    binding::unbind_arrow(&mut scene, "a", Edge::End);
    assert!(scene.get_arrow("a").unwrap().end_binding.is_none());
    assert!(!scene.get_shape("r2").unwrap().has_bound_element("a"));
    // The start side is untouched.
    assert!(scene.get_arrow("a").unwrap().start_binding.is_some());
    assert!(scene.get_shape("r1").unwrap().has_bound_element("a"));
}

#[test]
fn fixed_point_ratios_never_sit_on_the_midline() {
    for offset in [-0.00009, -0.00005, 0.0, 0.00005, 0.00009] {
        let normalized = binding::normalize_fixed_point([0.5 + offset, 0.25]);
        assert!(
            (normalized[0] - 0.5).abs() > 0.00005,
            "ratio {offset} left at {}",
            normalized[0]
        );
    }
}

#[test]
fn heap_pops_random_scores_in_order() {
    // Pushing N items with pseudo-random scores then popping yields
    // non-decreasing order for all N.
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    for n in 0..48usize {
        let mut heap: BinaryHeap<(usize, u64), (), _> =
            BinaryHeap::new(|_: &(), (_, s): (usize, u64)| s as f64);
        for i in 0..n {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            heap.push((i, state % 10_000), &());
        }
        let mut previous = 0u64;
        for _ in 0..n {
            let (_, score) = heap.pop(&()).unwrap();
            assert!(score >= previous);
            previous = score;
        }
        assert!(heap.pop(&()).is_none());
    }
}

#[test]
fn binding_gap_floors_at_sixteen_for_small_squares() {
    let config = RoutingConfig::default();
    let Element::Shape(square) = rectangle("s", 0.0, 0.0, 40.0, 40.0) else {
        unreachable!();
    };
    assert_eq!(
        binding::max_binding_gap(&square, 40.0, 40.0, 1.0, &config.binding),
        16.0
    );
}

#[test]
fn invalid_point_update_fails_fast() {
    let config = RoutingConfig::default();
    let scene = Scene::new();
    let arrow = elbow_arrow(
        "a",
        0.0,
        0.0,
        vec![(0.0, 0.0), (50.0, 0.0), (50.0, 50.0), (100.0, 50.0)],
    );
    let result = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            // Neither 2 points nor the current count of 4.
            points: Some(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions::default(),
        &config,
        None,
    );
    assert!(result.is_err());
}

#[test]
fn stale_binding_is_treated_as_unbound() {
    let config = RoutingConfig::default();
    let (mut scene, arrow) = bound_pair_scene();
    scene.mark_deleted("r2");

    // The routing pass must not fail; it renormalizes and leaves the stale
    // reference for the unbind pass.
    let update = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            points: Some(vec![(0.0, 0.0), (90.0, 200.0)]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();
    assert!(update.points.is_some());
}

#[test]
fn bound_arrow_follows_shape_moves() {
    let config = RoutingConfig::default();
    let (mut scene, _) = bound_pair_scene();

    // Move the end rectangle and update its dependents.
    scene.commit_shape_geometry("r2", 150.0, 50.0, 100.0, 100.0);
    binding::update_bound_elements(&mut scene, "r2", None, &config);

    let arrow = scene.get_arrow("a").unwrap();
    assert_orthogonal(&arrow.points);
    assert_no_reversal(&arrow.points);
    // The end point tracked the shape's left edge to its new position.
    let end_global = (
        arrow.x + arrow.points[arrow.points.len() - 1].0,
        arrow.y + arrow.points[arrow.points.len() - 1].1,
    );
    assert!(
        (end_global.0 - 145.0).abs() < 1.0,
        "end did not follow: {end_global:?}"
    );
}

#[test]
fn pinned_segment_move_overrides_points_in_place() {
    let config = RoutingConfig::default();
    let scene = Scene::new();
    let mut arrow = elbow_arrow(
        "a",
        -45.0,
        -100.1,
        vec![(0.0, 0.0), (45.0, 0.0), (45.0, 200.0), (90.0, 200.0)],
    );

    // Pin the middle vertical run and drag it 10px right.
    let update = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            fixed_segments: Some(vec![orthoroute::scene::FixedSegment {
                index: 2,
                start: (55.0, 0.0),
                end: (55.0, 200.0),
            }]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();

    let points = update.points.clone().unwrap();
    assert_points_close(
        &points,
        &[(0.0, 0.0), (55.0, 0.0), (55.0, 200.0), (90.0, 200.0)],
    );
    assert_orthogonal(&points);
    let segments = update.fixed_segments.clone().unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].index, 2);

    // Now drag the far endpoint; the pinned run must keep its x.
    arrow.points = points;
    arrow.fixed_segments = Some(segments);
    let dragged = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            points: Some(vec![(0.0, 0.0), (100.0, 210.0)]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();
    let dragged_points = dragged.points.unwrap();
    assert_orthogonal(&dragged_points);
    let dragged_segments = dragged.fixed_segments.unwrap();
    assert_eq!(dragged_segments.len(), 1);
    let pin = &dragged_segments[0];
    assert!(
        (pin.start.0 - pin.end.0).abs() < 1e-6,
        "pinned run lost its orientation: {pin:?}"
    );
    assert!(
        (pin.start.0 - 55.0).abs() < 1e-6,
        "pinned run did not hold its position: {pin:?}"
    );
}

#[test]
fn releasing_a_pin_restores_the_freed_stretch() {
    let config = RoutingConfig::default();
    let scene = Scene::new();
    let mut arrow = elbow_arrow(
        "a",
        0.0,
        0.0,
        vec![
            (0.0, 0.0),
            (40.0, 0.0),
            (40.0, 100.0),
            (80.0, 100.0),
            (80.0, 200.0),
            (120.0, 200.0),
        ],
    );
    let pin = |index: usize, start: (f64, f64), end: (f64, f64)| orthoroute::scene::FixedSegment {
        index,
        start,
        end,
    };
    arrow.fixed_segments = Some(vec![
        pin(2, (40.0, 0.0), (40.0, 100.0)),
        pin(4, (80.0, 100.0), (80.0, 200.0)),
    ]);

    // Drop the second pin; the freed tail re-routes from a default route.
    let update = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            fixed_segments: Some(vec![pin(2, (40.0, 0.0), (40.0, 100.0))]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();

    let points = update.points.unwrap();
    assert_orthogonal(&points);
    assert_no_reversal(&points);
    let segments = update.fixed_segments.unwrap();
    assert_eq!(segments.len(), 1);
    // The surviving pin still holds its vertical run at x = 40.
    assert!((segments[0].start.0 - 40.0).abs() < 1e-6);
    assert!((segments[0].end.0 - 40.0).abs() < 1e-6);
}

#[test]
fn renormalization_merges_collinear_runs() {
    let config = RoutingConfig::default();
    let scene = Scene::new();
    let mut arrow = elbow_arrow(
        "a",
        -45.0,
        -100.1,
        vec![
            (0.0, 0.0),
            (45.0, 0.0),
            (45.0, 100.0),
            (45.0, 200.0),
            (90.0, 200.0),
        ],
    );
    // The pin sits on a run that merges with its collinear neighbor, so it
    // is released and the arrow re-routes from scratch.
    arrow.fixed_segments = Some(vec![orthoroute::scene::FixedSegment {
        index: 2,
        start: (45.0, 0.0),
        end: (45.0, 100.0),
    }]);

    let update = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates::default(),
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();
    let points = update.points.unwrap();
    assert_orthogonal(&points);
    assert_no_reversal(&points);
    assert!(points.len() <= 4, "collinear run not merged: {points:?}");
    assert_eq!(update.fixed_segments, Some(Vec::new()));
}

#[test]
fn dragging_an_endpoint_into_a_shape_snaps_to_its_outline() {
    let config = RoutingConfig::default();
    let mut scene = Scene::new();
    scene.insert(rectangle("r", 0.0, 0.0, 100.0, 100.0));
    let arrow = elbow_arrow("a", 95.0, 50.0, vec![(0.0, 0.0), (205.0, 0.0)]);

    let update = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            points: Some(vec![(0.0, 0.0), (205.0, 0.0)]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions {
            is_dragging: true,
            zoom: 1.0,
        },
        &config,
        None,
    )
    .unwrap();

    // Start was inside the shape near its right edge: snapped just outside
    // at the fixed binding distance, on the mid-snap row.
    assert!((update.x.unwrap() - 105.0).abs() < 1e-6, "{update:?}");
    assert!((update.y.unwrap() - 49.9).abs() < 1e-6, "{update:?}");
}

#[test]
fn simple_arrow_endpoint_tracks_focus_and_gap() {
    let config = RoutingConfig::default();
    let mut scene = Scene::new();
    scene.insert(rectangle("r", 0.0, 0.0, 100.0, 100.0));
    let mut simple = elbow_arrow("a", 120.0, 50.0, vec![(0.0, 0.0), (80.0, 0.0)]);
    simple.elbowed = false;
    scene.insert(Element::Arrow(simple));
    binding::bind_arrow(&mut scene, "a", "r", Edge::Start, &config);

    let gap = scene
        .get_arrow("a")
        .unwrap()
        .start_binding
        .as_ref()
        .unwrap()
        .gap;
    assert!((gap - 20.0).abs() < 1e-6);

    scene.commit_shape_geometry("r", 0.0, 30.0, 100.0, 100.0);
    binding::update_bound_elements(&mut scene, "r", None, &config);

    let arrow = scene.get_arrow("a").unwrap();
    let start_global = (arrow.x + arrow.points[0].0, arrow.y + arrow.points[0].1);
    let shape = scene.get_shape("r").unwrap();
    let distance = binding::distance_to_shape(shape, start_global);
    assert!(
        (distance - gap).abs() < 0.5,
        "endpoint lost its gap: distance {distance}, gap {gap}"
    );
}

#[test]
fn debug_sink_collects_corridors_and_route() {
    let config = RoutingConfig::default();
    let scene = Scene::new();
    let arrow = elbow_arrow("a", -45.0, -100.1, vec![(0.0, 0.0), (90.0, 200.0)]);
    let mut sink = orthoroute::debug::SegmentCollector::default();
    update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            points: Some(vec![(0.0, 0.0), (90.0, 200.0)]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions::default(),
        &config,
        Some(&mut sink),
    )
    .unwrap();
    assert!(sink.segments.iter().any(|(_, _, label)| label == "corridor:start"));
    assert!(sink.segments.iter().any(|(_, _, label)| label == "route"));
}

#[test]
fn version_bumps_once_per_commit() {
    let config = RoutingConfig::default();
    let (mut scene, arrow) = bound_pair_scene();
    let version_before = arrow.version;
    let update = update_elbow_arrow_points(
        &arrow,
        &scene,
        ElbowArrowUpdates {
            points: Some(vec![(0.0, 0.0), (90.0, 200.0)]),
            ..ElbowArrowUpdates::default()
        },
        &RouteOptions::default(),
        &config,
        None,
    )
    .unwrap();
    scene.commit_arrow("a", update);
    assert_eq!(scene.get_arrow("a").unwrap().version, version_before + 1);
}
