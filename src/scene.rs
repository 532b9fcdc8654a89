//! Scene element model: shapes, arrows, bindings and the id → element
//! snapshot map the routing engine reads from.
//!
//! The engine never mutates elements in place. Every routed arrow is applied
//! through a single [`Scene::commit_arrow`] call which replaces the affected
//! fields atomically and bumps the element version used by external caches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds, Point, offset_bounds, rotate_point};

pub type ElementId = String;

/// Geometric kind of a bindable shape. `Rectangle` covers every
/// rectanguloid element (images, text blocks, frames and the like).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Diamond,
    Ellipse,
}

/// Back-reference kept on a shape for each element bound to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundElementRef {
    pub id: ElementId,
}

/// Arrow endpoint attachment.
///
/// `focus`/`gap` drive simple arrows; `fixed_point` is present exactly for
/// elbow arrows and holds the element-relative outline ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub element_id: ElementId,
    pub focus: f64,
    pub gap: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_point: Option<[f64; 2]>,
}

/// A user-pinned straight run of an elbow arrow. `index` addresses the
/// segment ending at `points[index]`; `start`/`end` are local points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedSegment {
    pub index: usize,
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeElement {
    pub id: ElementId,
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub bound_elements: Vec<BoundElementRef>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub version: u64,
}

impl ShapeElement {
    pub fn center(&self) -> Point {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Unrotated bounds.
    pub fn bounds(&self) -> Bounds {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Bounds of the rotated shape, optionally grown per edge
    /// (`[up, right, down, left]`).
    pub fn aabb(&self, offset: Option<[f64; 4]>) -> Bounds {
        let center = self.center();
        let corners = [
            rotate_point((self.x, self.y), center, self.angle),
            rotate_point((self.x + self.width, self.y), center, self.angle),
            rotate_point((self.x + self.width, self.y + self.height), center, self.angle),
            rotate_point((self.x, self.y + self.height), center, self.angle),
        ];
        let bounds = [
            corners.iter().fold(f64::MAX, |acc, c| acc.min(c.0)),
            corners.iter().fold(f64::MAX, |acc, c| acc.min(c.1)),
            corners.iter().fold(f64::MIN, |acc, c| acc.max(c.0)),
            corners.iter().fold(f64::MIN, |acc, c| acc.max(c.1)),
        ];
        match offset {
            Some(offset) => offset_bounds(bounds, offset),
            None => bounds,
        }
    }

    pub fn has_bound_element(&self, id: &str) -> bool {
        self.bound_elements.iter().any(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrowElement {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
    /// Local points; `points[0]` is always `(0, 0)`.
    pub points: Vec<Point>,
    #[serde(default)]
    pub elbowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_binding: Option<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_binding: Option<Binding>,
    #[serde(default)]
    pub start_arrowhead: bool,
    #[serde(default = "default_true")]
    pub end_arrowhead: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_segments: Option<Vec<FixedSegment>>,
    #[serde(default)]
    pub start_is_special: bool,
    #[serde(default)]
    pub end_is_special: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub version: u64,
}

fn default_true() -> bool {
    true
}

impl ArrowElement {
    pub fn to_global(&self, p: Point) -> Point {
        (self.x + p.0, self.y + p.1)
    }

    pub fn to_local(&self, p: Point) -> Point {
        (p.0 - self.x, p.1 - self.y)
    }

    /// Center of the point run in global coordinates, the pivot for the
    /// arrow's own rotation.
    pub fn global_center(&self) -> Point {
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in &self.points {
            min_x = min_x.min(p.0);
            min_y = min_y.min(p.1);
            max_x = max_x.max(p.0);
            max_y = max_y.max(p.1);
        }
        if self.points.is_empty() {
            (self.x, self.y)
        } else {
            (
                self.x + (min_x + max_x) / 2.0,
                self.y + (min_y + max_y) / 2.0,
            )
        }
    }

    /// Global coordinates of `points[index]`, honoring the arrow's angle.
    pub fn point_at_index_global(&self, index: usize) -> Point {
        let p = self.points[index];
        rotate_point(self.to_global(p), self.global_center(), self.angle)
    }

    /// Inverse of [`Self::point_at_index_global`] for an arbitrary global
    /// point.
    pub fn point_from_absolute(&self, global: Point) -> Point {
        let unrotated = rotate_point(global, self.global_center(), -self.angle);
        self.to_local(unrotated)
    }

    /// Bounds of the global point run.
    pub fn aabb(&self, offset: Option<[f64; 4]>) -> Bounds {
        let mut bounds = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
        for p in &self.points {
            let g = self.to_global(*p);
            bounds[0] = bounds[0].min(g.0);
            bounds[1] = bounds[1].min(g.1);
            bounds[2] = bounds[2].max(g.0);
            bounds[3] = bounds[3].max(g.1);
        }
        if self.points.is_empty() {
            bounds = [self.x, self.y, self.x, self.y];
        }
        match offset {
            Some(offset) => offset_bounds(bounds, offset),
            None => bounds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Element {
    Arrow(ArrowElement),
    Shape(ShapeElement),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Shape(shape) => &shape.id,
            Element::Arrow(arrow) => &arrow.id,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            Element::Shape(shape) => shape.is_deleted,
            Element::Arrow(arrow) => arrow.is_deleted,
        }
    }

    pub fn as_shape(&self) -> Option<&ShapeElement> {
        match self {
            Element::Shape(shape) => Some(shape),
            Element::Arrow(_) => None,
        }
    }

    pub fn as_arrow(&self) -> Option<&ArrowElement> {
        match self {
            Element::Arrow(arrow) => Some(arrow),
            Element::Shape(_) => None,
        }
    }
}

/// Partial update produced by one routing/binding pass. Fields left `None`
/// keep the arrow's current value; an empty `fixed_segments` vector clears
/// the pins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrowUpdate {
    pub points: Option<Vec<Point>>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub fixed_segments: Option<Vec<FixedSegment>>,
    pub start_is_special: Option<bool>,
    pub end_is_special: Option<bool>,
    pub start_binding: Option<Option<Binding>>,
    pub end_binding: Option<Option<Binding>>,
}

impl ArrowUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ArrowUpdate::default()
    }
}

/// Insertion-ordered element snapshot. Iteration order doubles as z-order:
/// earlier elements render below later ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Element>", into = "Vec<Element>")]
pub struct Scene {
    elements: Vec<Element>,
    index: HashMap<ElementId, usize>,
}

impl From<Vec<Element>> for Scene {
    fn from(elements: Vec<Element>) -> Self {
        let mut scene = Scene::default();
        for element in elements {
            scene.insert(element);
        }
        scene
    }
}

impl From<Scene> for Vec<Element> {
    fn from(scene: Scene) -> Self {
        scene.elements
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element: Element) {
        match self.index.get(element.id()) {
            Some(&slot) => self.elements[slot] = element,
            None => {
                self.index.insert(element.id().to_string(), self.elements.len());
                self.elements.push(element);
            }
        }
    }

    /// Number of non-deleted elements.
    pub fn len(&self) -> usize {
        self.elements.iter().filter(|e| !e.is_deleted()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-deleted element lookup.
    pub fn get(&self, id: &str) -> Option<&Element> {
        self.get_including_deleted(id).filter(|e| !e.is_deleted())
    }

    /// Lookup that also surfaces deleted elements, needed by unbind cleanup.
    pub fn get_including_deleted(&self, id: &str) -> Option<&Element> {
        self.index.get(id).map(|&slot| &self.elements[slot])
    }

    /// Non-deleted bindable shape lookup. A stale or non-shape id yields
    /// `None`, which callers treat as "no binding".
    pub fn get_shape(&self, id: &str) -> Option<&ShapeElement> {
        self.get(id).and_then(Element::as_shape)
    }

    pub fn get_arrow(&self, id: &str) -> Option<&ArrowElement> {
        self.get(id).and_then(Element::as_arrow)
    }

    /// Non-deleted elements in z-order (back first).
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| !e.is_deleted())
    }

    /// Atomically apply `update` to the arrow and bump its version.
    pub fn commit_arrow(&mut self, id: &str, update: ArrowUpdate) {
        let Some(&slot) = self.index.get(id) else {
            return;
        };
        let Element::Arrow(arrow) = &mut self.elements[slot] else {
            return;
        };
        if let Some(points) = update.points {
            arrow.points = points;
        }
        if let Some(x) = update.x {
            arrow.x = x;
        }
        if let Some(y) = update.y {
            arrow.y = y;
        }
        if let Some(width) = update.width {
            arrow.width = width;
        }
        if let Some(height) = update.height {
            arrow.height = height;
        }
        if let Some(segments) = update.fixed_segments {
            arrow.fixed_segments = if segments.is_empty() {
                None
            } else {
                Some(segments)
            };
        }
        if let Some(special) = update.start_is_special {
            arrow.start_is_special = special;
        }
        if let Some(special) = update.end_is_special {
            arrow.end_is_special = special;
        }
        if let Some(binding) = update.start_binding {
            arrow.start_binding = binding;
        }
        if let Some(binding) = update.end_binding {
            arrow.end_binding = binding;
        }
        arrow.version += 1;
    }

    /// Replace a shape's back-reference list and bump its version.
    pub fn commit_shape_bound_elements(&mut self, id: &str, bound: Vec<BoundElementRef>) {
        let Some(&slot) = self.index.get(id) else {
            return;
        };
        let Element::Shape(shape) = &mut self.elements[slot] else {
            return;
        };
        shape.bound_elements = bound;
        shape.version += 1;
    }

    /// Geometry-only shape mutation used by hosts when dragging/resizing.
    pub fn commit_shape_geometry(&mut self, id: &str, x: f64, y: f64, width: f64, height: f64) {
        let Some(&slot) = self.index.get(id) else {
            return;
        };
        let Element::Shape(shape) = &mut self.elements[slot] else {
            return;
        };
        shape.x = x;
        shape.y = y;
        shape.width = width;
        shape.height = height;
        shape.version += 1;
    }

    /// Mark an element deleted without removing it from the snapshot.
    pub fn mark_deleted(&mut self, id: &str) {
        let Some(&slot) = self.index.get(id) else {
            return;
        };
        match &mut self.elements[slot] {
            Element::Shape(shape) => {
                shape.is_deleted = true;
                shape.version += 1;
            }
            Element::Arrow(arrow) => {
                arrow.is_deleted = true;
                arrow.version += 1;
            }
        }
    }
}
