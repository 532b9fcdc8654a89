//! Injectable diagnostics sink.
//!
//! Developer tooling can pass a collector into routing entry points to
//! receive the intermediate geometry (corridors, grid lines, raw search
//! paths). The sink is always optional and never a process-wide singleton.

use crate::geometry::{Bounds, Point};

pub trait DebugSink {
    fn segment(&mut self, from: Point, to: Point, label: &str);

    fn bounds(&mut self, bounds: Bounds, label: &str) {
        let [min_x, min_y, max_x, max_y] = bounds;
        self.segment((min_x, min_y), (max_x, min_y), label);
        self.segment((max_x, min_y), (max_x, max_y), label);
        self.segment((max_x, max_y), (min_x, max_y), label);
        self.segment((min_x, max_y), (min_x, min_y), label);
    }
}

/// Buffer sink for tests and the CLI.
#[derive(Debug, Default)]
pub struct SegmentCollector {
    pub segments: Vec<(Point, Point, String)>,
}

impl DebugSink for SegmentCollector {
    fn segment(&mut self, from: Point, to: Point, label: &str) {
        self.segments.push((from, to, label.to_string()));
    }
}
