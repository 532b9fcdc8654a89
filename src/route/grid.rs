//! Sparse non-uniform search grid.
//!
//! Grid lines are placed only at "interesting" coordinates: corridor and
//! common-bounds edges plus, per endpoint, the coordinate perpendicular to
//! its heading (so the search can leave and enter straight). The cross
//! product of the sorted unique xs and ys becomes the node set, typically
//! well under fifty nodes regardless of diagram scale.

use crate::geometry::{Bounds, Point};
use crate::heading::Heading;

/// A* search state for one grid intersection. Built fresh per routing call
/// and discarded afterwards.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub f: f64,
    pub g: f64,
    pub h: f64,
    pub closed: bool,
    pub visited: bool,
    pub parent: Option<usize>,
    pub pos: Point,
    pub addr: (usize, usize),
}

#[derive(Debug, Clone)]
pub(crate) struct Grid {
    pub row: usize,
    pub col: usize,
    pub data: Vec<Node>,
}

impl Grid {
    pub fn node_index_at_addr(&self, col: isize, row: isize) -> Option<usize> {
        if col < 0 || row < 0 || col as usize >= self.col || row as usize >= self.row {
            return None;
        }
        Some(row as usize * self.col + col as usize)
    }

    /// Grid-adjacent neighbors in UP, RIGHT, DOWN, LEFT order.
    pub fn neighbors(&self, addr: (usize, usize)) -> [Option<usize>; 4] {
        let (col, row) = (addr.0 as isize, addr.1 as isize);
        [
            self.node_index_at_addr(col, row - 1),
            self.node_index_at_addr(col + 1, row),
            self.node_index_at_addr(col, row + 1),
            self.node_index_at_addr(col - 1, row),
        ]
    }

    /// Node whose position matches `p` exactly, if any.
    pub fn node_index_at_point(&self, p: Point) -> Option<usize> {
        self.data
            .iter()
            .position(|node| node.pos.0 == p.0 && node.pos.1 == p.1)
    }
}

fn sorted_unique(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values.dedup_by(|a, b| a == b);
    values
}

/// Build the search grid for the given corridors and endpoints.
pub(crate) fn calculate_grid(
    aabbs: &[Bounds],
    start: Point,
    start_heading: Heading,
    end: Point,
    end_heading: Heading,
    common: Bounds,
) -> Grid {
    let mut xs: Vec<f64> = Vec::new();
    let mut ys: Vec<f64> = Vec::new();

    // Only the coordinate perpendicular to the forced heading is relevant
    // for an endpoint; the parallel one would let the path sidestep it.
    if start_heading.is_horizontal() {
        ys.push(start.1);
    } else {
        xs.push(start.0);
    }
    if end_heading.is_horizontal() {
        ys.push(end.1);
    } else {
        xs.push(end.0);
    }

    for aabb in aabbs {
        xs.push(aabb[0]);
        xs.push(aabb[2]);
        ys.push(aabb[1]);
        ys.push(aabb[3]);
    }

    xs.push(common[0]);
    xs.push(common[2]);
    ys.push(common[1]);
    ys.push(common[3]);

    let xs = sorted_unique(xs);
    let ys = sorted_unique(ys);

    let mut data = Vec::with_capacity(xs.len() * ys.len());
    for (row, y) in ys.iter().enumerate() {
        for (col, x) in xs.iter().enumerate() {
            data.push(Node {
                f: 0.0,
                g: 0.0,
                h: 0.0,
                closed: false,
                visited: false,
                parent: None,
                pos: (*x, *y),
                addr: (col, row),
            });
        }
    }

    Grid {
        row: ys.len(),
        col: xs.len(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_cross_product_of_unique_coords() {
        let aabbs = [[0.0, 0.0, 10.0, 10.0], [10.0, 0.0, 20.0, 10.0]];
        let grid = calculate_grid(
            &aabbs,
            (0.0, 5.0),
            Heading::Left,
            (20.0, 5.0),
            Heading::Right,
            [0.0, 0.0, 20.0, 10.0],
        );
        // xs: 0, 10, 20; ys: 0, 5, 10.
        assert_eq!(grid.col, 3);
        assert_eq!(grid.row, 3);
        assert_eq!(grid.data.len(), 9);
    }

    #[test]
    fn neighbors_follow_up_right_down_left_order() {
        let grid = calculate_grid(
            &[[0.0, 0.0, 10.0, 10.0]],
            (0.0, 5.0),
            Heading::Left,
            (10.0, 5.0),
            Heading::Right,
            [0.0, 0.0, 10.0, 10.0],
        );
        let center = grid.node_index_at_point((0.0, 5.0)).unwrap();
        let addr = grid.data[center].addr;
        let [up, right, down, left] = grid.neighbors(addr);
        assert_eq!(up.map(|i| grid.data[i].pos), Some((0.0, 0.0)));
        assert_eq!(right.map(|i| grid.data[i].pos), Some((10.0, 5.0)));
        assert_eq!(down.map(|i| grid.data[i].pos), Some((0.0, 10.0)));
        assert_eq!(left, None);
    }

    #[test]
    fn endpoint_contributes_only_perpendicular_coordinate() {
        let grid = calculate_grid(
            &[],
            (3.0, 7.0),
            Heading::Right,
            (13.0, 17.0),
            Heading::Down,
            [0.0, 0.0, 20.0, 20.0],
        );
        // Start is horizontal: its y joins; end is vertical: its x joins.
        assert!(grid.data.iter().any(|n| n.pos.1 == 7.0));
        assert!(grid.data.iter().all(|n| n.pos.0 != 3.0));
        assert!(grid.data.iter().any(|n| n.pos.0 == 13.0));
        assert!(grid.data.iter().all(|n| n.pos.1 != 17.0));
    }
}
