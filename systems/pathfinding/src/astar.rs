//! A* search over the 8-connected cell grid.

use std::{cmp::Reverse, collections::BinaryHeap};

use isoworld_core::{
    CellCoord, GridBounds, PathError, RouteEndpoint, UnreachableReason, Walkability,
};
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::{traversal_cost, Route};

/// Priority-queue entry: estimated total cost, insertion sequence, dense cell index.
type OpenEntry = Reverse<(OrderedFloat<f64>, u64, usize)>;

const NO_PARENT: usize = usize::MAX;

/// Finds a cost-optimal route using a throwaway search workspace.
///
/// See [`Pathfinder::find_path`] for the full contract.
pub fn find_path<W>(grid: &W, start: CellCoord, goal: CellCoord) -> Result<Route, PathError>
where
    W: Walkability + ?Sized,
{
    Pathfinder::default().find_path(grid, start, goal)
}

/// A* planner that keeps its scratch buffers between searches.
///
/// Only allocations are reused; every search starts from a clean slate and
/// nothing is cached across calls.
#[derive(Debug, Default)]
pub struct Pathfinder {
    open: BinaryHeap<OpenEntry>,
    costs: Vec<f64>,
    parents: Vec<usize>,
    closed: Vec<bool>,
    last_expanded: usize,
}

impl Pathfinder {
    /// Creates a planner with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells finalised by the most recent search.
    #[must_use]
    pub fn last_expanded(&self) -> usize {
        self.last_expanded
    }

    /// Finds a cost-optimal 8-connected route from `start` to `goal`.
    ///
    /// Axis moves cost `1.0` and diagonal moves cost `√2`, plus the climb
    /// penalty on uneven terrain; steps higher than
    /// [`MAX_CLIMB`](crate::MAX_CLIMB) are refused. The heuristic is the
    /// Euclidean distance to the goal. Open-set ties on the estimated total
    /// cost are broken by insertion order. The returned route includes both
    /// endpoints and never contains a blocked cell.
    ///
    /// Special cases, checked in this order:
    /// - an endpoint outside the grid yields [`PathError::OutOfBounds`];
    /// - a blocked goal yields [`PathError::Unreachable`] with
    ///   [`UnreachableReason::GoalBlocked`] without expanding any cell;
    /// - `start == goal` yields a trivial single-cell route (see
    ///   [`Route::is_trivial`]).
    ///
    /// A blocked start is still searched from, so agents standing on a newly
    /// blocked cell can leave it, but the start is then left out of the route
    /// (see [`Route::omits_start`]).
    pub fn find_path<W>(
        &mut self,
        grid: &W,
        start: CellCoord,
        goal: CellCoord,
    ) -> Result<Route, PathError>
    where
        W: Walkability + ?Sized,
    {
        self.last_expanded = 0;
        let bounds = grid.bounds();

        let Some(goal_index) = bounds.index(goal) else {
            return Err(PathError::OutOfBounds {
                endpoint: RouteEndpoint::Goal,
                cell: goal,
            });
        };
        let Some(start_index) = bounds.index(start) else {
            return Err(PathError::OutOfBounds {
                endpoint: RouteEndpoint::Start,
                cell: start,
            });
        };

        if grid.is_blocked(goal) {
            debug!(%start, %goal, "goal blocked, search skipped");
            return Err(PathError::Unreachable {
                goal,
                reason: UnreachableReason::GoalBlocked,
            });
        }

        if start == goal {
            return Ok(Route::single(goal));
        }

        self.prepare(bounds.cell_count());
        self.costs[start_index] = 0.0;
        let mut sequence = 0_u64;
        self.open.push(Reverse((
            OrderedFloat(heuristic(start, goal)),
            sequence,
            start_index,
        )));

        while let Some(Reverse((_, _, index))) = self.open.pop() {
            if self.closed[index] {
                continue;
            }
            self.closed[index] = true;
            self.last_expanded += 1;

            if index == goal_index {
                let route = self.reconstruct(bounds, goal_index, grid.is_blocked(start));
                debug!(
                    %start,
                    %goal,
                    expanded = self.last_expanded,
                    cells = route.len(),
                    "route found"
                );
                return Ok(route);
            }

            let Some(cell) = bounds.cell_at(index) else {
                continue;
            };
            let current_cost = self.costs[index];

            for neighbor in neighbors(cell, bounds) {
                if grid.is_blocked(neighbor) {
                    continue;
                }
                let Some(neighbor_index) = bounds.index(neighbor) else {
                    continue;
                };
                if self.closed[neighbor_index] {
                    continue;
                }

                let Some(step) = traversal_cost(grid, cell, neighbor) else {
                    continue;
                };
                let tentative = current_cost + step;
                if tentative >= self.costs[neighbor_index] {
                    continue;
                }

                self.costs[neighbor_index] = tentative;
                self.parents[neighbor_index] = index;
                sequence += 1;
                self.open.push(Reverse((
                    OrderedFloat(tentative + heuristic(neighbor, goal)),
                    sequence,
                    neighbor_index,
                )));
            }
        }

        debug!(%start, %goal, expanded = self.last_expanded, "open set exhausted");
        Err(PathError::Unreachable {
            goal,
            reason: UnreachableReason::Exhausted,
        })
    }

    fn prepare(&mut self, cell_count: usize) {
        self.open.clear();
        self.costs.clear();
        self.costs.resize(cell_count, f64::INFINITY);
        self.parents.clear();
        self.parents.resize(cell_count, NO_PARENT);
        self.closed.clear();
        self.closed.resize(cell_count, false);
    }

    fn reconstruct(&self, bounds: GridBounds, goal_index: usize, omit_start: bool) -> Route {
        let mut cells = Vec::new();
        let mut cursor = goal_index;
        while cursor != NO_PARENT {
            let parent = self.parents[cursor];
            if omit_start && parent == NO_PARENT {
                break;
            }
            if let Some(cell) = bounds.cell_at(cursor) {
                cells.push(cell);
            }
            cursor = parent;
        }
        cells.reverse();
        Route {
            cells,
            start_omitted: omit_start,
        }
    }
}

fn heuristic(from: CellCoord, goal: CellCoord) -> f64 {
    let columns = f64::from(from.column()) - f64::from(goal.column());
    let rows = f64::from(from.row()) - f64::from(goal.row());
    columns.hypot(rows)
}

/// Offsets of the eight neighbours: axis moves first, then diagonals.
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (-1, 0),
    (1, 0),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

fn neighbors(cell: CellCoord, bounds: GridBounds) -> NeighborIter {
    let mut neighbors = NeighborIter::default();
    for (columns, rows) in NEIGHBOR_OFFSETS {
        if let Some(neighbor) = cell.offset(columns, rows) {
            if bounds.contains(neighbor) {
                neighbors.push(neighbor);
            }
        }
    }
    neighbors
}

#[derive(Clone, Debug, Default)]
struct NeighborIter {
    buffer: [Option<CellCoord>; 8],
    len: usize,
    cursor: usize,
}

impl NeighborIter {
    fn push(&mut self, cell: CellCoord) {
        if self.len < self.buffer.len() {
            self.buffer[self.len] = Some(cell);
            self.len += 1;
        }
    }
}

impl Iterator for NeighborIter {
    type Item = CellCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.len {
            return None;
        }

        let value = self.buffer[self.cursor];
        self.cursor += 1;
        value
    }
}
