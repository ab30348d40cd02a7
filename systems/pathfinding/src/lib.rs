#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Grid route planning: A* search, line-of-sight smoothing, and fallbacks.
//!
//! Every entry point borrows the grid through [`Walkability`] for the duration
//! of a single call and never mutates it. Routes are computed from scratch on
//! each call; stale routes are never invalidated by this crate.
//!
//! [`Walkability`]: isoworld_core::Walkability

mod astar;
mod line;
mod nearest;
mod smoothing;

use std::f64::consts::SQRT_2;

use isoworld_core::{CellCoord, Walkability};

pub use astar::{find_path, Pathfinder};
pub use line::{has_line_of_sight, has_line_of_sight_leaving, LineWalk};
pub use nearest::{nearest_walkable, DEFAULT_SEARCH_RADIUS};
pub use smoothing::smooth;

/// Cost of moving between two cells.
///
/// Axis-aligned neighbours cost `1.0` and diagonal neighbours cost `√2`; any
/// other pair costs its straight-line distance, so the Euclidean heuristic
/// stays admissible and consistent.
#[must_use]
pub fn step_cost(from: CellCoord, to: CellCoord) -> f64 {
    let columns = from.column().abs_diff(to.column());
    let rows = from.row().abs_diff(to.row());
    match (columns, rows) {
        (0, 0) => 0.0,
        (1, 0) | (0, 1) => 1.0,
        (1, 1) => SQRT_2,
        _ => f64::from(columns).hypot(f64::from(rows)),
    }
}

/// Largest terrain height difference a single step may cross.
pub const MAX_CLIMB: f32 = 2.0;

/// Extra cost per unit of terrain height difference crossed by a step.
pub const CLIMB_PENALTY: f64 = 0.5;

/// Reports whether a step between two cells stays within [`MAX_CLIMB`].
///
/// Cells without a known height sit at ground level.
#[must_use]
pub fn can_climb<W>(grid: &W, from: CellCoord, to: CellCoord) -> bool
where
    W: Walkability + ?Sized,
{
    height_difference(grid, from, to) <= MAX_CLIMB
}

/// Cost of stepping between two cells on the grid's terrain.
///
/// This is [`step_cost`] plus [`CLIMB_PENALTY`] per unit of height
/// difference, or `None` when the step exceeds [`MAX_CLIMB`]. The penalty
/// only ever adds cost, so the Euclidean heuristic stays admissible.
#[must_use]
pub fn traversal_cost<W>(grid: &W, from: CellCoord, to: CellCoord) -> Option<f64>
where
    W: Walkability + ?Sized,
{
    let climb = height_difference(grid, from, to);
    if climb > MAX_CLIMB {
        return None;
    }
    Some(step_cost(from, to) + CLIMB_PENALTY * f64::from(climb))
}

fn height_difference<W>(grid: &W, from: CellCoord, to: CellCoord) -> f32
where
    W: Walkability + ?Sized,
{
    let from = grid.height(from).unwrap_or(0.0);
    let to = grid.height(to).unwrap_or(0.0);
    (to - from).abs()
}

/// Ordered, non-empty sequence of cells from a start to a goal.
///
/// The goal is always the last cell. The start is the first cell unless the
/// planner omitted it because the agent departs from a blocked cell; see
/// [`Route::omits_start`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Route {
    cells: Vec<CellCoord>,
    start_omitted: bool,
}

impl Route {
    /// Wraps a cell sequence, returning `None` when it is empty.
    #[must_use]
    pub fn new(cells: Vec<CellCoord>) -> Option<Self> {
        if cells.is_empty() {
            None
        } else {
            Some(Self {
                cells,
                start_omitted: false,
            })
        }
    }

    pub(crate) fn single(cell: CellCoord) -> Self {
        Self {
            cells: vec![cell],
            start_omitted: false,
        }
    }

    /// Reports whether the departure cell is missing from the route.
    ///
    /// Set when the search started on a blocked cell: the route then begins
    /// with the first walkable step so that no returned cell is blocked.
    #[must_use]
    pub fn omits_start(&self) -> bool {
        self.start_omitted
    }

    /// First cell of the route.
    #[must_use]
    pub fn start(&self) -> CellCoord {
        self.cells[0]
    }

    /// Last cell of the route.
    #[must_use]
    pub fn goal(&self) -> CellCoord {
        self.cells[self.cells.len() - 1]
    }

    /// Cells in travel order.
    #[must_use]
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    /// Number of cells in the route.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the route consists only of its goal.
    ///
    /// A trivial route means "already there": it is returned when the start
    /// equals the goal and must not be treated as a journey. A single-cell
    /// route that omits its start is a one-step journey, not a trivial one.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.cells.len() == 1 && !self.start_omitted
    }

    /// Sum of the straight-line lengths between consecutive cells.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.cells
            .windows(2)
            .map(|pair| step_cost(pair[0], pair[1]))
            .sum()
    }

    /// Consumes the route and returns its cells.
    #[must_use]
    pub fn into_cells(self) -> Vec<CellCoord> {
        self.cells
    }
}
