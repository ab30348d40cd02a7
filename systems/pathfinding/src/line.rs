//! Discrete line rasterisation used for line-of-sight checks.

use isoworld_core::{CellCoord, Walkability};

use crate::can_climb;

/// Bresenham walk over every cell on the segment between two cells, both inclusive.
#[derive(Clone, Debug)]
pub struct LineWalk {
    column: i64,
    row: i64,
    end_column: i64,
    end_row: i64,
    delta_columns: i64,
    delta_rows: i64,
    step_column: i64,
    step_row: i64,
    error: i64,
    finished: bool,
}

impl LineWalk {
    /// Creates a walk from `from` to `to`.
    #[must_use]
    pub fn new(from: CellCoord, to: CellCoord) -> Self {
        let column = i64::from(from.column());
        let row = i64::from(from.row());
        let end_column = i64::from(to.column());
        let end_row = i64::from(to.row());
        let delta_columns = (end_column - column).abs();
        let delta_rows = -(end_row - row).abs();

        Self {
            column,
            row,
            end_column,
            end_row,
            delta_columns,
            delta_rows,
            step_column: if column < end_column { 1 } else { -1 },
            step_row: if row < end_row { 1 } else { -1 },
            error: delta_columns + delta_rows,
            finished: false,
        }
    }
}

impl Iterator for LineWalk {
    type Item = CellCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let cell = CellCoord::new(
            i32::try_from(self.column).ok()?,
            i32::try_from(self.row).ok()?,
        );

        if self.column == self.end_column && self.row == self.end_row {
            self.finished = true;
            return Some(cell);
        }

        let doubled = 2 * self.error;
        if doubled >= self.delta_rows {
            self.error += self.delta_rows;
            self.column += self.step_column;
        }
        if doubled <= self.delta_columns {
            self.error += self.delta_columns;
            self.row += self.step_row;
        }

        Some(cell)
    }
}

/// Reports whether every cell on the rasterised segment is walkable and
/// each step along it stays within the climb limit.
///
/// Both endpoints are checked, and axis-aligned segments still visit each
/// intermediate cell.
#[must_use]
pub fn has_line_of_sight<W>(grid: &W, from: CellCoord, to: CellCoord) -> bool
where
    W: Walkability + ?Sized,
{
    grid.is_walkable(from) && has_line_of_sight_leaving(grid, from, to)
}

/// Like [`has_line_of_sight`] but without requiring `from` to be walkable.
///
/// Used for the first leg of an agent standing on a cell that became blocked
/// underneath it.
#[must_use]
pub fn has_line_of_sight_leaving<W>(grid: &W, from: CellCoord, to: CellCoord) -> bool
where
    W: Walkability + ?Sized,
{
    let mut previous = from;
    LineWalk::new(from, to).skip(1).all(|cell| {
        let clear = grid.is_walkable(cell) && can_climb(grid, previous, cell);
        previous = cell;
        clear
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoworld_core::{Grid, GridBounds};

    #[test]
    fn axis_aligned_walk_visits_every_cell() {
        let cells: Vec<_> = LineWalk::new(CellCoord::new(1, 2), CellCoord::new(5, 2)).collect();
        assert_eq!(
            cells,
            (1..=5).map(|column| CellCoord::new(column, 2)).collect::<Vec<_>>()
        );

        let reversed: Vec<_> = LineWalk::new(CellCoord::new(3, 4), CellCoord::new(3, 1)).collect();
        assert_eq!(
            reversed,
            vec![
                CellCoord::new(3, 4),
                CellCoord::new(3, 3),
                CellCoord::new(3, 2),
                CellCoord::new(3, 1)
            ]
        );
    }

    #[test]
    fn single_cell_walk_yields_the_cell_once() {
        let cell = CellCoord::new(7, 7);
        assert_eq!(LineWalk::new(cell, cell).collect::<Vec<_>>(), vec![cell]);
    }

    #[test]
    fn shallow_walk_is_connected() {
        let cells: Vec<_> = LineWalk::new(CellCoord::new(0, 0), CellCoord::new(6, 2)).collect();
        assert_eq!(cells.first(), Some(&CellCoord::new(0, 0)));
        assert_eq!(cells.last(), Some(&CellCoord::new(6, 2)));
        assert_eq!(cells.len(), 7);
        for pair in cells.windows(2) {
            assert_eq!(pair[0].chebyshev_distance(pair[1]), 1);
        }
    }

    #[test]
    fn blocked_intermediate_cell_breaks_sight() {
        let grid = Grid::with_blocked(GridBounds::new(6, 6), [CellCoord::new(2, 0)]);
        assert!(!has_line_of_sight(
            &grid,
            CellCoord::new(0, 0),
            CellCoord::new(4, 0)
        ));
        assert!(has_line_of_sight(
            &grid,
            CellCoord::new(0, 1),
            CellCoord::new(4, 1)
        ));
    }

    #[test]
    fn blocked_start_breaks_sight_unless_leaving() {
        let grid = Grid::with_blocked(GridBounds::new(3, 3), [CellCoord::new(0, 0)]);
        assert!(!has_line_of_sight(
            &grid,
            CellCoord::new(0, 0),
            CellCoord::new(1, 0)
        ));
        assert!(has_line_of_sight_leaving(
            &grid,
            CellCoord::new(0, 0),
            CellCoord::new(2, 0)
        ));
        assert!(!has_line_of_sight_leaving(
            &grid,
            CellCoord::new(2, 0),
            CellCoord::new(0, 0)
        ));
    }

    #[test]
    fn cliffs_break_sight() {
        let mut grid = Grid::new(GridBounds::new(5, 2));
        let _ = grid.set_height(CellCoord::new(2, 0), Some(3.0));
        let _ = grid.set_height(CellCoord::new(2, 1), Some(2.0));

        assert!(!has_line_of_sight(
            &grid,
            CellCoord::new(0, 0),
            CellCoord::new(4, 0)
        ));
        assert!(has_line_of_sight(
            &grid,
            CellCoord::new(0, 1),
            CellCoord::new(4, 1)
        ));
    }
}
