//! Fallback search for a walkable cell near an unreachable one.

use isoworld_core::{CellCoord, Walkability};

/// Ring radius searched by callers that have no better bound.
pub const DEFAULT_SEARCH_RADIUS: u32 = 5;

/// Finds a walkable cell close to `cell`.
///
/// The cell itself is returned when walkable. Otherwise square rings of
/// increasing Chebyshev radius, up to `max_radius`, are scanned row by row
/// along their perimeter and the first walkable cell wins. This is never
/// applied automatically; callers opt in after a route request fails.
#[must_use]
pub fn nearest_walkable<W>(grid: &W, cell: CellCoord, max_radius: u32) -> Option<CellCoord>
where
    W: Walkability + ?Sized,
{
    if grid.is_walkable(cell) {
        return Some(cell);
    }

    let max_radius = i32::try_from(max_radius).unwrap_or(i32::MAX);
    for radius in 1..=max_radius {
        for rows in -radius..=radius {
            for columns in -radius..=radius {
                if columns.abs() != radius && rows.abs() != radius {
                    continue;
                }
                let Some(candidate) = cell.offset(columns, rows) else {
                    continue;
                };
                if grid.is_walkable(candidate) {
                    return Some(candidate);
                }
            }
        }
    }

    None
}
