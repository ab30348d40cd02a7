//! Greedy line-of-sight waypoint reduction.

use isoworld_core::Walkability;
use tracing::debug;

use crate::{has_line_of_sight, Route};

/// Reduces a cell-by-cell route to a waypoint subsequence.
///
/// From each anchor the scan extends forward while the anchor keeps line of
/// sight to the candidate and commits the furthest such cell as the next
/// waypoint. The first and last cells are always kept and the output is never
/// longer than the input. Routes with fewer than three cells are returned
/// unchanged. A route that omits its blocked start is smoothed from its first
/// walkable cell, so every leg keeps line of sight.
#[must_use]
pub fn smooth<W>(route: &Route, grid: &W) -> Route
where
    W: Walkability + ?Sized,
{
    let cells = route.cells();
    if cells.len() < 3 {
        return route.clone();
    }

    let mut waypoints = vec![cells[0]];
    let mut anchor = 0;
    while anchor < cells.len() - 1 {
        let mut furthest = anchor + 1;
        for candidate in anchor + 2..cells.len() {
            if has_line_of_sight(grid, cells[anchor], cells[candidate]) {
                furthest = candidate;
            } else {
                break;
            }
        }
        waypoints.push(cells[furthest]);
        anchor = furthest;
    }

    debug!(
        cells = cells.len(),
        waypoints = waypoints.len(),
        "route smoothed"
    );
    Route {
        cells: waypoints,
        start_omitted: route.omits_start(),
    }
}
