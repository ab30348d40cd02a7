#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Coordinate transforms between grid, isometric-projected, and presentation space.
//!
//! Grid space addresses cells by column and row. Projected space is the 2D
//! plane produced by the axonometric projection of cell centres, where the
//! horizontal axis follows `column - row` and the vertical axis follows
//! `column + row`. Presentation space is projected space after the camera
//! zoom and offset are applied, i.e. the final on-screen position.
//!
//! Every function in this crate is pure and may be called from any context.

use glam::Vec2;
use isoworld_core::{CellCoord, GridBounds};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of cells added around the viewport when enumerating visible cells.
pub const VISIBLE_CELL_MARGIN: i32 = 2;

/// Errors raised when transform inputs violate their preconditions.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum TransformError {
    /// Zoom must be finite and strictly positive.
    #[error("zoom must be finite and positive (received {zoom})")]
    InvalidZoom {
        /// Provided zoom factor that failed validation.
        zoom: f32,
    },
    /// Camera offset components must be finite.
    #[error("camera offset must be finite (received {offset})")]
    NonFiniteOffset {
        /// Provided offset that failed validation.
        offset: Vec2,
    },
    /// Tile dimensions must be finite and strictly positive.
    #[error("tile {dimension} must be finite and positive (received {value})")]
    InvalidTileSize {
        /// Name of the offending dimension.
        dimension: &'static str,
        /// Provided value that failed validation.
        value: f32,
    },
}

/// Constants of the isometric projection, expressed in projected units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsoProjection {
    tile_width: f32,
    tile_height: f32,
    block_height: f32,
}

impl Default for IsoProjection {
    fn default() -> Self {
        Self {
            tile_width: Self::DEFAULT_TILE_WIDTH,
            tile_height: Self::DEFAULT_TILE_HEIGHT,
            block_height: Self::DEFAULT_BLOCK_HEIGHT,
        }
    }
}

impl IsoProjection {
    /// Default width of a tile diamond.
    pub const DEFAULT_TILE_WIDTH: f32 = 64.0;

    /// Default height of a tile diamond.
    pub const DEFAULT_TILE_HEIGHT: f32 = 32.0;

    /// Default vertical offset applied per unit of terrain height.
    pub const DEFAULT_BLOCK_HEIGHT: f32 = 16.0;

    /// Creates a validated projection.
    ///
    /// Returns an error when a tile dimension is not finite and positive or the
    /// block height is negative or not finite.
    pub fn new(
        tile_width: f32,
        tile_height: f32,
        block_height: f32,
    ) -> Result<Self, TransformError> {
        let projection = Self {
            tile_width,
            tile_height,
            block_height,
        };
        projection.validate()?;
        Ok(projection)
    }

    /// Checks the constants of a projection obtained through deserialisation.
    pub fn validate(&self) -> Result<(), TransformError> {
        check_positive("width", self.tile_width)?;
        check_positive("height", self.tile_height)?;
        if !self.block_height.is_finite() || self.block_height < 0.0 {
            return Err(TransformError::InvalidTileSize {
                dimension: "block height",
                value: self.block_height,
            });
        }
        Ok(())
    }

    /// Width of a tile diamond.
    #[must_use]
    pub const fn tile_width(&self) -> f32 {
        self.tile_width
    }

    /// Height of a tile diamond.
    #[must_use]
    pub const fn tile_height(&self) -> f32 {
        self.tile_height
    }

    /// Vertical offset applied per unit of terrain height.
    #[must_use]
    pub const fn block_height(&self) -> f32 {
        self.block_height
    }

    fn half_extents(&self) -> Vec2 {
        Vec2::new(self.tile_width * 0.5, self.tile_height * 0.5)
    }

    /// Projects a cell standing on the provided terrain height.
    ///
    /// Injective on cells for a fixed height. Raising the height moves the
    /// projected point up by `height * block_height`.
    #[must_use]
    pub fn grid_to_projected(&self, cell: CellCoord, height: f32) -> Vec2 {
        self.position_to_projected(cell.center(), height)
    }

    /// Projects a continuous grid-space position, such as a moving agent.
    #[must_use]
    pub fn position_to_projected(&self, position: Vec2, height: f32) -> Vec2 {
        let half = self.half_extents();
        Vec2::new(
            (position.x - position.y) * half.x,
            (position.x + position.y) * half.y - height * self.block_height,
        )
    }

    /// Recovers the cell addressed by a projected point.
    ///
    /// This is an intentional approximation, not an exact inverse: the
    /// fractional grid coordinates are truncated toward zero rather than
    /// rounded. Exact images of cell centres at height zero map back to their
    /// cell; any other point maps to a deterministic cell that is not
    /// necessarily the nearest one. Callers rely on the truncation, so it
    /// must not be replaced by rounding.
    #[must_use]
    pub fn projected_to_grid(&self, point: Vec2) -> CellCoord {
        let fractional = self.projected_to_position(point);
        CellCoord::new(fractional.x.trunc() as i32, fractional.y.trunc() as i32)
    }

    /// Fractional grid-space position of a projected point at height zero.
    #[must_use]
    pub fn projected_to_position(&self, point: Vec2) -> Vec2 {
        let half = self.half_extents();
        let across = point.x / half.x;
        let down = point.y / half.y;
        Vec2::new((across + down) * 0.5, (down - across) * 0.5)
    }

    /// Projected centre of a cell's top face at the provided height.
    #[must_use]
    pub fn cell_center(&self, cell: CellCoord, height: f32) -> Vec2 {
        self.grid_to_projected(cell, height)
    }

    /// Snaps a projected point onto the projected centre of the cell it picks.
    #[must_use]
    pub fn snap_to_cell(&self, point: Vec2) -> Vec2 {
        self.grid_to_projected(self.projected_to_grid(point), 0.0)
    }
}

fn check_positive(dimension: &'static str, value: f32) -> Result<(), TransformError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TransformError::InvalidTileSize { dimension, value })
    }
}

/// Camera snapshot owned by the presentation layer.
///
/// The frame is validated on construction, so transforms that receive one
/// never divide by a zero zoom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraFrame {
    offset: Vec2,
    zoom: f32,
}

impl Default for CameraFrame {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl CameraFrame {
    /// Creates a validated camera frame.
    pub fn new(offset: Vec2, zoom: f32) -> Result<Self, TransformError> {
        if !offset.is_finite() {
            return Err(TransformError::NonFiniteOffset { offset });
        }
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(TransformError::InvalidZoom { zoom });
        }
        Ok(Self { offset, zoom })
    }

    /// Translation applied after scaling.
    #[must_use]
    pub const fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Uniform scale factor.
    #[must_use]
    pub const fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Scales by zoom, then translates by the camera offset.
    #[must_use]
    pub fn projected_to_presentation(&self, point: Vec2) -> Vec2 {
        point * self.zoom + self.offset
    }

    /// Removes the camera offset, then divides by zoom.
    #[must_use]
    pub fn presentation_to_projected(&self, point: Vec2) -> Vec2 {
        (point - self.offset) / self.zoom
    }
}

/// Cell picked by a screen point.
///
/// Feeding back the screen image of a cell centre from [`grid_to_screen`]
/// recovers that cell exactly only when the zoom is a power of two. Other
/// zoom factors round in the `zoom` multiply and divide, and since the inverse
/// truncates, a centre may land a hair inside a neighbouring cell. Such
/// misses are off by at most one cell along each axis.
#[must_use]
pub fn screen_to_grid(projection: &IsoProjection, camera: &CameraFrame, screen: Vec2) -> CellCoord {
    projection.projected_to_grid(camera.presentation_to_projected(screen))
}

/// Screen position of a cell centre standing on the provided height.
#[must_use]
pub fn grid_to_screen(
    projection: &IsoProjection,
    camera: &CameraFrame,
    cell: CellCoord,
    height: f32,
) -> Vec2 {
    camera.projected_to_presentation(projection.grid_to_projected(cell, height))
}

/// Cell picked by a screen point, clamped onto the grid.
///
/// Returns `None` when the grid has no cells.
#[must_use]
pub fn screen_to_grid_clamped(
    projection: &IsoProjection,
    camera: &CameraFrame,
    bounds: GridBounds,
    screen: Vec2,
) -> Option<CellCoord> {
    bounds.clamp(screen_to_grid(projection, camera, screen))
}

/// Axis-aligned screen rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Top-left corner in presentation space.
    pub origin: Vec2,
    /// Width and height in presentation space.
    pub size: Vec2,
}

impl Viewport {
    /// Creates a viewport from its origin and size.
    #[must_use]
    pub const fn new(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    fn corners(&self) -> [Vec2; 4] {
        let far = self.origin + self.size;
        [
            self.origin,
            Vec2::new(far.x, self.origin.y),
            Vec2::new(self.origin.x, far.y),
            far,
        ]
    }
}

/// Cells whose projected centres may fall inside the viewport, in row-major order.
///
/// The search window is the grid-space bounding box of the viewport corners
/// widened by [`VISIBLE_CELL_MARGIN`] cells on each side and intersected with
/// the grid bounds, so elevated cells near the edges are not culled.
#[must_use]
pub fn visible_cells(
    projection: &IsoProjection,
    camera: &CameraFrame,
    bounds: GridBounds,
    viewport: Viewport,
) -> Vec<CellCoord> {
    let Some(last) = bounds.clamp(CellCoord::new(i32::MAX, i32::MAX)) else {
        return Vec::new();
    };

    let mut min = Vec2::splat(f32::INFINITY);
    let mut max = Vec2::splat(f32::NEG_INFINITY);
    for corner in viewport.corners() {
        let position =
            projection.projected_to_position(camera.presentation_to_projected(corner));
        min = min.min(position);
        max = max.max(position);
    }

    let margin = VISIBLE_CELL_MARGIN as f32;
    let first_column = ((min.x - margin).floor().max(0.0)) as i32;
    let first_row = ((min.y - margin).floor().max(0.0)) as i32;
    let last_column = ((max.x + margin).ceil() as i32).min(last.column());
    let last_row = ((max.y + margin).ceil() as i32).min(last.row());

    let mut cells = Vec::new();
    for row in first_row..=last_row {
        for column in first_column..=last_column {
            cells.push(CellCoord::new(column, row));
        }
    }
    cells
}
