//! Grid layout: `RxC` specs and cell rectangles on the composition canvas.
//!
//! Cells are laid out row-major with a fixed margin between neighbours.
//! All coordinates are integer pixels with the origin at the top-left.

use std::fmt;
use std::str::FromStr;

use gridsync_common::error::{GridsyncError, GridsyncResult};
use serde::{Deserialize, Serialize};

/// Pixels between neighbouring cells.
pub const GRID_MARGIN: u32 = 2;

/// Layout tokens offered to the user.
pub const LAYOUT_PRESETS: [&str; 9] = [
    "1x1", "1x2", "1x3", "2x1", "2x2", "2x3", "3x1", "3x2", "3x3",
];

/// Rows and columns of the comparison grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: u32,
    pub cols: u32,
}

impl GridSpec {
    /// Create a grid. Both dimensions must be at least 1.
    pub fn new(rows: u32, cols: u32) -> GridsyncResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(GridsyncError::InvalidLayout {
                token: format!("{rows}x{cols}"),
            });
        }
        Ok(Self { rows, cols })
    }

    /// Number of cells the grid can hold.
    pub fn capacity(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Whether this grid is one of [`LAYOUT_PRESETS`].
    pub fn is_preset(&self) -> bool {
        (1..=3).contains(&self.rows) && (1..=3).contains(&self.cols)
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self { rows: 2, cols: 2 }
    }
}

impl FromStr for GridSpec {
    type Err = GridsyncError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = || GridsyncError::InvalidLayout {
            token: token.to_string(),
        };
        let (rows, cols) = token.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;
        let cols = cols.trim().parse::<u32>().map_err(|_| invalid())?;
        Self::new(rows, cols).map_err(|_| invalid())
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Pixel size of the composition canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A canvas of one pixel or less in either dimension has not been realised yet.
    pub fn is_ready(&self) -> bool {
        self.width > 1 && self.height > 1
    }
}

impl FromStr for CanvasSize {
    type Err = GridsyncError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = || GridsyncError::config(format!("Invalid size '{token}', expected WxH"));
        let (w, h) = token.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { width, height })
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A rectangular region of the canvas assigned to one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Position in row-major order; equals the index of the source it shows.
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Cell {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether two cells share any pixel.
    pub fn overlaps(&self, other: &Cell) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Whether the cell lies entirely inside the canvas.
    pub fn fits_within(&self, canvas: CanvasSize) -> bool {
        self.right() <= canvas.width && self.bottom() <= canvas.height
    }

    /// Centre x coordinate relative to the canvas.
    pub fn center_x(&self) -> u32 {
        self.x + self.width / 2
    }
}

/// Size shared by every cell of `grid` on `canvas`.
pub fn cell_size(grid: GridSpec, canvas: CanvasSize) -> GridsyncResult<(u32, u32)> {
    let not_ready = || GridsyncError::LayoutNotReady {
        width: canvas.width,
        height: canvas.height,
    };
    if !canvas.is_ready() {
        return Err(not_ready());
    }

    let width = canvas.width.saturating_sub(GRID_MARGIN * (grid.cols - 1)) / grid.cols;
    let height = canvas.height.saturating_sub(GRID_MARGIN * (grid.rows - 1)) / grid.rows;
    if width == 0 || height == 0 {
        return Err(not_ready());
    }
    Ok((width, height))
}

/// Compute the cells for the first `min(source_count, rows * cols)` sources.
///
/// Sources beyond the grid capacity receive no cell. Returns
/// [`GridsyncError::LayoutNotReady`] while the canvas has no usable size.
pub fn compute_cells(
    grid: GridSpec,
    canvas: CanvasSize,
    source_count: usize,
) -> GridsyncResult<Vec<Cell>> {
    let (width, height) = cell_size(grid, canvas)?;
    let count = source_count.min(grid.capacity());
    let cols = grid.cols as usize;

    let cells = (0..count)
        .map(|index| {
            let col = (index % cols) as u32;
            let row = (index / cols) as u32;
            Cell {
                index,
                x: col * (width + GRID_MARGIN),
                y: row * (height + GRID_MARGIN),
                width,
                height,
            }
        })
        .collect();

    tracing::trace!(%grid, %canvas, source_count, count, width, height, "Computed grid cells");
    Ok(cells)
}
