//! The sources bound to one grid layout.

use std::path::{Path, PathBuf};

use gridsync_common::error::{GridsyncError, GridsyncResult};
use gridsync_grid_model::layout::{compute_cells, CanvasSize, Cell, GridSpec};
use gridsync_media::{FrameSize, PixelBuffer, SourceOpener, VideoSource};

use crate::compositor::FrameCompositor;

/// Outcome of opening a set of paths against a layout.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Sources opened successfully.
    pub opened: usize,
    /// Paths that were assigned a cell but could not be opened.
    pub failed: Vec<(PathBuf, GridsyncError)>,
    /// Paths beyond the grid capacity. These are never opened.
    pub dropped: Vec<PathBuf>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.dropped.is_empty()
    }
}

/// A fixed table of cells and the source bound to each.
///
/// The table is sized once per layout. Changing the layout or the canvas
/// means building a new set; slots never grow.
pub struct SourceSet {
    grid: GridSpec,
    canvas: CanvasSize,
    cells: Vec<Cell>,
    paths: Vec<PathBuf>,
    slots: Vec<Option<VideoSource>>,
}

impl SourceSet {
    /// A set with no sources.
    pub fn empty(grid: GridSpec, canvas: CanvasSize) -> Self {
        Self {
            grid,
            canvas,
            cells: Vec::new(),
            paths: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Compute the cells for `paths` and open one source per cell.
    ///
    /// Per-source open failures keep their cell (rendered blank) and are
    /// listed in the report. Fails only when the canvas is not ready.
    pub fn open(
        paths: &[PathBuf],
        grid: GridSpec,
        canvas: CanvasSize,
        opener: &dyn SourceOpener,
    ) -> GridsyncResult<(Self, LoadReport)> {
        let cells = compute_cells(grid, canvas, paths.len())?;
        let mut report = LoadReport::default();
        let mut slots = Vec::with_capacity(cells.len());

        for (cell, path) in cells.iter().zip(paths) {
            let size = FrameSize::new(cell.width, cell.height);
            match VideoSource::open(path, size, opener) {
                Ok(source) => {
                    report.opened += 1;
                    slots.push(Some(source));
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        cell = cell.index,
                        error = %e,
                        "Source failed to open; cell stays blank"
                    );
                    report.failed.push((path.clone(), e));
                    slots.push(None);
                }
            }
        }

        report.dropped = paths.iter().skip(cells.len()).cloned().collect();
        if !report.dropped.is_empty() {
            tracing::info!(
                dropped = report.dropped.len(),
                capacity = grid.capacity(),
                %grid,
                "Sources beyond grid capacity ignored"
            );
        }

        let assigned = paths.iter().take(cells.len()).cloned().collect();
        Ok((
            Self {
                grid,
                canvas,
                cells,
                paths: assigned,
                slots,
            },
            report,
        ))
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Paths that were assigned a cell, in cell order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Path of the first assigned source.
    pub fn first_path(&self) -> Option<&Path> {
        self.paths.first().map(PathBuf::as_path)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sources that opened and are still held.
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|s| !s.is_released())
            .count()
    }

    /// Length of the shared timeline: the longest active source.
    pub fn max_frames(&self) -> u64 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| !s.is_released())
            .map(VideoSource::frame_count)
            .max()
            .unwrap_or(0)
    }

    /// The source in cell `index`, if it opened.
    pub fn source(&self, index: usize) -> Option<&VideoSource> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Composite the frame at `frame_index` across all cells.
    pub fn compose(&mut self, compositor: &FrameCompositor, frame_index: i64) -> PixelBuffer {
        compositor.compose(self.canvas, &self.cells, &mut self.slots, frame_index)
    }

    /// Release every decode handle. Idempotent.
    pub fn release(&mut self) {
        for source in self.slots.iter_mut().flatten() {
            source.release();
        }
    }
}

impl std::fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSet")
            .field("grid", &self.grid)
            .field("canvas", &self.canvas)
            .field("cells", &self.cells.len())
            .field("active", &self.active_count())
            .field("max_frames", &self.max_frames())
            .finish()
    }
}
