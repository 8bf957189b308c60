//! Frame compositor: tiles per-source frames into one canvas with name labels.
//!
//! Composition holds no state between calls. The preview loop and the export
//! worker use the same code path and get identical pixels for identical inputs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::{FontVec, PxScale};
use gridsync_common::config::LabelConfig;
use gridsync_common::error::{GridsyncError, GridsyncResult};
use gridsync_grid_model::layout::{CanvasSize, Cell};
use gridsync_media::{PixelBuffer, VideoSource};
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

/// Label height in pixels at full scale.
const LABEL_BASE_PX: f32 = 30.0;

/// Distance from the cell bottom to the label baseline.
const LABEL_BOTTOM_OFFSET: i32 = 10;

/// Padding of the opaque box behind a label.
const LABEL_PADDING: i32 = 5;

const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_BOX: Rgb<u8> = Rgb([0, 0, 0]);

/// Fonts tried when no font is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Scale factor for labels in a cell of the given size.
pub fn label_scale(cell_width: u32, cell_height: u32) -> f32 {
    (cell_width.min(cell_height) as f32 / 400.0).clamp(0.3, 1.0)
}

/// Draws source names onto cell frames.
///
/// Without a font, labels are skipped and frames pass through unchanged.
#[derive(Clone, Default)]
pub struct LabelRenderer {
    font: Option<Arc<FontVec>>,
    font_path: Option<PathBuf>,
}

impl LabelRenderer {
    /// A renderer that never draws.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Resolve the label font from configuration, falling back to common system fonts.
    pub fn from_config(config: &LabelConfig) -> Self {
        if !config.enabled {
            tracing::debug!("Source labels disabled by configuration");
            return Self::disabled();
        }

        if let Some(path) = &config.font_path {
            match Self::from_font_file(path) {
                Ok(renderer) => return renderer,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Configured label font unusable")
                }
            }
        }

        let found = SYSTEM_FONT_CANDIDATES
            .iter()
            .map(Path::new)
            .filter(|p| p.is_file())
            .find_map(|p| Self::from_font_file(p).ok());

        match found {
            Some(renderer) => renderer,
            None => {
                tracing::warn!("No label font found; composited frames will carry no source names");
                Self::disabled()
            }
        }
    }

    /// Load a TrueType/OpenType font file.
    pub fn from_font_file(path: &Path) -> GridsyncResult<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| {
            GridsyncError::config(format!("Invalid font {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "Loaded label font");
        Ok(Self {
            font: Some(Arc::new(font)),
            font_path: Some(path.to_path_buf()),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.font.is_some()
    }

    pub fn font_path(&self) -> Option<&Path> {
        self.font_path.as_deref()
    }

    /// Draw `text` centred near the bottom of `frame`, over an opaque box.
    /// Drawing is clipped to the frame.
    pub fn draw(&self, frame: &mut PixelBuffer, text: &str) {
        let Some(font) = self.font.as_deref() else {
            return;
        };
        if text.is_empty() {
            return;
        }

        let (width, height) = frame.dimensions();
        let scale = PxScale::from(LABEL_BASE_PX * label_scale(width, height));
        let (text_w, text_h) = text_size(scale, font, text);

        let x = width as i32 / 2 - text_w as i32 / 2;
        let y = height as i32 - LABEL_BOTTOM_OFFSET - text_h as i32;

        let backdrop = Rect::at(x - LABEL_PADDING, y - LABEL_PADDING).of_size(
            text_w + 2 * LABEL_PADDING as u32,
            text_h + 2 * LABEL_PADDING as u32,
        );
        draw_filled_rect_mut(frame, backdrop, LABEL_BOX);
        draw_text_mut(frame, LABEL_TEXT, x, y, scale, font, text);
    }
}

impl std::fmt::Debug for LabelRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelRenderer")
            .field("enabled", &self.is_enabled())
            .field("font_path", &self.font_path)
            .finish()
    }
}

/// Builds one canvas-sized image per frame index.
#[derive(Debug, Clone, Default)]
pub struct FrameCompositor {
    labels: LabelRenderer,
}

impl FrameCompositor {
    pub fn new(labels: LabelRenderer) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &LabelRenderer {
        &self.labels
    }

    /// Composite frame `frame_index` of every source into a black canvas.
    ///
    /// `slots[i]` is the source bound to `cells[i]`. Empty slots and sources
    /// that have no frame at this index leave their cell black.
    pub fn compose(
        &self,
        canvas: CanvasSize,
        cells: &[Cell],
        slots: &mut [Option<VideoSource>],
        frame_index: i64,
    ) -> PixelBuffer {
        let mut output = PixelBuffer::new(canvas.width, canvas.height);

        for (cell, slot) in cells.iter().zip(slots.iter_mut()) {
            let Some(source) = slot.as_mut() else {
                continue;
            };
            let Some(mut frame) = source.frame_at(frame_index) else {
                continue;
            };

            if frame.dimensions() != (cell.width, cell.height) {
                frame = image::imageops::resize(
                    &frame,
                    cell.width,
                    cell.height,
                    image::imageops::FilterType::Triangle,
                );
            }

            self.labels.draw(&mut frame, source.display_name());
            image::imageops::replace(&mut output, &frame, cell.x as i64, cell.y as i64);
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_set::SourceSet;
    use gridsync_grid_model::layout::GridSpec;
    use gridsync_media::synthetic::{read_synthetic_pixel, SyntheticOpener};

    fn two_by_two(opener: &SyntheticOpener, paths: &[&str]) -> SourceSet {
        let paths: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
        let (set, _) = SourceSet::open(
            &paths,
            GridSpec::new(2, 2).unwrap(),
            CanvasSize::new(40, 30),
            opener,
        )
        .unwrap();
        set
    }

    #[test]
    fn test_cells_receive_their_source_frame() {
        let opener = SyntheticOpener::new()
            .with_source("/a.mp4", 10, 1)
            .with_source("/b.mp4", 10, 2)
            .with_source("/c.mp4", 10, 3);
        let mut set = two_by_two(&opener, &["/a.mp4", "/b.mp4", "/c.mp4"]);
        let frame = set.compose(&FrameCompositor::default(), 5);

        assert_eq!(frame.dimensions(), (40, 30));
        let cells = set.cells().to_vec();
        assert_eq!(read_synthetic_pixel(frame.get_pixel(cells[0].x, cells[0].y)), (1, 5));
        assert_eq!(read_synthetic_pixel(frame.get_pixel(cells[1].x, cells[1].y)), (2, 5));
        assert_eq!(read_synthetic_pixel(frame.get_pixel(cells[2].x, cells[2].y)), (3, 5));
        // margin column between cells stays background
        assert_eq!(*frame.get_pixel(cells[0].right(), 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_exhausted_source_renders_black() {
        let opener = SyntheticOpener::new()
            .with_source("/long.mp4", 20, 1)
            .with_source("/short.mp4", 5, 2);
        let mut set = two_by_two(&opener, &["/long.mp4", "/short.mp4"]);
        let frame = set.compose(&FrameCompositor::default(), 10);

        let cells = set.cells().to_vec();
        assert_eq!(read_synthetic_pixel(frame.get_pixel(cells[0].x, cells[0].y)), (1, 10));
        assert_eq!(*frame.get_pixel(cells[1].x, cells[1].y), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_compose_is_idempotent() {
        let opener = SyntheticOpener::new()
            .with_source("/a.mp4", 10, 9)
            .with_source("/b.mp4", 10, 4);
        let mut set = two_by_two(&opener, &["/a.mp4", "/b.mp4"]);
        let compositor = FrameCompositor::default();

        let first = set.compose(&compositor, 3);
        let second = set.compose(&compositor, 3);
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_label_scale_is_clamped() {
        assert_eq!(label_scale(100, 50), 0.3);
        assert_eq!(label_scale(399, 299), 299.0 / 400.0);
        assert_eq!(label_scale(2000, 1200), 1.0);
    }

    #[test]
    fn test_disabled_labels_leave_frame_untouched() {
        let mut frame = PixelBuffer::from_pixel(8, 8, Rgb([10, 20, 30]));
        let before = frame.clone();
        LabelRenderer::disabled().draw(&mut frame, "clip.mp4");
        assert_eq!(frame, before);
    }

    fn system_labels() -> Option<LabelRenderer> {
        let labels = LabelRenderer::from_config(&LabelConfig::default());
        if !labels.is_enabled() {
            eprintln!("no label font installed, skipping");
            return None;
        }
        Some(labels)
    }

    fn is_text_pixel(p: &Rgb<u8>) -> bool {
        p.0.iter().all(|c| *c > 200)
    }

    #[test]
    fn test_label_box_sits_at_bottom_centre() {
        let Some(labels) = system_labels() else {
            return;
        };
        let opener = SyntheticOpener::new()
            .with_source("/front.mp4", 10, 200)
            .with_source("/rear.mp4", 10, 120);
        let paths = [PathBuf::from("/front.mp4"), PathBuf::from("/rear.mp4")];
        let (mut set, _) = SourceSet::open(
            &paths,
            GridSpec::new(2, 2).unwrap(),
            CanvasSize::new(800, 600),
            &opener,
        )
        .unwrap();
        let compositor = FrameCompositor::new(labels);
        let frame = set.compose(&compositor, 4);
        let cell = set.cells()[0];

        // padding row under the text, centred in the cell
        let centre_x = cell.x + cell.width / 2;
        let padding_y = cell.y + cell.height - 7;
        assert_eq!(*frame.get_pixel(centre_x, padding_y), Rgb([0, 0, 0]));

        let band_top = cell.y + cell.height - 60;
        let text_pixels = (band_top..cell.y + cell.height)
            .flat_map(|y| (cell.x..cell.x + cell.width).map(move |x| (x, y)))
            .filter(|&(x, y)| is_text_pixel(frame.get_pixel(x, y)))
            .count();
        assert!(text_pixels > 0);

        // source content away from the label is untouched
        assert_eq!(read_synthetic_pixel(frame.get_pixel(cell.x, cell.y)), (200, 4));
        assert_eq!(
            read_synthetic_pixel(frame.get_pixel(cell.x, cell.y + cell.height / 2)),
            (200, 4)
        );
        let rear = set.cells()[1];
        assert_eq!(read_synthetic_pixel(frame.get_pixel(rear.x, rear.y)), (120, 4));
        assert_eq!(*frame.get_pixel(cell.right(), padding_y), Rgb([0, 0, 0]));

        let again = set.compose(&compositor, 4);
        assert_eq!(frame.as_raw(), again.as_raw());
    }

    #[test]
    fn test_wide_label_stays_inside_its_cell() {
        let Some(labels) = system_labels() else {
            return;
        };
        let long = "/a_very_long_camera_name_that_cannot_fit_in_the_cell.mp4";
        let opener = SyntheticOpener::new()
            .with_source(long, 10, 200)
            .with_source("/b.mp4", 10, 120);
        let paths = [PathBuf::from(long), PathBuf::from("/b.mp4")];
        let (mut set, _) = SourceSet::open(
            &paths,
            GridSpec::new(1, 2).unwrap(),
            CanvasSize::new(200, 100),
            &opener,
        )
        .unwrap();
        let frame = set.compose(&FrameCompositor::new(labels), 2);
        let (left, right) = (set.cells()[0], set.cells()[1]);

        // the label spans the whole cell width
        let row = left.y + left.height - 7;
        assert_eq!(*frame.get_pixel(left.x, row), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(left.right() - 1, row), Rgb([0, 0, 0]));

        // margin and the neighbour's edge are not painted over
        for y in left.y..left.bottom() {
            assert_eq!(*frame.get_pixel(left.right(), y), Rgb([0, 0, 0]));
            assert_eq!(read_synthetic_pixel(frame.get_pixel(right.x, y)), (120, 2));
        }
    }

    #[test]
    fn test_disabled_config_skips_font_lookup() {
        let config = LabelConfig {
            enabled: false,
            ..LabelConfig::default()
        };
        assert!(!LabelRenderer::from_config(&config).is_enabled());
    }
}
