//! A source video bound to one grid cell.

use std::path::{Path, PathBuf};

use gridsync_common::error::GridsyncResult;
use gridsync_grid_model::naming::display_name;

use crate::decoder::{FrameDecoder, SourceOpener};
use crate::probe::MediaInfo;
use crate::{FrameSize, PixelBuffer};

/// One opened video file producing frames at a fixed cell size.
///
/// Frame retrieval never fails: an out-of-range index, a released handle, or a
/// decode error all yield `None`, which callers render as a blank cell.
pub struct VideoSource {
    path: PathBuf,
    display_name: String,
    info: MediaInfo,
    size: FrameSize,
    decoder: Option<Box<dyn FrameDecoder>>,
    decode_misses: u64,
}

impl VideoSource {
    /// Open `path` through `opener`, producing frames of `size`.
    pub fn open(path: &Path, size: FrameSize, opener: &dyn SourceOpener) -> GridsyncResult<Self> {
        let opened = opener.open(path, size)?;
        tracing::info!(
            path = %path.display(),
            backend = opener.name(),
            frames = opened.info.frame_count,
            fps = opened.info.fps,
            width = size.width,
            height = size.height,
            "Opened video source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            display_name: display_name(path),
            info: opened.info,
            size,
            decoder: Some(opened.decoder),
            decode_misses: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Label text for this source.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    pub fn nominal_fps(&self) -> f64 {
        self.info.fps
    }

    /// Native dimensions of the source stream.
    pub fn native_size(&self) -> FrameSize {
        FrameSize::new(self.info.width, self.info.height)
    }

    /// Size of the frames returned by [`VideoSource::frame_at`].
    pub fn frame_size(&self) -> FrameSize {
        self.size
    }

    /// Number of in-range requests that failed to decode.
    pub fn decode_misses(&self) -> u64 {
        self.decode_misses
    }

    pub fn is_released(&self) -> bool {
        self.decoder.is_none()
    }

    /// Seek to `index`, decode one frame, and return it at the cell size.
    pub fn frame_at(&mut self, index: i64) -> Option<PixelBuffer> {
        if index < 0 || index as u64 >= self.info.frame_count {
            return None;
        }
        let decoder = self.decoder.as_mut()?;

        match decoder.decode_frame(index as u64) {
            Ok(frame) if frame.dimensions() == (self.size.width, self.size.height) => Some(frame),
            Ok(frame) => Some(image::imageops::resize(
                &frame,
                self.size.width,
                self.size.height,
                image::imageops::FilterType::Triangle,
            )),
            Err(e) => {
                self.decode_misses += 1;
                tracing::debug!(
                    path = %self.path.display(),
                    index,
                    error = %e,
                    "Frame decode miss"
                );
                None
            }
        }
    }

    /// Free the decode handle. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.close();
            tracing::debug!(path = %self.path.display(), "Released video source");
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("frame_count", &self.info.frame_count)
            .field("fps", &self.info.fps)
            .field("size", &self.size)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{read_synthetic_pixel, SyntheticOpener};

    fn open_synthetic(frames: u64) -> VideoSource {
        let opener = SyntheticOpener::new().with_source("/clips/a.mp4", frames, 7);
        VideoSource::open(Path::new("/clips/a.mp4"), FrameSize::new(16, 9), &opener).unwrap()
    }

    #[test]
    fn test_frame_at_returns_cell_sized_frame() {
        let mut source = open_synthetic(10);
        let frame = source.frame_at(3).unwrap();
        assert_eq!(frame.dimensions(), (16, 9));
        assert_eq!(read_synthetic_pixel(frame.get_pixel(0, 0)), (7, 3));
    }

    #[test]
    fn test_out_of_range_is_no_frame() {
        let mut source = open_synthetic(10);
        assert!(source.frame_at(10).is_none());
        assert!(source.frame_at(-1).is_none());
        assert!(source.frame_at(i64::MAX).is_none());
        assert_eq!(source.decode_misses(), 0);
    }

    #[test]
    fn test_decode_failure_is_no_frame() {
        let opener = SyntheticOpener::new()
            .with_source("/clips/a.mp4", 10, 1)
            .failing_decode_at("/clips/a.mp4", 4);
        let mut source =
            VideoSource::open(Path::new("/clips/a.mp4"), FrameSize::new(4, 4), &opener).unwrap();
        assert!(source.frame_at(4).is_none());
        assert_eq!(source.decode_misses(), 1);
        assert!(source.frame_at(5).is_some());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut source = open_synthetic(10);
        source.release();
        source.release();
        assert!(source.is_released());
        assert!(source.frame_at(0).is_none());
    }

    #[test]
    fn test_display_name() {
        let source = open_synthetic(1);
        assert_eq!(source.display_name(), "a.mp4");
        assert_eq!(source.frame_count(), 1);
    }
}
