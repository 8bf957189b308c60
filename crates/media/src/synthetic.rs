//! In-memory backends for tests and dry runs.
//!
//! Synthetic frames are solid colour. The red channel carries the source tag and
//! green/blue carry the frame index, so a composited pixel identifies exactly
//! which source frame landed in a cell.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gridsync_common::error::{GridsyncError, GridsyncResult};
use image::Rgb;

use crate::decoder::{FrameDecoder, OpenedSource, SourceOpener};
use crate::encoder::{EncoderFactory, EncoderSink};
use crate::probe::{MediaInfo, DEFAULT_FPS};
use crate::{FrameSize, PixelBuffer};

/// Pixel value for frame `index` of the source tagged `tag`.
pub fn synthetic_pixel(tag: u8, index: u64) -> Rgb<u8> {
    Rgb([tag, (index & 0xff) as u8, ((index >> 8) & 0xff) as u8])
}

/// Inverse of [`synthetic_pixel`]: `(tag, index)`.
pub fn read_synthetic_pixel(px: &Rgb<u8>) -> (u8, u64) {
    (px.0[0], px.0[1] as u64 | (px.0[2] as u64) << 8)
}

#[derive(Debug, Clone)]
struct SyntheticClip {
    frame_count: u64,
    tag: u8,
    failing: HashSet<u64>,
}

/// Opens registered fake paths. Unknown paths fail with `SourceOpen`.
#[derive(Debug, Clone, Default)]
pub struct SyntheticOpener {
    sources: HashMap<PathBuf, SyntheticClip>,
    decode_log: Arc<Mutex<Vec<(PathBuf, u64)>>>,
}

impl SyntheticOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source with `frame_count` frames whose pixels carry `tag`.
    pub fn with_source(mut self, path: impl Into<PathBuf>, frame_count: u64, tag: u8) -> Self {
        self.sources.insert(
            path.into(),
            SyntheticClip {
                frame_count,
                tag,
                failing: HashSet::new(),
            },
        );
        self
    }

    /// Make decoding `index` of `path` fail.
    pub fn failing_decode_at(mut self, path: impl AsRef<Path>, index: u64) -> Self {
        if let Some(clip) = self.sources.get_mut(path.as_ref()) {
            clip.failing.insert(index);
        }
        self
    }

    /// Every successful decode so far, in order.
    pub fn decoded(&self) -> Vec<(PathBuf, u64)> {
        self.decode_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Successful decodes of `path`.
    pub fn decode_count(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.decoded().iter().filter(|(p, _)| p == path).count()
    }
}

impl SourceOpener for SyntheticOpener {
    fn open(&self, path: &Path, size: FrameSize) -> GridsyncResult<OpenedSource> {
        let clip = self
            .sources
            .get(path)
            .cloned()
            .ok_or_else(|| GridsyncError::source_open(path, "unknown synthetic source"))?;

        Ok(OpenedSource {
            info: MediaInfo {
                width: size.width,
                height: size.height,
                frame_count: clip.frame_count,
                fps: DEFAULT_FPS,
            },
            decoder: Box::new(SyntheticDecoder {
                path: path.to_path_buf(),
                clip,
                size,
                log: Arc::clone(&self.decode_log),
                closed: false,
            }),
        })
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

struct SyntheticDecoder {
    path: PathBuf,
    clip: SyntheticClip,
    size: FrameSize,
    log: Arc<Mutex<Vec<(PathBuf, u64)>>>,
    closed: bool,
}

impl FrameDecoder for SyntheticDecoder {
    fn decode_frame(&mut self, index: u64) -> GridsyncResult<PixelBuffer> {
        if self.closed {
            return Err(GridsyncError::decode("decoder closed"));
        }
        if index >= self.clip.frame_count || self.clip.failing.contains(&index) {
            return Err(GridsyncError::decode(format!(
                "synthetic decode failure at {index}"
            )));
        }
        if let Ok(mut log) = self.log.lock() {
            log.push((self.path.clone(), index));
        }
        Ok(PixelBuffer::from_pixel(
            self.size.width,
            self.size.height,
            synthetic_pixel(self.clip.tag, index),
        ))
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// What a [`RecordingEncoderFactory`] sink received.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames: Vec<PixelBuffer>,
    pub finished: bool,
}

/// Keeps encoded frames in memory instead of writing a file.
#[derive(Debug, Clone, Default)]
pub struct RecordingEncoderFactory {
    recordings: Arc<Mutex<Vec<Recording>>>,
    fail_open: bool,
    fail_after: Option<u64>,
}

impl RecordingEncoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `open` fails with `EncoderOpen`.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Writes fail with `EncodeWrite` once `frames` frames were accepted.
    pub fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Snapshot of all sinks opened so far.
    pub fn recordings(&self) -> Vec<Recording> {
        self.recordings
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// The most recently opened sink.
    pub fn last_recording(&self) -> Option<Recording> {
        self.recordings().pop()
    }
}

impl EncoderFactory for RecordingEncoderFactory {
    fn open(
        &self,
        output: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> GridsyncResult<Box<dyn EncoderSink>> {
        if self.fail_open {
            return Err(GridsyncError::encoder_open("recording encoder refused to open"));
        }

        let slot = {
            let mut recordings = self
                .recordings
                .lock()
                .map_err(|_| GridsyncError::encoder_open("recording state poisoned"))?;
            recordings.push(Recording {
                output: output.to_path_buf(),
                width,
                height,
                fps,
                ..Recording::default()
            });
            recordings.len() - 1
        };

        Ok(Box::new(RecordingSink {
            recordings: Arc::clone(&self.recordings),
            slot,
            width,
            height,
            fail_after: self.fail_after,
            frames_written: 0,
        }))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct RecordingSink {
    recordings: Arc<Mutex<Vec<Recording>>>,
    slot: usize,
    width: u32,
    height: u32,
    fail_after: Option<u64>,
    frames_written: u64,
}

impl RecordingSink {
    fn with_recording<T>(&self, f: impl FnOnce(&mut Recording) -> T) -> GridsyncResult<T> {
        let mut recordings = self
            .recordings
            .lock()
            .map_err(|_| GridsyncError::encode_write("recording state poisoned"))?;
        recordings
            .get_mut(self.slot)
            .map(f)
            .ok_or_else(|| GridsyncError::encode_write("recording slot missing"))
    }
}

impl EncoderSink for RecordingSink {
    fn write_frame(&mut self, frame: &PixelBuffer) -> GridsyncResult<()> {
        if self.fail_after.is_some_and(|limit| self.frames_written >= limit) {
            return Err(GridsyncError::encode_write("recording sink is full"));
        }
        if frame.dimensions() != (self.width, self.height) {
            return Err(GridsyncError::encode_write(format!(
                "Frame is {}x{}, sink expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        self.with_recording(|r| r.frames.push(frame.clone()))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> GridsyncResult<()> {
        self.with_recording(|r| r.finished = true)
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_encoding_round_trips_wide_indices() {
        for (tag, index) in [(0u8, 0u64), (3, 255), (9, 256), (200, 65_535)] {
            assert_eq!(read_synthetic_pixel(&synthetic_pixel(tag, index)), (tag, index));
        }
    }

    #[test]
    fn test_unknown_path_fails_to_open() {
        let opener = SyntheticOpener::new();
        let err = opener
            .open(Path::new("/nope.mp4"), FrameSize::new(2, 2))
            .err()
            .unwrap();
        assert!(matches!(err, GridsyncError::SourceOpen { .. }));
    }

    #[test]
    fn test_opened_handles_are_independent() {
        let opener = SyntheticOpener::new().with_source("/a.mp4", 5, 1);
        let mut first = opener.open(Path::new("/a.mp4"), FrameSize::new(2, 2)).unwrap();
        let mut second = opener.open(Path::new("/a.mp4"), FrameSize::new(2, 2)).unwrap();
        first.decoder.close();
        assert!(first.decoder.decode_frame(0).is_err());
        assert!(second.decoder.decode_frame(0).is_ok());
        assert_eq!(opener.decode_count("/a.mp4"), 1);
    }

    #[test]
    fn test_recording_sink_fails_after_limit() {
        let factory = RecordingEncoderFactory::new().failing_after(1);
        let mut sink = factory.open(Path::new("/o.mp4"), 2, 2, 30).unwrap();
        let frame = PixelBuffer::new(2, 2);
        sink.write_frame(&frame).unwrap();
        assert!(matches!(
            sink.write_frame(&frame),
            Err(GridsyncError::EncodeWrite { .. })
        ));
        assert_eq!(factory.last_recording().unwrap().frames.len(), 1);
    }
}
