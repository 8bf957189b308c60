//! GridSync Media
//!
//! Frame-level access to source videos and output encoders.
//!
//! ```text
//! clip_a.mp4 ──► ffprobe (metadata)
//!           └──► ffmpeg -ss t -i clip_a.mp4 -vf scale=WxH ─► rgb24 pipe ─► VideoSource::frame_at
//!
//! composited RgbImage ─► rgb24 pipe ─► ffmpeg -f rawvideo -i - ─► output.mp4
//! ```
//!
//! Both ends sit behind traits ([`SourceOpener`]/[`FrameDecoder`] and
//! [`EncoderFactory`]/[`EncoderSink`]) so the synthetic backends in
//! [`synthetic`] can stand in for ffmpeg.

pub mod decoder;
pub mod encoder;
pub mod probe;
pub mod source;
pub mod synthetic;
pub mod tools;

pub use decoder::*;
pub use encoder::*;
pub use probe::MediaInfo;
pub use source::*;
pub use tools::{command_exists, ToolReport};

/// Frames are tightly packed 8-bit RGB.
pub type PixelBuffer = image::RgbImage;

/// Width and height of a decoded frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Bytes in one rgb24 frame of this size.
    pub fn rgb24_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}
