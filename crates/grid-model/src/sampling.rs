//! Frame-sampling policy: maps the logical comparison timeline to the
//! output frame sequence of an export at a given speed.
//!
//! - Speed >= 1 skips: output frame `i` shows logical frame `floor(i * speed)`.
//! - Speed < 1 duplicates: every logical frame is written `floor(1 / speed)` times.
//!
//! The output is always encoded at a fixed rate, so skipping speeds the
//! result up and duplication slows it down.

use crate::speed::SpeedMultiplier;

/// How logical frames are turned into output frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingMode {
    /// Sample every `step`-th logical frame (fractional steps are floored per frame).
    Skip { step: f64 },
    /// Write each logical frame `count` times.
    Repeat { count: u64 },
}

/// One logical frame to composite, written `repeat` times in a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledFrame {
    pub logical_frame: u64,
    pub repeat: u64,
}

/// A deterministic export plan for a timeline of `max_frames` logical frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPlan {
    max_frames: u64,
    mode: SamplingMode,
    total_output_frames: u64,
}

impl SamplingPlan {
    pub fn new(max_frames: u64, speed: SpeedMultiplier) -> Self {
        let speed = speed.value();
        if speed >= 1.0 {
            Self {
                max_frames,
                mode: SamplingMode::Skip { step: speed },
                total_output_frames: (max_frames as f64 / speed).floor() as u64,
            }
        } else {
            let count = ((1.0 / speed).floor() as u64).max(1);
            Self {
                max_frames,
                mode: SamplingMode::Repeat { count },
                total_output_frames: max_frames.saturating_mul(count),
            }
        }
    }

    pub fn max_frames(&self) -> u64 {
        self.max_frames
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    /// Number of frames the encoder will receive.
    pub fn total_output_frames(&self) -> u64 {
        self.total_output_frames
    }

    /// Logical frames to composite, in output order. Each is composited once.
    pub fn frames(&self) -> Box<dyn Iterator<Item = SampledFrame> + Send> {
        let max_frames = self.max_frames;
        match self.mode {
            SamplingMode::Skip { step } => Box::new(
                (0..self.total_output_frames)
                    .map(move |i| (i as f64 * step).floor() as u64)
                    .take_while(move |frame| *frame < max_frames)
                    .map(|logical_frame| SampledFrame {
                        logical_frame,
                        repeat: 1,
                    }),
            ),
            SamplingMode::Repeat { count } => {
                Box::new((0..max_frames).map(move |logical_frame| SampledFrame {
                    logical_frame,
                    repeat: count,
                }))
            }
        }
    }

    /// The logical frame shown at every output position, duplicates expanded.
    pub fn output_sequence(&self) -> impl Iterator<Item = u64> {
        self.frames()
            .flat_map(|f| std::iter::repeat(f.logical_frame).take(f.repeat as usize))
    }
}
