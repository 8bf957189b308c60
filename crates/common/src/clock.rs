//! Timing utilities for the playback and export loops.
//!
//! Playback is paced against a fixed epoch instead of sleeping a fixed
//! interval per frame, so slow iterations do not accumulate drift:
//! - [`FramePacer`] computes how long to sleep before the next frame
//! - [`ProgressThrottle`] limits how often progress is reported

use std::time::{Duration, Instant};

/// Nominal frame rate of the shared comparison timeline.
pub const NOMINAL_BASE_FPS: f64 = 30.0;

/// Target inter-frame interval for a playback speed multiplier.
pub fn frame_interval(speed_multiplier: f64) -> Duration {
    Duration::from_secs_f64(1.0 / (NOMINAL_BASE_FPS * speed_multiplier))
}

/// Time left to sleep so that `frames_emitted` frames line up with
/// `interval * frames_emitted` since the epoch.
pub fn remaining_sleep(elapsed: Duration, interval: Duration, frames_emitted: u64) -> Duration {
    let expected = interval.as_secs_f64() * frames_emitted as f64;
    let remaining = expected - elapsed.as_secs_f64();
    if remaining > 0.0 {
        Duration::from_secs_f64(remaining)
    } else {
        Duration::ZERO
    }
}

/// Drift-free pacing for a loop that emits frames at a (possibly changing) interval.
///
/// When the interval changes the epoch is rebased to the current instant,
/// so a speed change affects only the frames that follow it.
#[derive(Debug)]
pub struct FramePacer {
    epoch: Instant,
    interval: Duration,
    frames_emitted: u64,
}

impl FramePacer {
    /// Create a pacer anchored to now.
    pub fn start(interval: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            interval,
            frames_emitted: 0,
        }
    }

    /// Record one emitted frame and return how long to sleep before the next.
    pub fn frame_emitted(&mut self, interval: Duration) -> Duration {
        if interval != self.interval {
            self.epoch = Instant::now();
            self.interval = interval;
            self.frames_emitted = 0;
        }
        self.frames_emitted += 1;
        remaining_sleep(self.epoch.elapsed(), self.interval, self.frames_emitted)
    }

    /// Frames emitted since the last rebase.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Current target interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Emits a tick each time a counter crosses a multiple of `every`.
#[derive(Debug)]
pub struct ProgressThrottle {
    every: u64,
    last_bucket: Option<u64>,
}

impl ProgressThrottle {
    /// Create a throttle that fires once per `every` counted units.
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            last_bucket: None,
        }
    }

    /// Check whether a report is due at `count`.
    /// The first call always returns true.
    pub fn should_report(&mut self, count: u64) -> bool {
        let bucket = count / self.every;
        match self.last_bucket {
            Some(last) if bucket <= last => false,
            _ => {
                self.last_bucket = Some(bucket);
                true
            }
        }
    }

    /// Report granularity.
    pub fn every(&self) -> u64 {
        self.every
    }
}
