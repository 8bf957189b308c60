//! Playback state machine and the paced frame loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use gridsync_common::clock::{frame_interval, FramePacer};
use gridsync_grid_model::speed::SpeedMultiplier;
use gridsync_media::PixelBuffer;
use gridsync_render_engine::{FrameCompositor, SourceSet};

/// Receives composited frames for display.
pub trait DisplaySink: Send + Sync {
    /// Show `frame`, the composite of logical frame `frame_index`.
    fn present(&self, frame: &PixelBuffer, frame_index: u64);
}

/// Discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn present(&self, _frame: &PixelBuffer, _frame_index: u64) {}
}

/// Keeps the most recent frame and the order of presented indices.
#[derive(Debug, Default)]
pub struct FrameCapture {
    state: Mutex<CaptureState>,
}

#[derive(Debug, Default)]
struct CaptureState {
    latest: Option<(u64, PixelBuffer)>,
    presented: Vec<u64>,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent `(frame_index, frame)`.
    pub fn latest(&self) -> Option<(u64, PixelBuffer)> {
        self.lock().latest.clone()
    }

    /// Every presented frame index, in order.
    pub fn presented(&self) -> Vec<u64> {
        self.lock().presented.clone()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.latest = None;
        state.presented.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplaySink for FrameCapture {
    fn present(&self, frame: &PixelBuffer, frame_index: u64) {
        let mut state = self.lock();
        state.latest = Some((frame_index, frame.clone()));
        state.presented.push(frame_index);
    }
}

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// Timeline values shared between the control thread and the loop.
///
/// `run_token` is 0 while stopped and holds the generation of the loop that
/// is allowed to run otherwise. Each play gets a fresh generation, so a loop
/// left over from an earlier play exits on its next check.
#[derive(Debug)]
struct Timeline {
    current_frame: AtomicU64,
    max_frames: AtomicU64,
    speed_bits: AtomicU64,
    run_token: AtomicU64,
    next_generation: AtomicU64,
}

impl Timeline {
    fn new(max_frames: u64, speed: SpeedMultiplier) -> Self {
        Self {
            current_frame: AtomicU64::new(0),
            max_frames: AtomicU64::new(max_frames),
            speed_bits: AtomicU64::new(speed.value().to_bits()),
            run_token: AtomicU64::new(0),
            next_generation: AtomicU64::new(1),
        }
    }

    fn speed(&self) -> SpeedMultiplier {
        SpeedMultiplier::new(f64::from_bits(self.speed_bits.load(Ordering::Acquire)))
            .unwrap_or(SpeedMultiplier::NORMAL)
    }

    fn is_running(&self, generation: u64) -> bool {
        self.run_token.load(Ordering::Acquire) == generation
    }

    /// End the run of `generation` unless it was already replaced.
    fn finish(&self, generation: u64) -> bool {
        self.run_token
            .compare_exchange(generation, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Owns the shared frame index and the play/stop state machine.
///
/// Control calls never block on decoding: `seek`, `step` and `set_speed`
/// only update atomics, and `toggle` spawns or signals the loop thread.
pub struct PlaybackController {
    timeline: Arc<Timeline>,
    sources: Arc<Mutex<SourceSet>>,
    compositor: FrameCompositor,
    display: Arc<dyn DisplaySink>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackController {
    pub fn new(
        sources: Arc<Mutex<SourceSet>>,
        compositor: FrameCompositor,
        display: Arc<dyn DisplaySink>,
    ) -> Self {
        let max_frames = lock_sources(&sources).max_frames();
        Self {
            timeline: Arc::new(Timeline::new(max_frames, SpeedMultiplier::NORMAL)),
            sources,
            compositor,
            display,
            worker: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        if self.is_playing() {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        self.timeline.run_token.load(Ordering::Acquire) != 0
    }

    pub fn current_frame(&self) -> u64 {
        self.timeline.current_frame.load(Ordering::Acquire)
    }

    pub fn max_frames(&self) -> u64 {
        self.timeline.max_frames.load(Ordering::Acquire)
    }

    pub fn speed(&self) -> SpeedMultiplier {
        self.timeline.speed()
    }

    /// Change the preview rate. A running loop picks it up on its next frame.
    pub fn set_speed(&self, speed: SpeedMultiplier) {
        self.timeline
            .speed_bits
            .store(speed.value().to_bits(), Ordering::Release);
        tracing::debug!(%speed, "Playback speed changed");
    }

    pub fn set_compositor(&mut self, compositor: FrameCompositor) {
        self.compositor = compositor;
    }

    /// Jump to `frame`, clamped to the timeline. Valid in either state.
    pub fn seek(&self, frame: i64) -> u64 {
        let last = self.max_frames().saturating_sub(1);
        let target = frame.clamp(0, last.min(i64::MAX as u64) as i64) as u64;
        self.timeline.current_frame.store(target, Ordering::Release);
        target
    }

    /// Move by `delta` frames, clamped to the timeline.
    pub fn step(&self, delta: i64) -> u64 {
        let current = self.current_frame() as i64;
        self.seek(current.saturating_add(delta))
    }

    /// Flip between `Playing` and `Stopped`.
    pub fn toggle(&mut self) -> PlaybackState {
        match self.state() {
            PlaybackState::Playing => {
                self.stop();
                PlaybackState::Stopped
            }
            PlaybackState::Stopped => self.play(),
        }
    }

    /// Start the paced loop from the current frame.
    pub fn play(&mut self) -> PlaybackState {
        if self.is_playing() {
            return PlaybackState::Playing;
        }
        if self.max_frames() == 0 {
            tracing::debug!("Nothing to play");
            return PlaybackState::Stopped;
        }

        let generation = self.timeline.next_generation.fetch_add(1, Ordering::AcqRel);
        self.timeline.run_token.store(generation, Ordering::Release);

        let timeline = Arc::clone(&self.timeline);
        let sources = Arc::clone(&self.sources);
        let compositor = self.compositor.clone();
        let display = Arc::clone(&self.display);

        let spawned = std::thread::Builder::new()
            .name("gridsync-playback".to_string())
            .spawn(move || run_loop(generation, timeline, sources, compositor, display));

        match spawned {
            Ok(handle) => {
                // An older loop still winding down exits on its own.
                self.worker = Some(handle);
                tracing::info!(
                    generation,
                    from = self.current_frame(),
                    max_frames = self.max_frames(),
                    speed = %self.speed(),
                    "Playback started"
                );
                PlaybackState::Playing
            }
            Err(e) => {
                self.timeline.finish(generation);
                tracing::error!(error = %e, "Failed to spawn playback thread");
                PlaybackState::Stopped
            }
        }
    }

    /// Signal the loop to stop. Does not wait for it.
    pub fn stop(&mut self) {
        if self.timeline.run_token.swap(0, Ordering::AcqRel) != 0 {
            tracing::info!(at = self.current_frame(), "Playback stopped");
        }
    }

    /// Stop and wait for the loop thread to exit.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Playback thread panicked");
            }
        }
    }

    /// Stop, then point the controller at a rebuilt timeline starting at 0.
    pub fn reset(&mut self, max_frames: u64) {
        self.shutdown();
        self.timeline.max_frames.store(max_frames, Ordering::Release);
        self.timeline.current_frame.store(0, Ordering::Release);
    }

    /// Composite the current frame and present it.
    pub fn render_current(&self) -> u64 {
        let index = self.current_frame();
        let frame = lock_sources(&self.sources).compose(&self.compositor, index as i64);
        self.display.present(&frame, index);
        index
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub(crate) fn lock_sources(sources: &Mutex<SourceSet>) -> std::sync::MutexGuard<'_, SourceSet> {
    sources.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Present frames from the current index until the timeline ends or the run
/// is superseded. The speed is re-read after every frame.
///
/// At the end the index stays on the last presented frame (`max_frames - 1`)
/// instead of moving past it, so a stopped timeline always shows a valid frame.
fn run_loop(
    generation: u64,
    timeline: Arc<Timeline>,
    sources: Arc<Mutex<SourceSet>>,
    compositor: FrameCompositor,
    display: Arc<dyn DisplaySink>,
) {
    let mut pacer = FramePacer::start(frame_interval(timeline.speed().value()));

    while timeline.is_running(generation) {
        let index = timeline.current_frame.load(Ordering::Acquire);
        let max_frames = timeline.max_frames.load(Ordering::Acquire);
        if index >= max_frames {
            timeline.finish(generation);
            break;
        }

        let frame = lock_sources(&sources).compose(&compositor, index as i64);
        if !timeline.is_running(generation) {
            break;
        }
        display.present(&frame, index);

        // A seek since `index` was read wins over the increment.
        let next = index + 1;
        if next >= max_frames {
            timeline.finish(generation);
            tracing::debug!(last = index, "Playback reached end of timeline");
            break;
        }
        let _ = timeline.current_frame.compare_exchange(
            index,
            next,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        let sleep = pacer.frame_emitted(frame_interval(timeline.speed().value()));
        if !sleep.is_zero() {
            std::thread::sleep(sleep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsync_grid_model::layout::{CanvasSize, GridSpec};
    use gridsync_media::synthetic::SyntheticOpener;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn controller(frames: u64) -> (PlaybackController, Arc<FrameCapture>) {
        let opener = SyntheticOpener::new().with_source("/a.mp4", frames, 1);
        let (set, _) = SourceSet::open(
            &[PathBuf::from("/a.mp4")],
            GridSpec::new(1, 1).unwrap(),
            CanvasSize::new(4, 4),
            &opener,
        )
        .unwrap();
        let capture = Arc::new(FrameCapture::new());
        let controller = PlaybackController::new(
            Arc::new(Mutex::new(set)),
            FrameCompositor::default(),
            capture.clone(),
        );
        (controller, capture)
    }

    fn wait_until_stopped(controller: &PlaybackController) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.is_playing() {
            assert!(Instant::now() < deadline, "playback did not stop");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_seek_clamps_to_timeline() {
        let (controller, _) = controller(50);
        assert_eq!(controller.seek(10), 10);
        assert_eq!(controller.seek(-3), 0);
        assert_eq!(controller.seek(500), 49);
        assert_eq!(controller.step(-1), 48);
        assert_eq!(controller.step(5), 49);
    }

    #[test]
    fn test_seek_on_empty_timeline_stays_at_zero() {
        let (mut controller, _) = controller(0);
        assert_eq!(controller.seek(7), 0);
        assert_eq!(controller.toggle(), PlaybackState::Stopped);
    }

    #[test]
    fn test_play_runs_to_end_and_stops() {
        let (mut controller, capture) = controller(12);
        controller.set_speed(SpeedMultiplier::new(4.0).unwrap());
        assert_eq!(controller.toggle(), PlaybackState::Playing);
        wait_until_stopped(&controller);

        assert_eq!(capture.presented(), (0..12).collect::<Vec<u64>>());
        assert_eq!(controller.current_frame(), 11);
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_toggle_stops_a_running_loop() {
        let (mut controller, capture) = controller(10_000);
        controller.toggle();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(controller.toggle(), PlaybackState::Stopped);
        controller.shutdown();

        let shown = capture.presented().len();
        assert!(shown > 0 && shown < 10_000);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(capture.presented().len(), shown);
    }

    fn wait_for(capture: &FrameCapture, what: impl Fn(&[u64]) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !what(&capture.presented()) {
            assert!(Instant::now() < deadline, "frames never presented");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_seek_while_playing_redirects_the_loop() {
        let (mut controller, capture) = controller(100_000);
        controller.set_speed(SpeedMultiplier::new(4.0).unwrap());
        controller.play();
        wait_for(&capture, |shown| shown.len() >= 3);

        assert_eq!(controller.seek(50_000), 50_000);
        wait_for(&capture, |shown| shown.contains(&50_005));
        controller.stop();

        let shown = capture.presented();
        let jump = shown.iter().position(|i| *i == 50_000).unwrap();
        assert!(jump >= 3);
        assert_eq!(shown[..jump].to_vec(), (0..jump as u64).collect::<Vec<_>>());
        assert!(shown[jump..].windows(2).all(|w| w[1] == w[0] + 1));
        assert!(controller.current_frame() > 50_000);
    }

    #[test]
    fn test_speed_change_applies_to_running_loop() {
        let (mut controller, capture) = controller(40);
        controller.set_speed(SpeedMultiplier::new(0.25).unwrap());
        controller.play();
        wait_for(&capture, |shown| !shown.is_empty());

        // 39 frames at 0.25x would take over five seconds
        let changed = Instant::now();
        controller.set_speed(SpeedMultiplier::new(4.0).unwrap());
        wait_until_stopped(&controller);

        assert!(changed.elapsed() < Duration::from_secs(2));
        assert_eq!(capture.presented(), (0..40).collect::<Vec<u64>>());
    }

    #[test]
    fn test_render_current_presents_seek_target() {
        let (controller, capture) = controller(30);
        controller.seek(17);
        assert_eq!(controller.render_current(), 17);
        assert_eq!(capture.latest().map(|(i, _)| i), Some(17));
    }

    #[test]
    fn test_reset_rewinds_and_resizes_timeline() {
        let (mut controller, _) = controller(30);
        controller.seek(20);
        controller.reset(5);
        assert_eq!(controller.current_frame(), 0);
        assert_eq!(controller.max_frames(), 5);
        assert_eq!(controller.seek(9), 4);
    }
}
