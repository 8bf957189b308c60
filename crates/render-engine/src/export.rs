//! Speed-aware grid export.

use std::path::PathBuf;
use std::sync::Arc;

use gridsync_common::clock::ProgressThrottle;
use gridsync_common::config::ExportSettings;
use gridsync_common::error::{GridsyncError, GridsyncResult};
use gridsync_grid_model::sampling::SamplingPlan;
use gridsync_grid_model::speed::SpeedMultiplier;
use gridsync_media::EncoderFactory;
use serde::Serialize;

use crate::compositor::FrameCompositor;
use crate::source_set::SourceSet;

/// Output frame rate of exported videos.
pub const EXPORT_FPS: u32 = 30;

/// An export job ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Output file path.
    pub output_path: PathBuf,

    /// Playback speed baked into the output.
    pub speed: SpeedMultiplier,
}

impl ExportJob {
    pub fn new(output_path: PathBuf, speed: SpeedMultiplier) -> Self {
        Self { output_path, speed }
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Pending,
    Initializing,
    Encoding,
    Completed,
    Failed,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Initializing => "initializing",
            Self::Encoding => "encoding",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Export progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportProgress {
    /// Current stage.
    pub state: ExportState,

    /// Output frames handed to the encoder so far.
    pub frames_written: u64,

    /// Output frames the job will write in total.
    pub total_frames: u64,

    /// Human-readable status or the captured error.
    pub message: String,
}

impl ExportProgress {
    pub fn new(
        state: ExportState,
        frames_written: u64,
        total_frames: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            state,
            frames_written,
            total_frames,
            message: message.into(),
        }
    }

    pub fn pending() -> Self {
        Self::new(ExportState::Pending, 0, 0, "Waiting to start")
    }

    /// Completion in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        if self.total_frames == 0 {
            return if self.state == ExportState::Completed { 1.0 } else { 0.0 };
        }
        (self.frames_written as f64 / self.total_frames as f64).clamp(0.0, 1.0)
    }
}

/// Result of a completed export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub output_path: PathBuf,
    pub speed: SpeedMultiplier,
    pub frames_written: u64,
    pub logical_frames: u64,
}

/// Converts the logical timeline of a source set into an encoded video.
///
/// Speeds above 1.0 sample every `speed`-th logical frame; speeds below 1.0
/// write each logical frame `floor(1 / speed)` times. Each sampled frame is
/// composited once no matter how often it is written.
pub struct SpeedAwareExporter {
    encoder: Arc<dyn EncoderFactory>,
    compositor: FrameCompositor,
    settings: ExportSettings,
}

impl SpeedAwareExporter {
    pub fn new(
        encoder: Arc<dyn EncoderFactory>,
        compositor: FrameCompositor,
        settings: ExportSettings,
    ) -> Self {
        Self {
            encoder,
            compositor,
            settings,
        }
    }

    /// Render `sources` into `job.output_path`.
    ///
    /// The caller must own `sources` exclusively for the duration of the call.
    pub fn export(
        &self,
        job: &ExportJob,
        sources: &mut SourceSet,
        progress: Option<&ProgressCallback>,
    ) -> GridsyncResult<ExportSummary> {
        let report = |update: ExportProgress| {
            if let Some(cb) = progress {
                cb(update);
            }
        };

        if sources.active_count() == 0 {
            let err = GridsyncError::EmptySourceSet;
            report(ExportProgress::new(ExportState::Failed, 0, 0, err.to_string()));
            return Err(err);
        }

        let logical_frames = sources.max_frames();
        let plan = SamplingPlan::new(logical_frames, job.speed);
        let total = plan.total_output_frames();
        let canvas = sources.canvas();

        tracing::info!(
            output = %job.output_path.display(),
            speed = %job.speed,
            mode = ?plan.mode(),
            logical_frames,
            total_frames = total,
            %canvas,
            fps = EXPORT_FPS,
            backend = self.encoder.name(),
            "Starting grid export"
        );
        report(ExportProgress::new(
            ExportState::Initializing,
            0,
            total,
            "Opening encoder",
        ));

        let mut sink =
            match self
                .encoder
                .open(&job.output_path, canvas.width, canvas.height, EXPORT_FPS)
            {
                Ok(sink) => sink,
                Err(e) => return Err(self.fail(job, e, 0, total, progress)),
            };

        let mut throttle = ProgressThrottle::new(self.settings.progress_interval_frames);
        throttle.should_report(0);
        report(ExportProgress::new(ExportState::Encoding, 0, total, "Encoding"));

        let mut written = 0u64;
        for sampled in plan.frames() {
            // TODO: poll a cancellation flag here once ExportHandle grows cancel().
            let frame = sources.compose(&self.compositor, sampled.logical_frame as i64);

            for _ in 0..sampled.repeat {
                if let Err(e) = sink.write_frame(&frame) {
                    drop(sink);
                    return Err(self.fail(job, e, written, total, progress));
                }
                written += 1;

                if throttle.should_report(written) {
                    report(ExportProgress::new(
                        ExportState::Encoding,
                        written,
                        total,
                        format!("Exporting frame {written}/{total}"),
                    ));
                }
            }
        }

        if let Err(e) = sink.finish() {
            return Err(self.fail(job, e, written, total, progress));
        }

        tracing::info!(
            output = %job.output_path.display(),
            frames = written,
            "Grid export complete"
        );
        report(ExportProgress::new(
            ExportState::Completed,
            written,
            total,
            format!("Saved {}", job.output_path.display()),
        ));

        Ok(ExportSummary {
            output_path: job.output_path.clone(),
            speed: job.speed,
            frames_written: written,
            logical_frames,
        })
    }

    fn fail(
        &self,
        job: &ExportJob,
        error: GridsyncError,
        written: u64,
        total: u64,
        progress: Option<&ProgressCallback>,
    ) -> GridsyncError {
        tracing::error!(
            output = %job.output_path.display(),
            frames_written = written,
            error = %error,
            "Grid export failed"
        );

        if !self.settings.keep_partial_output && job.output_path.exists() {
            match std::fs::remove_file(&job.output_path) {
                Ok(()) => tracing::info!(
                    path = %job.output_path.display(),
                    "Removed partial export output"
                ),
                Err(e) => tracing::warn!(
                    path = %job.output_path.display(),
                    error = %e,
                    "Failed to remove partial export output"
                ),
            }
        }

        if let Some(cb) = progress {
            cb(ExportProgress::new(
                ExportState::Failed,
                written,
                total,
                error.to_string(),
            ));
        }
        error
    }
}
