//! A comparison session: the library surface a UI drives.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use gridsync_common::config::{AppConfig, ExportSettings};
use gridsync_common::error::{GridsyncError, GridsyncResult};
use gridsync_grid_model::layout::{CanvasSize, GridSpec};
use gridsync_grid_model::naming::export_output_path;
use gridsync_grid_model::speed::SpeedMultiplier;
use gridsync_media::encoder::EncoderSettings;
use gridsync_media::{EncoderFactory, FfmpegEncoderFactory, FfmpegOpener, SourceOpener};
use gridsync_render_engine::{
    ExportJob, ExportProgress, ExportState, ExportSummary, FrameCompositor, LabelRenderer,
    LoadReport, ProgressCallback, SourceSet, SpeedAwareExporter,
};

use crate::controller::{lock_sources, DisplaySink, PlaybackController, PlaybackState};

/// The pluggable ends of a session.
#[derive(Clone)]
pub struct SessionBackends {
    pub opener: Arc<dyn SourceOpener>,
    pub encoder: Arc<dyn EncoderFactory>,
    pub display: Arc<dyn DisplaySink>,
}

impl SessionBackends {
    /// ffprobe/ffmpeg decoding and encoding.
    pub fn ffmpeg(settings: &ExportSettings, display: Arc<dyn DisplaySink>) -> Self {
        Self {
            opener: Arc::new(FfmpegOpener::new()),
            encoder: Arc::new(FfmpegEncoderFactory::new(EncoderSettings::from(settings))),
            display,
        }
    }
}

/// Loaded sources, layout, canvas and playback state for one comparison.
///
/// Changing the sources, the layout or the canvas stops playback, releases
/// every decode handle, rebuilds the cell table and rewinds to frame 0.
pub struct ComparisonSession {
    opener: Arc<dyn SourceOpener>,
    encoder: Arc<dyn EncoderFactory>,
    compositor: FrameCompositor,
    export_settings: ExportSettings,
    grid: GridSpec,
    canvas: CanvasSize,
    paths: Vec<PathBuf>,
    sources: Arc<Mutex<SourceSet>>,
    controller: PlaybackController,
    rebuild_pending: bool,
}

impl ComparisonSession {
    /// Create a session with defaults from `config`. The canvas starts unknown.
    pub fn new(config: &AppConfig, backends: SessionBackends) -> GridsyncResult<Self> {
        let grid: GridSpec = config.session.layout.parse()?;
        let speed = SpeedMultiplier::new(config.session.speed)?;
        let compositor = FrameCompositor::new(LabelRenderer::from_config(&config.labels));
        let canvas = CanvasSize::new(0, 0);

        let sources = Arc::new(Mutex::new(SourceSet::empty(grid, canvas)));
        let controller =
            PlaybackController::new(Arc::clone(&sources), compositor.clone(), backends.display);
        controller.set_speed(speed);

        tracing::debug!(
            %grid,
            %speed,
            opener = backends.opener.name(),
            encoder = backends.encoder.name(),
            "Session created"
        );

        Ok(Self {
            opener: backends.opener,
            encoder: backends.encoder,
            compositor,
            export_settings: config.export.clone(),
            grid,
            canvas,
            paths: Vec::new(),
            sources,
            controller,
            rebuild_pending: false,
        })
    }

    /// Replace the compositor used for preview and export.
    pub fn with_compositor(mut self, compositor: FrameCompositor) -> Self {
        self.controller.set_compositor(compositor.clone());
        self.compositor = compositor;
        self
    }

    /// Replace the loaded sources.
    ///
    /// Returns [`GridsyncError::LayoutNotReady`] while the canvas is unknown;
    /// the paths are kept and opened on the next [`Self::resize_canvas`].
    pub fn load_sources(&mut self, paths: Vec<PathBuf>) -> GridsyncResult<LoadReport> {
        tracing::info!(count = paths.len(), "Loading sources");
        self.paths = paths;
        self.rebuild()
    }

    pub fn set_layout(&mut self, grid: GridSpec) -> GridsyncResult<LoadReport> {
        self.grid = grid;
        self.rebuild()
    }

    /// Report a new canvas size. Rebuilds when the size changed or a rebuild
    /// is waiting for a usable canvas.
    pub fn resize_canvas(&mut self, width: u32, height: u32) -> GridsyncResult<LoadReport> {
        let canvas = CanvasSize::new(width, height);
        if canvas == self.canvas && !self.rebuild_pending {
            return Ok(LoadReport::default());
        }
        self.canvas = canvas;
        self.rebuild()
    }

    pub fn toggle_playback(&mut self) -> PlaybackState {
        self.controller.toggle()
    }

    pub fn seek(&self, frame: i64) -> u64 {
        self.controller.seek(frame)
    }

    pub fn step(&self, delta: i64) -> u64 {
        self.controller.step(delta)
    }

    pub fn set_speed(&self, speed: SpeedMultiplier) {
        self.controller.set_speed(speed);
    }

    pub fn speed(&self) -> SpeedMultiplier {
        self.controller.speed()
    }

    /// Composite the current frame and push it to the display.
    pub fn render_current(&self) -> u64 {
        self.controller.render_current()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn current_frame(&self) -> u64 {
        self.controller.current_frame()
    }

    pub fn max_frames(&self) -> u64 {
        self.controller.max_frames()
    }

    /// Status line text, e.g. `Frame: 12/300`.
    pub fn frame_label(&self) -> String {
        format!("Frame: {}/{}", self.current_frame(), self.max_frames())
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Sources currently open for preview.
    pub fn active_sources(&self) -> usize {
        lock_sources(&self.sources).active_count()
    }

    /// Export the grid at the current speed on a background thread.
    ///
    /// The worker opens its own decode handles, so preview keeps working
    /// while the export runs.
    pub fn start_export(&self) -> GridsyncResult<ExportHandle> {
        let (paths, first) = {
            let set = lock_sources(&self.sources);
            if set.active_count() == 0 {
                return Err(GridsyncError::EmptySourceSet);
            }
            let first = set
                .first_path()
                .map(Path::to_path_buf)
                .ok_or(GridsyncError::EmptySourceSet)?;
            (set.paths().to_vec(), first)
        };

        let speed = self.speed();
        let job = ExportJob::new(export_output_path(&first, speed), speed);
        self.start_export_job(job, paths)
    }

    /// Like [`Self::start_export`], writing to `output` instead of the derived path.
    pub fn start_export_to(&self, output: PathBuf) -> GridsyncResult<ExportHandle> {
        let paths = {
            let set = lock_sources(&self.sources);
            if set.active_count() == 0 {
                return Err(GridsyncError::EmptySourceSet);
            }
            set.paths().to_vec()
        };
        let job = ExportJob::new(output, self.speed());
        self.start_export_job(job, paths)
    }

    fn start_export_job(
        &self,
        job: ExportJob,
        paths: Vec<PathBuf>,
    ) -> GridsyncResult<ExportHandle> {
        let progress = Arc::new(Mutex::new(ExportProgress::pending()));
        let exporter = SpeedAwareExporter::new(
            Arc::clone(&self.encoder),
            self.compositor.clone(),
            self.export_settings.clone(),
        );
        let opener = Arc::clone(&self.opener);
        let (grid, canvas) = (self.grid, self.canvas);
        let worker_job = job.clone();
        let worker_progress = Arc::clone(&progress);

        tracing::info!(
            output = %job.output_path.display(),
            speed = %job.speed,
            sources = paths.len(),
            "Export requested"
        );

        let worker = std::thread::Builder::new()
            .name("gridsync-export".to_string())
            .spawn(move || {
                let callback: ProgressCallback = Box::new(move |update| {
                    *worker_progress
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = update;
                });

                let (mut set, report) = match SourceSet::open(&paths, grid, canvas, opener.as_ref())
                {
                    Ok(opened) => opened,
                    Err(e) => {
                        callback(ExportProgress::new(
                            ExportState::Failed,
                            0,
                            0,
                            e.to_string(),
                        ));
                        return Err(e);
                    }
                };
                if !report.failed.is_empty() {
                    tracing::warn!(
                        failed = report.failed.len(),
                        "Some sources failed to open for export"
                    );
                }

                let result = exporter.export(&worker_job, &mut set, Some(&callback));
                set.release();
                result
            })
            .map_err(|e| GridsyncError::unsupported(format!("Cannot spawn export thread: {e}")))?;

        Ok(ExportHandle {
            job,
            progress,
            worker: Some(worker),
        })
    }

    fn rebuild(&mut self) -> GridsyncResult<LoadReport> {
        self.controller.shutdown();

        let result = {
            let mut set = lock_sources(&self.sources);
            set.release();
            *set = SourceSet::empty(self.grid, self.canvas);
            SourceSet::open(&self.paths, self.grid, self.canvas, self.opener.as_ref()).map(
                |(opened, report)| {
                    *set = opened;
                    (set.max_frames(), report)
                },
            )
        };

        match result {
            Ok((max_frames, report)) => {
                self.rebuild_pending = false;
                self.controller.reset(max_frames);
                tracing::info!(
                    grid = %self.grid,
                    canvas = %self.canvas,
                    opened = report.opened,
                    failed = report.failed.len(),
                    dropped = report.dropped.len(),
                    max_frames,
                    "Layout rebuilt"
                );
                Ok(report)
            }
            Err(e) => {
                self.rebuild_pending = e.is_layout_not_ready();
                self.controller.reset(0);
                tracing::debug!(error = %e, "Layout rebuild deferred");
                Err(e)
            }
        }
    }
}

impl Drop for ComparisonSession {
    fn drop(&mut self) {
        self.controller.shutdown();
        lock_sources(&self.sources).release();
    }
}

/// A running background export.
pub struct ExportHandle {
    job: ExportJob,
    progress: Arc<Mutex<ExportProgress>>,
    worker: Option<JoinHandle<GridsyncResult<ExportSummary>>>,
}

impl ExportHandle {
    pub fn output_path(&self) -> &Path {
        &self.job.output_path
    }

    pub fn speed(&self) -> SpeedMultiplier {
        self.job.speed
    }

    /// Latest progress written by the worker. May lag slightly behind.
    pub fn progress(&self) -> ExportProgress {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_finished(&self) -> bool {
        self.progress().state.is_terminal()
            || self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the export ends.
    pub fn wait(mut self) -> GridsyncResult<ExportSummary> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| GridsyncError::unsupported("Export already awaited"))?;
        worker
            .join()
            .map_err(|_| GridsyncError::Other(anyhow::anyhow!("Export worker panicked")))?
    }
}

impl std::fmt::Debug for ExportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportHandle")
            .field("output", &self.job.output_path)
            .field("speed", &self.job.speed)
            .field("progress", &self.progress())
            .finish()
    }
}
