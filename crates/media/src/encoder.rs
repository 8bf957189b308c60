//! Encoder sinks: accept ordered composited frames and persist them as video.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use gridsync_common::config::ExportSettings;
use gridsync_common::error::{GridsyncError, GridsyncResult};

use crate::tools::command_exists;
use crate::PixelBuffer;

/// An open output stream.
pub trait EncoderSink: Send {
    /// Append one frame. Frames must match the size the sink was opened with.
    fn write_frame(&mut self, frame: &PixelBuffer) -> GridsyncResult<()>;

    /// Flush and close the output.
    fn finish(self: Box<Self>) -> GridsyncResult<()>;

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;
}

/// Creates encoder sinks for export jobs.
pub trait EncoderFactory: Send + Sync {
    /// Open a sink writing `width`x`height` frames at `fps` to `output`.
    fn open(
        &self,
        output: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> GridsyncResult<Box<dyn EncoderSink>>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Codec parameters for the ffmpeg encoder.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub video_codec: String,
    pub crf: u32,
    pub preset: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self::from(&ExportSettings::default())
    }
}

impl From<&ExportSettings> for EncoderSettings {
    fn from(settings: &ExportSettings) -> Self {
        Self {
            video_codec: settings.video_codec.clone(),
            crf: settings.crf,
            preset: settings.preset.clone(),
        }
    }
}

/// Spawns an ffmpeg process per export and streams rgb24 frames to its stdin.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoderFactory {
    settings: EncoderSettings,
}

impl FfmpegEncoderFactory {
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }

    /// Check if ffmpeg is available on the system.
    pub fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn open(
        &self,
        output: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> GridsyncResult<Box<dyn EncoderSink>> {
        if !self.is_available() {
            return Err(GridsyncError::encoder_open(
                "ffmpeg not found in PATH",
            ));
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GridsyncError::encoder_open(format!(
                    "Cannot create output directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let args = encode_args(&self.settings, output, width, height, fps);
        tracing::debug!(args = ?args, "Running ffmpeg encoder");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GridsyncError::encoder_open(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GridsyncError::encoder_open("Failed to capture ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| GridsyncError::encoder_open("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        if let Ok(Some(status)) = child.try_wait() {
            let message = stderr_task
                .join()
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());
            return Err(GridsyncError::encoder_open(format!(
                "ffmpeg exited immediately (status {status}): {}",
                message.trim()
            )));
        }

        tracing::info!(
            pid = child.id(),
            output = %output.display(),
            width,
            height,
            fps,
            codec = %self.settings.video_codec,
            "ffmpeg encoder started"
        );

        Ok(Box::new(FfmpegEncoder {
            child,
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            output: output.to_path_buf(),
            width,
            height,
            frames_written: 0,
        }))
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// A running ffmpeg encode.
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    output: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl FfmpegEncoder {
    fn collect_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default()
    }
}

impl EncoderSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &PixelBuffer) -> GridsyncResult<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(GridsyncError::encode_write(format!(
                "Frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| GridsyncError::encode_write("Encoder input already closed"))?;
        stdin.write_all(frame.as_raw()).map_err(|e| {
            GridsyncError::encode_write(format!(
                "Failed to write frame {}: {e}",
                self.frames_written
            ))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> GridsyncResult<()> {
        // Closing stdin signals EOF to ffmpeg.
        drop(self.stdin.take());

        let status = self
            .child
            .wait()
            .map_err(|e| GridsyncError::encode_write(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = self.collect_stderr();

        if !status.success() {
            return Err(GridsyncError::encode_write(format!(
                "ffmpeg export failed (status {status}): {}",
                stderr_output.trim()
            )));
        }

        tracing::info!(
            output = %self.output.display(),
            frames = self.frames_written,
            "ffmpeg encoder finished"
        );
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
            let _ = self.collect_stderr();
        }
    }
}

/// ffmpeg arguments for a raw rgb24 stdin stream encoded into an MP4 file.
fn encode_args(
    settings: &EncoderSettings,
    output: &Path,
    width: u32,
    height: u32,
    fps: u32,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-s".to_string(),
        format!("{width}x{height}"),
        "-r".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-an".to_string(),
    ];

    args.append(&mut codec_args(settings, width, height));
    args.push(output.display().to_string());
    args
}

fn codec_args(settings: &EncoderSettings, width: u32, height: u32) -> Vec<String> {
    // 4:2:0 needs even dimensions; odd canvases keep full chroma instead.
    let pix_fmt = if width % 2 == 0 && height % 2 == 0 {
        "yuv420p"
    } else {
        "yuv444p"
    };

    let mut args = vec!["-c:v".to_string(), settings.video_codec.clone()];
    match settings.video_codec.as_str() {
        "libx264" | "libx265" => args.extend([
            "-preset".to_string(),
            settings.preset.clone(),
            "-crf".to_string(),
            settings.crf.to_string(),
        ]),
        "mpeg4" => args.extend(["-q:v".to_string(), "2".to_string()]),
        _ => {}
    }
    args.extend([
        "-pix_fmt".to_string(),
        pix_fmt.to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);
    args
}
