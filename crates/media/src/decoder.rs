//! Decode handles: random-access frame retrieval for one source file.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use gridsync_common::error::{GridsyncError, GridsyncResult};

use crate::probe::{probe_media, MediaInfo};
use crate::{FrameSize, PixelBuffer};

/// An exclusively owned decode cursor over one media file.
///
/// Implementations seek to `index`, decode one frame, and return it scaled to
/// the size the handle was opened with. Calls are sequential per handle.
pub trait FrameDecoder: Send {
    /// Decode the frame at `index`.
    fn decode_frame(&mut self, index: u64) -> GridsyncResult<PixelBuffer>;

    /// Release decoder resources. Safe to call more than once.
    fn close(&mut self);

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// A freshly opened source: its metadata and a decode handle.
pub struct OpenedSource {
    pub info: MediaInfo,
    pub decoder: Box<dyn FrameDecoder>,
}

/// Opens decode handles. Every call yields an independent handle, so two
/// consumers of the same file never share a cursor.
pub trait SourceOpener: Send + Sync {
    /// Open `path`, producing frames of `size`.
    fn open(&self, path: &Path, size: FrameSize) -> GridsyncResult<OpenedSource>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Opens sources through `ffprobe` + `ffmpeg` child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegOpener;

impl FfmpegOpener {
    pub fn new() -> Self {
        Self
    }
}

impl SourceOpener for FfmpegOpener {
    fn open(&self, path: &Path, size: FrameSize) -> GridsyncResult<OpenedSource> {
        if !path.exists() {
            return Err(GridsyncError::source_open(path, "file does not exist"));
        }

        let info = probe_media(path)?;
        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            frames = info.frame_count,
            fps = info.fps,
            "Probed source"
        );

        Ok(OpenedSource {
            info,
            decoder: Box::new(FfmpegDecoder::new(path.to_path_buf(), info.fps, size)),
        })
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Decodes through a long-lived ffmpeg process piping scaled rgb24 frames.
///
/// Sequential reads reuse the running process; any other index restarts it
/// with an input seek to `index / fps`.
pub struct FfmpegDecoder {
    path: PathBuf,
    fps: f64,
    size: FrameSize,
    process: Option<DecodeProcess>,
}

struct DecodeProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    next_index: u64,
}

impl DecodeProcess {
    fn shutdown(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FfmpegDecoder {
    pub fn new(path: PathBuf, fps: f64, size: FrameSize) -> Self {
        Self {
            path,
            fps: if fps > 0.0 { fps } else { crate::probe::DEFAULT_FPS },
            size,
            process: None,
        }
    }

    fn spawn_at(&self, index: u64) -> GridsyncResult<DecodeProcess> {
        let args = decode_args(&self.path, index, self.fps, self.size);
        tracing::trace!(path = %self.path.display(), index, "Spawning ffmpeg decoder");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| GridsyncError::decode(format!("Failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GridsyncError::decode("Failed to capture ffmpeg stdout"))?;

        Ok(DecodeProcess {
            child,
            stdout: BufReader::with_capacity(self.size.rgb24_len() * 2, stdout),
            next_index: index,
        })
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn decode_frame(&mut self, index: u64) -> GridsyncResult<PixelBuffer> {
        let reusable = matches!(&self.process, Some(p) if p.next_index == index);
        if !reusable {
            if let Some(stale) = self.process.take() {
                stale.shutdown();
            }
            self.process = Some(self.spawn_at(index)?);
        }

        let process = self
            .process
            .as_mut()
            .ok_or_else(|| GridsyncError::decode("Decoder process missing"))?;

        let mut buf = vec![0u8; self.size.rgb24_len()];
        if let Err(e) = process.stdout.read_exact(&mut buf) {
            if let Some(dead) = self.process.take() {
                dead.shutdown();
            }
            return Err(GridsyncError::decode(format!(
                "No frame {index} from {}: {e}",
                self.path.display()
            )));
        }
        process.next_index += 1;

        PixelBuffer::from_raw(self.size.width, self.size.height, buf)
            .ok_or_else(|| GridsyncError::decode("Decoded buffer has wrong length"))
    }

    fn close(&mut self) {
        if let Some(process) = self.process.take() {
            process.shutdown();
        }
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        self.close();
    }
}

/// ffmpeg arguments that stream frames from `index` onward as scaled rgb24.
fn decode_args(path: &Path, index: u64, fps: f64, size: FrameSize) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostdin".to_string(),
    ];

    if index > 0 {
        args.push("-ss".to_string());
        args.push(format!("{:.6}", index as f64 / fps));
    }

    args.extend([
        "-i".to_string(),
        path.display().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-vf".to_string(),
        format!("scale={}:{}:flags=bilinear", size.width, size.height),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "pipe:1".to_string(),
    ]);

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_args_from_start_skip_seek() {
        let args = decode_args(Path::new("/v/a.mp4"), 0, 30.0, FrameSize::new(399, 299));
        assert!(!args.contains(&"-ss".to_string()));
        assert!(args.contains(&"scale=399:299:flags=bilinear".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_decode_args_seek_to_frame_time() {
        let args = decode_args(Path::new("/v/a.mp4"), 45, 30.0, FrameSize::new(10, 10));
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "1.500000");
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input, "seek must precede the input for fast seeking");
    }

    #[test]
    fn test_decoder_falls_back_to_default_fps() {
        let decoder = FfmpegDecoder::new(PathBuf::from("x.mp4"), 0.0, FrameSize::new(2, 2));
        assert_eq!(decoder.fps, crate::probe::DEFAULT_FPS);
    }
}
