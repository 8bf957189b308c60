//! Stream metadata via `ffprobe`.

use std::path::Path;
use std::process::Command;

use gridsync_common::error::{GridsyncError, GridsyncResult};
use serde::Deserialize;

/// Rate assumed when a stream reports no usable frame rate.
pub const DEFAULT_FPS: f64 = 30.0;

/// Metadata of the first video stream of a file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    pub fps: f64,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe `path` with ffprobe.
pub fn probe_media(path: &Path) -> GridsyncResult<MediaInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,nb_frames,r_frame_rate,avg_frame_rate,duration:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| GridsyncError::source_open(path, format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GridsyncError::source_open(
            path,
            format!("ffprobe failed: {}", stderr.trim()),
        ));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&raw).map_err(|e| GridsyncError::source_open(path, e.to_string()))
}

/// Parse ffprobe JSON output into [`MediaInfo`].
///
/// The frame count comes from `nb_frames` when the container records it,
/// otherwise it is estimated from the duration.
pub fn parse_probe_output(raw: &str) -> GridsyncResult<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_str(raw)?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| GridsyncError::decode("No video stream found"))?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(GridsyncError::decode(format!(
            "Video stream has no dimensions ({width}x{height})"
        )));
    }

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(DEFAULT_FPS);

    let duration = stream
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(|d| d.parse::<f64>().ok())
        });

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| duration.map(|d| (d * fps).round().max(0.0) as u64))
        .unwrap_or(0);

    Ok(MediaInfo {
        width,
        height,
        frame_count,
        fps,
    })
}

/// Parse an ffprobe rational such as `30000/1001`.
fn parse_rate(raw: &str) -> Option<f64> {
    let value = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse::<f64>().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_with_frame_count() {
        let raw = r#"{
            "streams": [{
                "width": 1920, "height": 1080,
                "nb_frames": "300",
                "r_frame_rate": "30/1", "avg_frame_rate": "30/1",
                "duration": "10.000000"
            }],
            "format": { "duration": "10.021000" }
        }"#;
        let info = parse_probe_output(raw).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.frame_count, 300);
        assert!((info.fps - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_estimates_frames_from_duration() {
        // mkv streams often omit nb_frames
        let raw = r#"{
            "streams": [{ "width": 640, "height": 360, "r_frame_rate": "30000/1001", "avg_frame_rate": "0/0" }],
            "format": { "duration": "2.002" }
        }"#;
        let info = parse_probe_output(raw).unwrap();
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.frame_count, 60);
    }

    #[test]
    fn test_parse_probe_without_video_stream() {
        let raw = r#"{ "streams": [], "format": { "duration": "3.0" } }"#;
        assert!(parse_probe_output(raw).is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("25/1"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("24"), Some(24.0));
        assert_eq!(parse_rate("n/a"), None);
    }
}
