//! External tool discovery.

use std::process::Command;

/// Whether `binary` resolves in PATH.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Availability of the tools the ffmpeg backends need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolReport {
    pub ffmpeg: bool,
    pub ffprobe: bool,
}

impl ToolReport {
    pub fn detect() -> Self {
        Self {
            ffmpeg: command_exists("ffmpeg"),
            ffprobe: command_exists("ffprobe"),
        }
    }

    pub fn all_available(&self) -> bool {
        self.ffmpeg && self.ffprobe
    }
}
