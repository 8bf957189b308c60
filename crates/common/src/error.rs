//! Error types shared across GridSync crates.

use std::path::PathBuf;

/// Top-level error type for GridSync operations.
#[derive(Debug, thiserror::Error)]
pub enum GridsyncError {
    #[error("Failed to open source {path}: {message}")]
    SourceOpen { path: PathBuf, message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Layout not ready: canvas is {width}x{height}")]
    LayoutNotReady { width: u32, height: u32 },

    #[error("Invalid layout '{token}', expected RxC")]
    InvalidLayout { token: String },

    #[error("Invalid speed multiplier: {value}")]
    InvalidSpeed { value: f64 },

    #[error("Failed to open encoder: {message}")]
    EncoderOpen { message: String },

    #[error("Encode error: {message}")]
    EncodeWrite { message: String },

    #[error("No active sources to export")]
    EmptySourceSet,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GridsyncError.
pub type GridsyncResult<T> = Result<T, GridsyncError>;

impl GridsyncError {
    pub fn source_open(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::SourceOpen {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn encoder_open(msg: impl Into<String>) -> Self {
        Self::EncoderOpen {
            message: msg.into(),
        }
    }

    pub fn encode_write(msg: impl Into<String>) -> Self {
        Self::EncodeWrite {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the caller should retry once a real canvas size is known.
    pub fn is_layout_not_ready(&self) -> bool {
        matches!(self, Self::LayoutNotReady { .. })
    }
}
