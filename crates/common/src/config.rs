//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Defaults applied to a fresh comparison session.
    pub session: SessionDefaults,

    /// Export pipeline settings.
    pub export: ExportSettings,

    /// Label overlay settings.
    pub labels: LabelConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Defaults for a new comparison session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Grid layout token, e.g. "2x2".
    pub layout: String,

    /// Playback/export speed multiplier.
    pub speed: f64,
}

/// Export encoder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// ffmpeg video codec name.
    pub video_codec: String,

    /// Constant rate factor passed to the encoder.
    pub crf: u32,

    /// Encoder preset.
    pub preset: String,

    /// Output frames between progress reports.
    pub progress_interval_frames: u64,

    /// Leave a truncated output file on disk when an export fails.
    pub keep_partial_output: bool,
}

/// Label overlay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Draw source names on each cell.
    pub enabled: bool,

    /// TrueType/OpenType font used for labels. Falls back to common system fonts.
    pub font_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "gridsync=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            layout: "2x2".to_string(),
            speed: 1.0,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            crf: 18,
            preset: "medium".to_string(),
            progress_interval_frames: 10,
            keep_partial_output: true,
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("gridsync").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_export_contract() {
        let config = AppConfig::default();
        assert_eq!(config.export.progress_interval_frames, 10);
        assert!(config.export.keep_partial_output);
        assert_eq!(config.session.layout, "2x2");
        assert_eq!(config.session.speed, 1.0);
    }

    #[test]
    fn test_partial_config_fills_missing_sections() {
        let json = r#"{ "export": { "crf": 23 }, "labels": { "enabled": false } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.export.crf, 23);
        assert_eq!(config.export.preset, "medium");
        assert!(!config.labels.enabled);
        assert_eq!(config.logging.level, "info");
    }
}
