//! Playback and export speed multipliers.

use std::fmt;
use std::str::FromStr;

use gridsync_common::error::{GridsyncError, GridsyncResult};
use serde::{Deserialize, Serialize};

/// Speed multipliers offered to the user.
pub const SPEED_PRESETS: [f64; 9] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 2.0, 3.0, 4.0];

/// Slowest accepted multiplier. Export writes at most 100 copies of a frame.
pub const MIN_SPEED: f64 = 0.01;

/// Rate relative to the nominal 30 fps timeline.
///
/// Values above 1 skip logical frames on export, values below 1 duplicate them.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SpeedMultiplier(f64);

impl SpeedMultiplier {
    pub const NORMAL: SpeedMultiplier = SpeedMultiplier(1.0);

    /// Create a multiplier; it must be finite and at least [`MIN_SPEED`].
    pub fn new(value: f64) -> GridsyncResult<Self> {
        if value.is_finite() && value >= MIN_SPEED {
            Ok(Self(value))
        } else {
            Err(GridsyncError::InvalidSpeed { value })
        }
    }

    /// Create a multiplier restricted to [`SPEED_PRESETS`].
    pub fn preset(value: f64) -> GridsyncResult<Self> {
        if SPEED_PRESETS.contains(&value) {
            Ok(Self(value))
        } else {
            Err(GridsyncError::InvalidSpeed { value })
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_normal(self) -> bool {
        self.0 == 1.0
    }

    /// Suffix appended to exported file names, e.g. `_x2p0` for 2.0.
    /// Empty at normal speed.
    pub fn filename_suffix(self) -> String {
        if self.is_normal() {
            String::new()
        } else {
            format!("_x{:?}", self.0).replace('.', "p")
        }
    }
}

impl Default for SpeedMultiplier {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl TryFrom<f64> for SpeedMultiplier {
    type Error = GridsyncError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SpeedMultiplier> for f64 {
    fn from(speed: SpeedMultiplier) -> Self {
        speed.0
    }
}

impl FromStr for SpeedMultiplier {
    type Err = GridsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(['x', 'X']);
        let value = trimmed
            .parse::<f64>()
            .map_err(|_| GridsyncError::InvalidSpeed { value: f64::NAN })?;
        Self::new(value)
    }
}

impl fmt::Display for SpeedMultiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}x", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_omitted_at_normal_speed() {
        assert_eq!(SpeedMultiplier::NORMAL.filename_suffix(), "");
    }

    #[test]
    fn test_suffix_replaces_decimal_point() {
        let cases = [
            (2.0, "_x2p0"),
            (0.25, "_x0p25"),
            (1.5, "_x1p5"),
            (0.75, "_x0p75"),
            (4.0, "_x4p0"),
        ];
        for (value, expected) in cases {
            assert_eq!(SpeedMultiplier::new(value).unwrap().filename_suffix(), expected);
        }
    }

    #[test]
    fn test_rejects_too_slow_and_non_finite() {
        for value in [0.0, -1.0, 0.009, 1e-18, f64::NAN, f64::INFINITY] {
            assert!(SpeedMultiplier::new(value).is_err());
        }
        assert!(SpeedMultiplier::new(MIN_SPEED).is_ok());
    }

    #[test]
    fn test_preset_restriction() {
        assert!(SpeedMultiplier::preset(1.25).is_ok());
        assert!(SpeedMultiplier::preset(1.1).is_err());
    }

    #[test]
    fn test_parse_accepts_trailing_x() {
        let speed: SpeedMultiplier = "2x".parse().unwrap();
        assert_eq!(speed.value(), 2.0);
        assert_eq!(speed.to_string(), "2.0x");
    }

    #[test]
    fn test_serde_rejects_invalid_value() {
        assert!(serde_json::from_str::<SpeedMultiplier>("0.5").is_ok());
        assert!(serde_json::from_str::<SpeedMultiplier>("-2.0").is_err());
    }
}
