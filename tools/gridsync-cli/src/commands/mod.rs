pub mod check;
pub mod export;
pub mod info;
pub mod layout;
pub mod snapshot;

use std::path::PathBuf;

use gridsync_grid_model::layout::{CanvasSize, GridSpec};
use gridsync_grid_model::naming::{filter_video_paths, VIDEO_EXTENSIONS};
use gridsync_grid_model::speed::{SpeedMultiplier, SPEED_PRESETS};

/// Parse a layout token and restrict it to the 1x1..3x3 presets.
pub fn parse_layout(token: &str) -> anyhow::Result<GridSpec> {
    let grid: GridSpec = token.parse()?;
    if !grid.is_preset() {
        anyhow::bail!("Unsupported layout {grid}. Use rows and cols between 1 and 3, e.g. 2x2");
    }
    Ok(grid)
}

/// Parse a speed and restrict it to the preset list.
pub fn parse_speed(value: f64) -> anyhow::Result<SpeedMultiplier> {
    SpeedMultiplier::preset(value).map_err(|e| {
        anyhow::anyhow!("{e}. Use one of: {}", format_presets(&SPEED_PRESETS))
    })
}

pub fn parse_size(token: &str) -> anyhow::Result<CanvasSize> {
    let canvas: CanvasSize = token
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size {token:?}: {e}"))?;
    if !canvas.is_ready() {
        anyhow::bail!("Canvas {canvas} is too small");
    }
    Ok(canvas)
}

/// Keep recognised video files, reporting the rest.
pub fn video_paths(paths: Vec<PathBuf>) -> anyhow::Result<Vec<PathBuf>> {
    let total = paths.len();
    let kept = filter_video_paths(paths);
    if kept.len() < total {
        println!(
            "  Skipped {} file(s) without a video extension ({})",
            total - kept.len(),
            VIDEO_EXTENSIONS.join(" ")
        );
    }
    if kept.is_empty() {
        anyhow::bail!("No video files given");
    }
    Ok(kept)
}

fn format_presets(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_limited_to_presets() {
        assert_eq!(parse_layout("3x2").unwrap(), GridSpec::new(3, 2).unwrap());
        assert!(parse_layout("4x4").is_err());
        assert!(parse_layout("two").is_err());
    }

    #[test]
    fn test_speed_limited_to_presets() {
        assert_eq!(parse_speed(1.5).unwrap().value(), 1.5);
        assert!(parse_speed(1.1).is_err());
    }

    #[test]
    fn test_size_must_be_usable() {
        assert_eq!(parse_size("800x600").unwrap(), CanvasSize::new(800, 600));
        assert!(parse_size("1x1").is_err());
    }

    #[test]
    fn test_non_video_paths_are_dropped() {
        let kept = video_paths(vec![
            PathBuf::from("/v/a.mp4"),
            PathBuf::from("/v/notes.txt"),
            PathBuf::from("/v/b.MKV"),
        ])
        .unwrap();
        assert_eq!(kept, vec![PathBuf::from("/v/a.mp4"), PathBuf::from("/v/b.MKV")]);
        assert!(video_paths(vec![PathBuf::from("/v/readme.md")]).is_err());
    }
}
