//! Save one composited grid frame as an image.

use std::path::PathBuf;
use std::sync::Arc;

use gridsync_common::config::AppConfig;
use gridsync_playback::{ComparisonSession, FrameCapture, SessionBackends};

use super::{parse_layout, parse_size, video_paths};

pub fn run(
    config: &AppConfig,
    paths: Vec<PathBuf>,
    frame: i64,
    layout: Option<String>,
    size: String,
    out: PathBuf,
) -> anyhow::Result<()> {
    let paths = video_paths(paths)?;
    let grid = parse_layout(layout.as_deref().unwrap_or(&config.session.layout))?;
    let canvas = parse_size(&size)?;

    let capture = Arc::new(FrameCapture::new());
    let backends = SessionBackends::ffmpeg(&config.export, capture.clone());
    let mut session = ComparisonSession::new(config, backends)?;
    session.resize_canvas(canvas.width, canvas.height)?;
    session.set_layout(grid)?;
    let report = session.load_sources(paths)?;
    for (path, err) in &report.failed {
        println!("[WARN] {}: {err}", path.display());
    }

    let index = session.seek(frame);
    session.render_current();
    let (_, image) = capture
        .latest()
        .ok_or_else(|| anyhow::anyhow!("No frame was rendered"))?;
    image.save(&out)?;

    println!("{}", session.frame_label());
    println!("Saved frame {index} to {}", out.display());
    Ok(())
}
