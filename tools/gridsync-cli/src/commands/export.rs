//! Export the synchronized grid to a video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gridsync_common::config::AppConfig;
use gridsync_media::synthetic::{RecordingEncoderFactory, SyntheticOpener};
use gridsync_playback::{ComparisonSession, NullDisplay, SessionBackends};
use gridsync_render_engine::ExportState;

use super::{parse_layout, parse_size, parse_speed, video_paths};

pub async fn run(
    config: &AppConfig,
    paths: Vec<PathBuf>,
    layout: Option<String>,
    speed: Option<f64>,
    size: String,
    output: Option<PathBuf>,
    synthetic_frames: Option<u64>,
) -> anyhow::Result<()> {
    let paths = video_paths(paths)?;
    let grid = parse_layout(layout.as_deref().unwrap_or(&config.session.layout))?;
    let speed = parse_speed(speed.unwrap_or(config.session.speed))?;
    let canvas = parse_size(&size)?;

    let recorder = RecordingEncoderFactory::new();
    let backends = match synthetic_frames {
        Some(frames) => SessionBackends {
            opener: Arc::new(synthetic_opener(&paths, frames)),
            encoder: Arc::new(recorder.clone()),
            display: Arc::new(NullDisplay),
        },
        None => SessionBackends::ffmpeg(&config.export, Arc::new(NullDisplay)),
    };

    println!("Exporting {} source(s)", paths.len());
    println!("  Layout: {grid}");
    println!("  Speed: {speed}");
    println!("  Canvas: {canvas}");

    let mut session = ComparisonSession::new(config, backends)?;
    session.resize_canvas(canvas.width, canvas.height)?;
    session.set_layout(grid)?;
    let report = session.load_sources(paths)?;
    for (path, err) in &report.failed {
        println!("  [WARN] {}: {err}", path.display());
    }
    for path in &report.dropped {
        println!("  [SKIP] {} (grid is full)", path.display());
    }
    session.set_speed(speed);

    let handle = match output {
        Some(path) => session.start_export_to(path)?,
        None => session.start_export()?,
    };
    println!("  Output: {}", handle.output_path().display());

    while !handle.is_finished() {
        let p = handle.progress();
        if p.state == ExportState::Encoding {
            print!(
                "\r  Progress: {:.1}% ({}/{} frames)  ",
                p.fraction() * 100.0,
                p.frames_written,
                p.total_frames
            );
            std::io::stdout().flush().ok();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    match handle.wait() {
        Ok(summary) => {
            println!(
                "\nExport complete: {} ({} frames at {})",
                summary.output_path.display(),
                summary.frames_written,
                summary.speed
            );
            if synthetic_frames.is_some() {
                let encoded = recorder
                    .last_recording()
                    .map(|r| r.frames.len())
                    .unwrap_or(0);
                println!("  Dry run: {encoded} frame(s) encoded in memory, nothing written");
            }
        }
        Err(e) => {
            println!("\nExport failed: {e}");
        }
    }

    Ok(())
}

fn synthetic_opener(paths: &[PathBuf], frames: u64) -> SyntheticOpener {
    paths
        .iter()
        .enumerate()
        .fold(SyntheticOpener::new(), |opener, (i, path)| {
            opener.with_source(path.clone(), frames, (i as u8).wrapping_mul(40).wrapping_add(40))
        })
}
