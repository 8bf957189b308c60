//! Show source video metadata.

use std::path::PathBuf;

use gridsync_grid_model::naming::{display_name, is_video_path};
use gridsync_media::probe::probe_media;

pub fn run(paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut longest = 0u64;

    for path in &paths {
        println!("{}", display_name(path));
        if !is_video_path(path) {
            println!("  [SKIP] not a recognised video extension");
            continue;
        }
        match probe_media(path) {
            Ok(info) => {
                println!("  Resolution: {}x{}", info.width, info.height);
                println!("  Frame rate: {:.3} fps", info.fps);
                println!(
                    "  Frames: {} ({:.1}s)",
                    info.frame_count,
                    info.frame_count as f64 / info.fps
                );
                longest = longest.max(info.frame_count);
            }
            Err(e) => println!("  [ERROR] {e}"),
        }
    }

    println!();
    println!("Shared timeline: {longest} frames");
    Ok(())
}
