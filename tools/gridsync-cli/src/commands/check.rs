//! Check system capabilities.

use gridsync_common::config::{config_file_path, AppConfig};
use gridsync_media::ToolReport;
use gridsync_render_engine::{LabelRenderer, EXPORT_FPS};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("GridSync System Check");
    println!("{}", "=".repeat(50));

    let tools = ToolReport::detect();
    print_status("ffmpeg (decode/encode)", tools.ffmpeg);
    print_status("ffprobe (metadata)", tools.ffprobe);

    let labels = LabelRenderer::from_config(&config.labels);
    match labels.font_path() {
        Some(path) => println!("[OK] Label font: {}", path.display()),
        None if !config.labels.enabled => println!("[OK] Labels disabled"),
        None => println!("[WARN] Label font: none found, frames will have no source names"),
    }

    println!("[OK] Config: {}", config_file_path().display());
    println!(
        "     export: {} crf {} preset {} @ {} fps",
        config.export.video_codec, config.export.crf, config.export.preset, EXPORT_FPS
    );

    println!();
    if tools.all_available() {
        println!("All required tools are available. GridSync is ready.");
    } else {
        println!("ffmpeg and ffprobe must be installed and on PATH.");
    }

    Ok(())
}

fn print_status(label: &str, ok: bool) {
    if ok {
        println!("[OK] {label}");
    } else {
        println!("[MISSING] {label}");
    }
}
