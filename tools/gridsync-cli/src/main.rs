//! GridSync CLI: synchronized multi-video grid comparison from the terminal.
//!
//! Usage:
//!   gridsync export <PATHS>...     Export the grid as one video at a chosen speed
//!   gridsync snapshot <PATHS>...   Save the composited grid at one frame as PNG
//!   gridsync info <PATHS>...       Show source video metadata
//!   gridsync layout                Print the cell table for a layout
//!   gridsync check                 Check ffmpeg, ffprobe and label font availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gridsync_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "gridsync",
    about = "Synchronized multi-video grid playback and export",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the synchronized grid to a single video
    Export {
        /// Source videos (.mp4 .avi .mov .mkv .wmv .flv)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Grid layout, rows x cols (1x1 .. 3x3)
        #[arg(short, long)]
        layout: Option<String>,

        /// Speed multiplier: 0.25 0.5 0.75 1.0 1.25 1.5 2.0 3.0 4.0
        #[arg(short, long)]
        speed: Option<f64>,

        /// Canvas size in pixels
        #[arg(long, default_value = "1280x720")]
        size: String,

        /// Output file (default: next to the first source)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dry run with synthetic sources and an in-memory encoder
        #[arg(long)]
        synthetic: bool,

        /// Frames per synthetic source
        #[arg(long, default_value = "90")]
        synthetic_frames: u64,
    },

    /// Save the composited grid at one frame as an image
    Snapshot {
        /// Source videos
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Logical frame index
        #[arg(short, long, default_value = "0")]
        frame: i64,

        /// Grid layout, rows x cols
        #[arg(short, long)]
        layout: Option<String>,

        /// Canvas size in pixels
        #[arg(long, default_value = "1280x720")]
        size: String,

        /// Output image path
        #[arg(long, default_value = "snapshot.png")]
        out: PathBuf,
    },

    /// Show source video metadata
    Info {
        /// Source videos
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the cell rectangles for a layout
    Layout {
        /// Grid layout, rows x cols
        #[arg(short, long, default_value = "2x2")]
        layout: String,

        /// Canvas size in pixels
        #[arg(long, default_value = "1280x720")]
        size: String,

        /// Number of sources
        #[arg(long, default_value = "4")]
        sources: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    gridsync_common::logging::init_logging(&logging);
    tracing::debug!(
        config = %gridsync_common::config::config_file_path().display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Export {
            paths,
            layout,
            speed,
            size,
            output,
            synthetic,
            synthetic_frames,
        } => {
            let synthetic = synthetic.then_some(synthetic_frames);
            commands::export::run(&config, paths, layout, speed, size, output, synthetic).await
        }
        Commands::Snapshot {
            paths,
            frame,
            layout,
            size,
            out,
        } => commands::snapshot::run(&config, paths, frame, layout, size, out),
        Commands::Info { paths } => commands::info::run(paths),
        Commands::Layout {
            layout,
            size,
            sources,
            json,
        } => commands::layout::run(layout, size, sources, json),
        Commands::Check => commands::check::run(&config),
    }
}
