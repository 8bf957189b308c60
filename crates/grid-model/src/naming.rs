//! Source recognition and export file naming.

use std::path::{Path, PathBuf};

use crate::speed::SpeedMultiplier;

/// Extensions accepted as comparison sources (lowercase, without dot).
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "avi", "mov", "mkv", "wmv", "flv"];

/// Whether `path` has a recognised video extension (case-insensitive).
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Keep only recognised video paths, preserving order.
pub fn filter_video_paths<I, P>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    paths
        .into_iter()
        .map(Into::into)
        .filter(|p| is_video_path(p))
        .collect()
}

/// Name shown in a source's label: the file name including extension.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Output path for an export: `<stem>_comparison[_x<speed>].mp4` next to `first_source`.
pub fn export_output_path(first_source: &Path, speed: SpeedMultiplier) -> PathBuf {
    let stem = first_source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{stem}_comparison{}.mp4", speed.filename_suffix());
    match first_source.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}
