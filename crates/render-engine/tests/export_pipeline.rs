use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use gridsync_common::config::ExportSettings;
use gridsync_common::error::GridsyncError;
use gridsync_grid_model::layout::{CanvasSize, GridSpec};
use gridsync_grid_model::speed::SpeedMultiplier;
use gridsync_media::synthetic::{read_synthetic_pixel, RecordingEncoderFactory, SyntheticOpener};
use gridsync_render_engine::{
    ExportJob, ExportProgress, ExportState, FrameCompositor, ProgressCallback, SourceSet,
    SpeedAwareExporter,
};

fn single_source_set(frames: u64) -> SourceSet {
    let opener = SyntheticOpener::new().with_source("/clips/a.mp4", frames, 5);
    let (set, report) = SourceSet::open(
        &[PathBuf::from("/clips/a.mp4")],
        GridSpec::new(1, 1).unwrap(),
        CanvasSize::new(8, 6),
        &opener,
    )
    .unwrap();
    assert_eq!(report.opened, 1);
    set
}

fn exporter(factory: &RecordingEncoderFactory, settings: ExportSettings) -> SpeedAwareExporter {
    SpeedAwareExporter::new(
        Arc::new(factory.clone()),
        FrameCompositor::default(),
        settings,
    )
}

fn collecting_callback() -> (ProgressCallback, Arc<Mutex<Vec<ExportProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cb: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p));
    (cb, seen)
}

fn logical_indices(factory: &RecordingEncoderFactory) -> Vec<u64> {
    factory
        .last_recording()
        .unwrap()
        .frames
        .iter()
        .map(|f| read_synthetic_pixel(f.get_pixel(0, 0)).1)
        .collect()
}

#[test]
fn double_speed_samples_every_other_frame() {
    let factory = RecordingEncoderFactory::new();
    let mut set = single_source_set(100);
    let job = ExportJob::new(PathBuf::from("/out/a_comparison_x2p0.mp4"), SpeedMultiplier::new(2.0).unwrap());

    let summary = exporter(&factory, ExportSettings::default())
        .export(&job, &mut set, None)
        .unwrap();

    assert_eq!(summary.frames_written, 50);
    assert_eq!(summary.logical_frames, 100);
    let expected: Vec<u64> = (0..50).map(|i| i * 2).collect();
    assert_eq!(logical_indices(&factory), expected);

    let recording = factory.last_recording().unwrap();
    assert!(recording.finished);
    assert_eq!((recording.width, recording.height, recording.fps), (8, 6, 30));
}

#[test]
fn half_speed_writes_each_frame_twice() {
    let factory = RecordingEncoderFactory::new();
    let mut set = single_source_set(100);
    let job = ExportJob::new(PathBuf::from("/out/a.mp4"), SpeedMultiplier::new(0.5).unwrap());

    let summary = exporter(&factory, ExportSettings::default())
        .export(&job, &mut set, None)
        .unwrap();

    assert_eq!(summary.frames_written, 200);
    let expected: Vec<u64> = (0..100).flat_map(|k| [k, k]).collect();
    assert_eq!(logical_indices(&factory), expected);
}

#[test]
fn duplicated_frames_are_composited_once() {
    let opener = SyntheticOpener::new().with_source("/clips/a.mp4", 40, 1);
    let (mut set, _) = SourceSet::open(
        &[PathBuf::from("/clips/a.mp4")],
        GridSpec::new(1, 1).unwrap(),
        CanvasSize::new(4, 4),
        &opener,
    )
    .unwrap();
    let factory = RecordingEncoderFactory::new();
    let job = ExportJob::new(PathBuf::from("/out/a.mp4"), SpeedMultiplier::new(0.25).unwrap());

    exporter(&factory, ExportSettings::default())
        .export(&job, &mut set, Some(&collecting_callback().0))
        .unwrap();

    assert_eq!(factory.last_recording().unwrap().frames.len(), 160);
    assert_eq!(opener.decode_count("/clips/a.mp4"), 40);
}

#[test]
fn progress_is_throttled_and_ends_completed() {
    let factory = RecordingEncoderFactory::new();
    let mut set = single_source_set(100);
    let job = ExportJob::new(PathBuf::from("/out/a.mp4"), SpeedMultiplier::new(2.0).unwrap());
    let (cb, seen) = collecting_callback();

    exporter(&factory, ExportSettings::default())
        .export(&job, &mut set, Some(&cb))
        .unwrap();

    let seen = seen.lock().unwrap();
    let states: Vec<ExportState> = seen.iter().map(|p| p.state).collect();
    assert_eq!(states.first(), Some(&ExportState::Initializing));
    assert_eq!(states.last(), Some(&ExportState::Completed));

    let encoding: Vec<u64> = seen
        .iter()
        .filter(|p| p.state == ExportState::Encoding)
        .map(|p| p.frames_written)
        .collect();
    assert_eq!(encoding, vec![0, 10, 20, 30, 40, 50]);
    assert!(seen.iter().all(|p| p.state == ExportState::Initializing || p.total_frames == 50));
}

#[test]
fn empty_source_set_is_rejected_before_encoding() {
    let factory = RecordingEncoderFactory::new();
    let mut set = SourceSet::empty(GridSpec::default(), CanvasSize::new(800, 600));
    let job = ExportJob::new(PathBuf::from("/out/a.mp4"), SpeedMultiplier::NORMAL);

    let err = exporter(&factory, ExportSettings::default())
        .export(&job, &mut set, None)
        .unwrap_err();

    assert!(matches!(err, GridsyncError::EmptySourceSet));
    assert!(factory.recordings().is_empty());
}

#[test]
fn encoder_open_failure_reports_failed() {
    let factory = RecordingEncoderFactory::new().failing_open();
    let mut set = single_source_set(10);
    let job = ExportJob::new(PathBuf::from("/out/a.mp4"), SpeedMultiplier::NORMAL);
    let (cb, seen) = collecting_callback();

    let err = exporter(&factory, ExportSettings::default())
        .export(&job, &mut set, Some(&cb))
        .unwrap_err();

    assert!(matches!(err, GridsyncError::EncoderOpen { .. }));
    let last = seen.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.state, ExportState::Failed);
    assert_eq!(last.frames_written, 0);
}

#[test]
fn write_failure_keeps_partial_output_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("a_comparison.mp4");
    std::fs::write(&output, b"partial").unwrap();

    let factory = RecordingEncoderFactory::new().failing_after(3);
    let mut set = single_source_set(20);
    let job = ExportJob::new(output.clone(), SpeedMultiplier::NORMAL);
    let (cb, seen) = collecting_callback();

    let err = exporter(&factory, ExportSettings::default())
        .export(&job, &mut set, Some(&cb))
        .unwrap_err();

    assert!(matches!(err, GridsyncError::EncodeWrite { .. }));
    assert!(output.exists());
    let last = seen.lock().unwrap().last().cloned().unwrap();
    assert_eq!((last.state, last.frames_written), (ExportState::Failed, 3));
}

#[test]
fn write_failure_can_remove_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("a_comparison.mp4");
    std::fs::write(&output, b"partial").unwrap();

    let factory = RecordingEncoderFactory::new().failing_after(3);
    let mut set = single_source_set(20);
    let job = ExportJob::new(output.clone(), SpeedMultiplier::NORMAL);
    let settings = ExportSettings {
        keep_partial_output: false,
        ..ExportSettings::default()
    };

    assert!(exporter(&factory, settings).export(&job, &mut set, None).is_err());
    assert!(!output.exists());
}
