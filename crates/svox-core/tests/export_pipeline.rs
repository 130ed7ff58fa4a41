use std::fs;
use std::path::{Path, PathBuf};

use svox_core::session::synthetic::{SyntheticSession, SyntheticSessionReader};
use svox_core::{
    ExportError, ExportRequest, ExportSummary, FrameExporter, ImageFileFormat, NullProgress,
    ProgressSink, Result, SessionReader, SessionSource, ViewMode, MANIFEST_FILE_NAME,
    SUMMARY_FILE_NAME,
};
use tempfile::TempDir;

fn request(output: &Path, start: u64, stop: Option<u64>, step: u64) -> ExportRequest {
    ExportRequest {
        source_path: PathBuf::from("capture.mkv"),
        output_dir: output.to_path_buf(),
        start_index: start,
        requested_stop: stop,
        step,
        view: ViewMode::Unrectified,
        format: ImageFileFormat::Png,
        max_grab_retries: 100,
    }
}

fn exported_indices(dir: &Path) -> Vec<u64> {
    let mut indices: Vec<u64> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            path.file_stem().unwrap().to_str().unwrap().parse().unwrap()
        })
        .collect();
    indices.sort_unstable();
    indices
}

fn manifest_rows(path: &Path) -> Vec<(u64, u64)> {
    let contents = fs::read_to_string(path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("Index, Timestamp"));
    lines
        .map(|line| {
            let (index, timestamp) = line.split_once(", ").unwrap();
            (index.parse().unwrap(), timestamp.parse().unwrap())
        })
        .collect()
}

#[derive(Default)]
struct RecordingProgress {
    fractions: Vec<f64>,
    finished: bool,
}

impl ProgressSink for RecordingProgress {
    fn frame_exported(&mut self, _frame_index: u64, fraction: f64) {
        self.fractions.push(fraction);
    }

    fn finished(&mut self) {
        self.finished = true;
    }
}

struct FailingSource;

impl SessionSource for FailingSource {
    type Reader = SyntheticSessionReader;

    fn open(&self) -> Result<SyntheticSessionReader> {
        Err(ExportError::SourceUnreadable {
            path: PathBuf::from("capture.mkv"),
            reason: "container probe failed".to_string(),
        })
    }
}

#[test]
fn exports_selected_range_with_step() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(100);
    let exporter = FrameExporter::new(request(out.path(), 10, Some(50), 5));

    let report = exporter.run(&session, &mut NullProgress).unwrap();

    let expected: Vec<u64> = (10..=50).step_by(5).collect();
    assert_eq!(report.exported_frames, 9);
    assert_eq!(report.stop_index, 50);
    assert_eq!(exported_indices(&out.path().join("Left")), expected);
    assert_eq!(exported_indices(&out.path().join("Right")), expected);

    let rows = manifest_rows(&out.path().join(MANIFEST_FILE_NAME));
    assert_eq!(rows.len(), 9);
    for (row, index) in rows.iter().zip(&expected) {
        assert_eq!(row.0, *index);
        assert_eq!(row.1, session.timestamp_of(*index));
    }
}

#[test]
fn manifest_indices_are_increasing_and_on_step() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(60);
    let exporter = FrameExporter::new(request(out.path(), 7, Some(55), 3));

    exporter.run(&session, &mut NullProgress).unwrap();

    let rows = manifest_rows(&out.path().join(MANIFEST_FILE_NAME));
    for pair in rows.windows(2) {
        assert!(pair[0].0 < pair[1].0);
    }
    for (index, _) in rows {
        assert_eq!((index - 7) % 3, 0);
    }
}

#[test]
fn stop_beyond_session_is_clamped_to_last_frame() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(20);
    let exporter = FrameExporter::new(request(out.path(), 0, Some(500), 1));

    let report = exporter.run(&session, &mut NullProgress).unwrap();

    assert_eq!(report.stop_index, 19);
    assert_eq!(report.exported_frames, 20);
    assert_eq!(
        exported_indices(&out.path().join("Left")),
        (0..=19).collect::<Vec<u64>>()
    );
}

#[test]
fn absent_stop_exports_to_end_of_session() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(12);
    let exporter = FrameExporter::new(request(out.path(), 4, None, 1));

    let report = exporter.run(&session, &mut NullProgress).unwrap();

    assert_eq!(report.stop_index, 11);
    assert_eq!(
        exported_indices(&out.path().join("Left")),
        (4..=11).collect::<Vec<u64>>()
    );
}

#[test]
fn step_wider_than_range_exports_only_start_frame() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(30);
    let exporter = FrameExporter::new(request(out.path(), 3, Some(9), 50));

    let report = exporter.run(&session, &mut NullProgress).unwrap();

    assert_eq!(report.exported_frames, 1);
    assert_eq!(exported_indices(&out.path().join("Left")), vec![3]);
    assert_eq!(exported_indices(&out.path().join("Right")), vec![3]);
}

#[test]
fn transient_grab_failures_are_retried_invisibly() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(10)
        .with_transient_failures(2, 3)
        .with_transient_failures(7, 1);
    let exporter = FrameExporter::new(request(out.path(), 0, Some(9), 1));

    let report = exporter.run(&session, &mut NullProgress).unwrap();

    assert_eq!(report.exported_frames, 10);
    assert_eq!(
        exported_indices(&out.path().join("Left")),
        (0..=9).collect::<Vec<u64>>()
    );
}

#[test]
fn run_fails_when_retry_bound_is_exceeded() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(10).with_transient_failures(4, 5);
    let mut req = request(out.path(), 0, Some(9), 1);
    req.max_grab_retries = 3;
    let exporter = FrameExporter::new(req);

    let err = exporter.run(&session, &mut NullProgress).unwrap_err();
    assert!(matches!(
        err,
        ExportError::GrabStalled { attempts: 3, .. }
    ));
}

#[test]
fn zero_retry_bound_retries_through_any_finite_burst() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(6).with_transient_failures(1, 50);
    let mut req = request(out.path(), 0, Some(5), 1);
    req.max_grab_retries = 0;
    let exporter = FrameExporter::new(req);

    let report = exporter.run(&session, &mut NullProgress).unwrap();
    assert_eq!(report.exported_frames, 6);
}

#[test]
fn open_failure_aborts_before_creating_output() {
    let out = TempDir::new().unwrap();
    let output = out.path().join("nested");
    let exporter = FrameExporter::new(request(&output, 0, Some(5), 1));

    let err = exporter.run(&FailingSource, &mut NullProgress).unwrap_err();

    assert!(matches!(err, ExportError::SourceUnreadable { .. }));
    assert!(!output.exists());
}

#[test]
fn empty_session_is_rejected() {
    let out = TempDir::new().unwrap();
    let exporter = FrameExporter::new(request(out.path(), 0, None, 1));

    let err = exporter
        .run(&SyntheticSession::new(0), &mut NullProgress)
        .unwrap_err();
    assert!(matches!(err, ExportError::NoFrames));
}

#[test]
fn start_at_or_past_clamped_stop_is_rejected() {
    let out = TempDir::new().unwrap();
    let exporter = FrameExporter::new(request(out.path(), 5, None, 1));

    let err = exporter
        .run(&SyntheticSession::new(5), &mut NullProgress)
        .unwrap_err();
    assert!(matches!(err, ExportError::InvalidInput(_)));
}

#[test]
fn reruns_with_identical_parameters_produce_identical_manifests() {
    let session = SyntheticSession::new(40);
    let first_out = TempDir::new().unwrap();
    let second_out = TempDir::new().unwrap();

    FrameExporter::new(request(first_out.path(), 2, Some(30), 4))
        .run(&session, &mut NullProgress)
        .unwrap();
    FrameExporter::new(request(second_out.path(), 2, Some(30), 4))
        .run(&session, &mut NullProgress)
        .unwrap();

    assert_eq!(
        fs::read(first_out.path().join(MANIFEST_FILE_NAME)).unwrap(),
        fs::read(second_out.path().join(MANIFEST_FILE_NAME)).unwrap()
    );
}

#[test]
fn frames_dropped_by_the_decoder_are_absent_but_order_holds() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(10).with_dropped_frame(4);
    let exporter = FrameExporter::new(request(out.path(), 0, Some(9), 2));

    exporter.run(&session, &mut NullProgress).unwrap();

    let rows = manifest_rows(&out.path().join(MANIFEST_FILE_NAME));
    let indices: Vec<u64> = rows.iter().map(|(index, _)| *index).collect();
    assert_eq!(indices, vec![0, 2, 6, 8]);
}

#[test]
fn progress_fractions_are_monotonic_and_end_at_one() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(21);
    let exporter = FrameExporter::new(request(out.path(), 0, Some(20), 5));
    let mut progress = RecordingProgress::default();

    exporter.run(&session, &mut progress).unwrap();

    assert!(progress.finished);
    assert_eq!(progress.fractions.len(), 5);
    for pair in progress.fractions.windows(2) {
        assert!(pair[0] < pair[1]);
    }
    assert!(progress.fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    assert_eq!(*progress.fractions.last().unwrap(), 1.0);
}

#[test]
fn summary_describes_the_completed_run() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(50);
    let exporter = FrameExporter::new(request(out.path(), 10, Some(40), 10));

    let report = exporter.run(&session, &mut NullProgress).unwrap();

    let summary: ExportSummary =
        serde_json::from_str(&fs::read_to_string(out.path().join(SUMMARY_FILE_NAME)).unwrap())
            .unwrap();
    assert_eq!(summary.exported_frames, report.exported_frames);
    assert_eq!(summary.stop_index, 40);
    assert_eq!(summary.total_frames, 50);
    assert_eq!(summary.start_index, 10);
    assert_eq!(summary.step, 10);
}

#[test]
fn jpeg_format_writes_jpg_files() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(5);
    let mut req = request(out.path(), 0, Some(4), 2);
    req.format = ImageFileFormat::Jpeg;
    let exporter = FrameExporter::new(req);

    exporter.run(&session, &mut NullProgress).unwrap();

    for index in [0u64, 2, 4] {
        assert!(out.path().join("Left").join(format!("{index}.jpg")).is_file());
        assert!(out
            .path()
            .join("Right")
            .join(format!("{index}.jpg"))
            .is_file());
    }
}

#[test]
fn exported_images_decode_back_to_frame_content() {
    let out = TempDir::new().unwrap();
    let session = SyntheticSession::new(3).with_dimensions(16, 8);
    let exporter = FrameExporter::new(request(out.path(), 0, Some(2), 1));

    exporter.run(&session, &mut NullProgress).unwrap();

    let left = image::open(out.path().join("Left").join("1.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(left.dimensions(), (16, 8));

    let mut reader = session.open().unwrap();
    reader.seek(1).unwrap();
    reader.grab().unwrap();
    let expected = reader
        .retrieve_image(svox_core::Eye::Left, ViewMode::Unrectified)
        .unwrap();
    assert_eq!(left.as_raw(), expected.as_raw());
}
