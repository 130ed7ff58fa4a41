use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbImage;
use log::{debug, info};

use crate::errors::{ExportError, Result};
use crate::manifest::{ExportManifest, FrameRecord, MANIFEST_FILE_NAME};
use crate::progress::ProgressSink;
use crate::request::ExportRequest;
use crate::session::{Eye, GrabOutcome, SessionReader, SessionSource};
use crate::summary::{ExportSummary, SUMMARY_FILE_NAME};

/// Outcome of a completed export run.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub exported_frames: usize,
    /// Stop index actually used, after clamping to the session length.
    pub stop_index: u64,
    pub total_frames: u64,
    pub manifest_path: PathBuf,
    pub summary_path: PathBuf,
    pub duration_seconds: f64,
}

/// Derived paths under the output directory.
struct OutputLayout {
    left_dir: PathBuf,
    right_dir: PathBuf,
    manifest_path: PathBuf,
    summary_path: PathBuf,
}

impl OutputLayout {
    /// Create the output directory tree. This is the pipeline's setup phase;
    /// request validation never touches the filesystem.
    fn prepare(root: &Path) -> Result<Self> {
        let layout = Self {
            left_dir: root.join(Eye::Left.dir_name()),
            right_dir: root.join(Eye::Right.dir_name()),
            manifest_path: root.join(MANIFEST_FILE_NAME),
            summary_path: root.join(SUMMARY_FILE_NAME),
        };
        for dir in [&layout.left_dir, &layout.right_dir] {
            fs::create_dir_all(dir).map_err(|source| ExportError::WriteFailure {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(layout)
    }

    fn image_path(&self, eye: Eye, frame_index: u64, extension: &str) -> PathBuf {
        let dir = match eye {
            Eye::Left => &self.left_dir,
            Eye::Right => &self.right_dir,
        };
        dir.join(format!("{frame_index}.{extension}"))
    }
}

/// Drives a session reader through a bounded iteration and exports the
/// selected frames.
///
/// A run proceeds through open → seek → iterate → flush; the reader handle is
/// owned by the run and dropped on every exit path, normal completion and
/// failure alike. Transient grab failures are retried in place without
/// advancing; everything else is fatal for the run.
pub struct FrameExporter {
    request: ExportRequest,
}

impl FrameExporter {
    pub fn new(request: ExportRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &ExportRequest {
        &self.request
    }

    pub fn run<S: SessionSource>(
        &self,
        source: &S,
        progress: &mut dyn ProgressSink,
    ) -> Result<ExportReport> {
        let started = Instant::now();
        info!(
            "Exporting session '{}' to '{}'",
            self.request.source_path.display(),
            self.request.output_dir.display()
        );

        let mut reader = source.open()?;
        let total_frames = reader.total_frames();
        if total_frames == 0 {
            return Err(ExportError::NoFrames);
        }
        let stop_index = self.clamp_stop(total_frames)?;
        info!(
            "Opened session: {} frames, exporting [{}, {}] step {}",
            total_frames, self.request.start_index, stop_index, self.request.step
        );

        let layout = OutputLayout::prepare(&self.request.output_dir)?;

        reader.seek(self.request.start_index)?;

        let manifest = self.iterate(&mut reader, &layout, stop_index, total_frames, progress)?;

        manifest.write_to(&layout.manifest_path)?;
        let duration_seconds = started.elapsed().as_secs_f64();
        let summary = ExportSummary::new(
            &self.request,
            stop_index,
            total_frames,
            manifest.len(),
            duration_seconds,
        );
        summary.write_to(&layout.summary_path)?;
        progress.finished();

        info!(
            "Export complete: {} frames in {:.2}s",
            manifest.len(),
            duration_seconds
        );

        Ok(ExportReport {
            exported_frames: manifest.len(),
            stop_index,
            total_frames,
            manifest_path: layout.manifest_path,
            summary_path: layout.summary_path,
            duration_seconds,
        })
    }

    /// Clamp the requested stop (or end-of-session default) to the last frame
    /// index, and check the start index still falls below it.
    fn clamp_stop(&self, total_frames: u64) -> Result<u64> {
        let last_index = total_frames - 1;
        let stop_index = match self.request.requested_stop {
            Some(requested) => requested.min(last_index),
            None => last_index,
        };
        if self.request.start_index >= stop_index {
            return Err(ExportError::InvalidInput(format!(
                "start index {} is not below the last exportable frame {} (session has {} frames)",
                self.request.start_index, stop_index, total_frames
            )));
        }
        Ok(stop_index)
    }

    /// The core loop. The reader's reported position, not a loop counter, is
    /// the authority on which frame each grab decoded.
    fn iterate<R: SessionReader>(
        &self,
        reader: &mut R,
        layout: &OutputLayout,
        stop_index: u64,
        total_frames: u64,
        progress: &mut dyn ProgressSink,
    ) -> Result<ExportManifest> {
        let start = self.request.start_index;
        let step = self.request.step;
        let span = (stop_index - start) as f64;
        let mut manifest = ExportManifest::default();
        let mut current = reader.position();
        let mut consecutive_failures: u32 = 0;

        while current <= stop_index && current < total_frames {
            match reader.grab()? {
                GrabOutcome::NotReady => {
                    consecutive_failures += 1;
                    let bound = self.request.max_grab_retries;
                    if bound > 0 && consecutive_failures >= bound {
                        return Err(ExportError::GrabStalled {
                            position: current,
                            attempts: consecutive_failures,
                        });
                    }
                    debug!("grab not ready near frame {current}, retrying");
                    continue;
                }
                GrabOutcome::EndOfSession => {
                    debug!("decoder reported end of session after frame {current}");
                    break;
                }
                GrabOutcome::Frame => consecutive_failures = 0,
            }

            current = reader.position();
            if current > stop_index {
                break;
            }
            // A keyframe-bound seek can land the decoder before the start
            // index; roll forward without emitting.
            let offset = match current.checked_sub(start) {
                Some(offset) => offset,
                None => continue,
            };
            if offset % step != 0 {
                continue;
            }

            let left = reader.retrieve_image(Eye::Left, self.request.view)?;
            let right = reader.retrieve_image(Eye::Right, self.request.view)?;
            let timestamp_millis = reader.timestamp_millis()?;

            let extension = self.request.format.extension();
            self.save_image(&left, layout.image_path(Eye::Left, current, extension))?;
            self.save_image(&right, layout.image_path(Eye::Right, current, extension))?;
            manifest.push(FrameRecord {
                frame_index: current,
                timestamp_millis,
            });
            progress.frame_exported(current, offset as f64 / span);
        }

        Ok(manifest)
    }

    fn save_image(&self, image: &RgbImage, path: PathBuf) -> Result<()> {
        image
            .save_with_format(&path, self.request.format.image_format())
            .map_err(|source| match source {
                image::ImageError::IoError(source) => ExportError::WriteFailure { path, source },
                source => ExportError::ImageEncode { path, source },
            })
    }
}
