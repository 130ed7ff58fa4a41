use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{ExportError, Result};
use crate::session::{ViewMode, SESSION_EXTENSION};

/// Encoding used for exported image files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFileFormat {
    Png,
    Jpeg,
}

impl ImageFileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFileFormat::Png => "png",
            ImageFileFormat::Jpeg => "jpg",
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            ImageFileFormat::Png => image::ImageFormat::Png,
            ImageFileFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// Raw, unvalidated export parameters as they arrive from the CLI.
#[derive(Debug, Clone)]
pub struct RawExportRequest {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub start: i64,
    /// Last frame index, inclusive. `None` exports to the end of the session.
    pub stop: Option<i64>,
    pub step: i64,
    pub view: ViewMode,
    pub format: ImageFileFormat,
    /// Consecutive transient grab failures tolerated before the run aborts.
    /// 0 retries forever.
    pub max_grab_retries: u32,
}

/// Validated parameters for one export run. Constructed once via
/// [`ExportRequest::validate`], immutable thereafter.
///
/// The stop index is kept as requested here; it is clamped against the
/// session's actual frame count once the session is open, since the count is
/// only known then.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub start_index: u64,
    pub requested_stop: Option<u64>,
    pub step: u64,
    pub view: ViewMode,
    pub format: ImageFileFormat,
    pub max_grab_retries: u32,
}

impl ExportRequest {
    /// Pure validation of the raw values: relative ordering of the bounds,
    /// source existence and extension, non-empty output path. No directories
    /// are created here; that belongs to the pipeline's setup phase.
    pub fn validate(raw: RawExportRequest) -> Result<Self> {
        if !raw.source_path.is_file() {
            return Err(ExportError::InvalidInput(format!(
                "session file '{}' does not exist",
                raw.source_path.display()
            )));
        }

        let extension = raw
            .source_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !extension.eq_ignore_ascii_case(SESSION_EXTENSION) {
            return Err(ExportError::InvalidInput(format!(
                "'{}' is not a .{SESSION_EXTENSION} session recording",
                raw.source_path.display()
            )));
        }

        if raw.start < 0 {
            return Err(ExportError::InvalidInput(format!(
                "start index must be non-negative, got {}",
                raw.start
            )));
        }

        if let Some(stop) = raw.stop {
            if stop <= raw.start {
                return Err(ExportError::InvalidInput(format!(
                    "stop index {} must be greater than start index {}",
                    stop, raw.start
                )));
            }
        }

        if raw.step < 1 {
            return Err(ExportError::InvalidInput(format!(
                "step must be at least 1, got {}",
                raw.step
            )));
        }

        if raw.output_dir.as_os_str().is_empty() {
            return Err(ExportError::InvalidInput(
                "output directory path is empty".to_string(),
            ));
        }

        Ok(Self {
            source_path: raw.source_path,
            output_dir: raw.output_dir,
            start_index: raw.start as u64,
            requested_stop: raw.stop.map(|s| s as u64),
            step: raw.step as u64,
            view: raw.view,
            format: raw.format,
            max_grab_retries: raw.max_grab_retries,
        })
    }
}
