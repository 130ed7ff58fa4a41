use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ExportError, Result};
use crate::request::{ExportRequest, ImageFileFormat};
use crate::session::ViewMode;

/// File name of the JSON run summary inside the output directory.
pub const SUMMARY_FILE_NAME: &str = "export.json";

/// Machine-readable description of one completed export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    pub session_file: String,
    pub output_dir: String,
    pub view: ViewMode,
    pub format: ImageFileFormat,
    pub start_index: u64,
    pub stop_index: u64,
    pub step: u64,
    pub total_frames: u64,
    pub exported_frames: usize,
    pub duration_seconds: f64,
    pub completed_at: String,
}

impl ExportSummary {
    pub fn new(
        request: &ExportRequest,
        stop_index: u64,
        total_frames: u64,
        exported_frames: usize,
        duration_seconds: f64,
    ) -> Self {
        Self {
            session_file: request.source_path.display().to_string(),
            output_dir: request.output_dir.display().to_string(),
            view: request.view,
            format: request.format,
            start_index: request.start_index,
            stop_index,
            step: request.step,
            total_frames,
            exported_frames,
            duration_seconds,
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ExportError::WriteFailure {
            path: path.to_path_buf(),
            source,
        })
    }
}
