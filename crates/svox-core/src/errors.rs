use std::path::PathBuf;

use thiserror::Error;

use crate::session::ViewMode;

/// Errors that can occur while exporting a recorded stereo session
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to open session '{path}': {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("no frames in session")]
    NoFrames,

    #[error("session cannot serve {requested:?} images")]
    UnsupportedView { requested: ViewMode },

    #[error("decoder error: {0}")]
    Decode(String),

    #[error("grab stalled at frame {position}: {attempts} consecutive failures")]
    GrabStalled { position: u64, attempts: u32 },

    #[error("failed to write '{path}': {source}")]
    WriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode image '{path}': {source}")]
    ImageEncode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to serialize run summary: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    /// Process exit code for this error, per the CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExportError::InvalidInput(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
