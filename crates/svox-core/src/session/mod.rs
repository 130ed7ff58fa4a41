//! Contracts for the recorded-session reader.
//!
//! A session file is an opaque recorded log of a stereo capture containing a
//! fixed number of sequentially decodable frames. The export pipeline drives
//! a reader exclusively through the narrow interface below; concrete readers
//! (the FFmpeg-backed one in the CLI crate, the synthetic one here) own the
//! container format and codec entirely.

pub mod synthetic;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// File extension convention for recorded stereo sessions.
pub const SESSION_EXTENSION: &str = "mkv";

/// Which eye of the stereo pair to retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    /// Output subdirectory name for this eye.
    pub fn dir_name(self) -> &'static str {
        match self {
            Eye::Left => "Left",
            Eye::Right => "Right",
        }
    }
}

/// Whether retrieved images are geometrically rectified or raw.
///
/// This is a retrieval-mode flag passed through to the reader; rectification
/// itself is never computed here. A reader that cannot serve the requested
/// view fails the retrieval with [`ExportError::UnsupportedView`].
///
/// [`ExportError::UnsupportedView`]: crate::errors::ExportError::UnsupportedView
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Rectified,
    Unrectified,
}

/// Result of a single grab attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabOutcome {
    /// A frame was decoded and is ready for retrieval.
    Frame,
    /// Transient failure (decode hiccup); the same grab may be retried.
    NotReady,
    /// No more frames can be decoded from the session.
    EndOfSession,
}

/// Sequential reader over a recorded stereo session.
///
/// Grab and retrieve calls are inherently ordered and stateful: a frame must
/// be grabbed before its images or timestamp can be retrieved, and retrieving
/// frame N+1's data before grabbing it is undefined. The handle is released
/// by dropping the reader.
pub trait SessionReader {
    /// Total number of frames recorded in the session.
    fn total_frames(&self) -> u64;

    /// Absolute positioning: the next grab decodes at (or, for keyframe-bound
    /// formats, shortly before) `index`. Not a scan.
    fn seek(&mut self, index: u64) -> Result<()>;

    /// Decode the next frame in sequence into the internal buffer.
    ///
    /// `Ok(NotReady)` is a transient failure the caller may retry; fatal
    /// decoder errors are returned as `Err`.
    fn grab(&mut self) -> Result<GrabOutcome>;

    /// Index of the most recently decoded frame, or the pending seek target
    /// if nothing has been decoded since the last seek.
    ///
    /// The reader is the authority on which frame a grab actually decoded; a
    /// grab may skip or repeat indices depending on codec behavior, and
    /// callers must read the position back rather than count grabs.
    fn position(&self) -> u64;

    /// Image of one eye of the most recently grabbed frame.
    fn retrieve_image(&mut self, eye: Eye, view: ViewMode) -> Result<RgbImage>;

    /// Capture timestamp of the most recently grabbed frame, in milliseconds.
    fn timestamp_millis(&self) -> Result<u64>;
}

/// Something that can open a recorded session and hand out a reader.
///
/// Opening is separated from reading so the pipeline can own the whole reader
/// lifecycle: open at the start of a run, drop on every exit path.
pub trait SessionSource {
    type Reader: SessionReader;

    fn open(&self) -> Result<Self::Reader>;
}
