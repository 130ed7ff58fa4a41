//! Synthetic fixed-length session for tests and benchmarks.
//!
//! Frame content, timestamps, and grab faults are fully deterministic, which
//! makes the export loop's retry and frame-selection behavior reproducible
//! without a real recording.

use std::collections::{BTreeMap, BTreeSet};

use image::{Rgb, RgbImage};

use crate::errors::{ExportError, Result};
use crate::session::{Eye, GrabOutcome, SessionReader, SessionSource, ViewMode};

/// Description of a synthetic session: frame count, image geometry, timestamp
/// schedule, and a fault plan applied during grabbing.
#[derive(Debug, Clone)]
pub struct SyntheticSession {
    frame_count: u64,
    width: u32,
    height: u32,
    timestamp_origin_ms: u64,
    frame_interval_ms: u64,
    transient_failures: BTreeMap<u64, u32>,
    dropped_frames: BTreeSet<u64>,
}

impl SyntheticSession {
    pub fn new(frame_count: u64) -> Self {
        Self {
            frame_count,
            width: 64,
            height: 48,
            timestamp_origin_ms: 1_000,
            frame_interval_ms: 33,
            transient_failures: BTreeMap::new(),
            dropped_frames: BTreeSet::new(),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_timestamps(mut self, origin_ms: u64, interval_ms: u64) -> Self {
        self.timestamp_origin_ms = origin_ms;
        self.frame_interval_ms = interval_ms;
        self
    }

    /// Grabbing frame `index` reports `count` transient failures before the
    /// frame decodes.
    pub fn with_transient_failures(mut self, index: u64, count: u32) -> Self {
        self.transient_failures.insert(index, count);
        self
    }

    /// Frame `index` is never yielded: the decoder skips straight past it, as
    /// a lossy codec might.
    pub fn with_dropped_frame(mut self, index: u64) -> Self {
        self.dropped_frames.insert(index);
        self
    }

    /// Expected capture timestamp of `index`, for assertions.
    pub fn timestamp_of(&self, index: u64) -> u64 {
        self.timestamp_origin_ms + index * self.frame_interval_ms
    }
}

impl SessionSource for SyntheticSession {
    type Reader = SyntheticSessionReader;

    fn open(&self) -> Result<SyntheticSessionReader> {
        Ok(SyntheticSessionReader {
            session: self.clone(),
            failures_left: self.transient_failures.clone(),
            next: 0,
            last: None,
        })
    }
}

/// Reader over a [`SyntheticSession`].
#[derive(Debug)]
pub struct SyntheticSessionReader {
    session: SyntheticSession,
    failures_left: BTreeMap<u64, u32>,
    next: u64,
    last: Option<u64>,
}

impl SessionReader for SyntheticSessionReader {
    fn total_frames(&self) -> u64 {
        self.session.frame_count
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        self.next = index;
        self.last = None;
        Ok(())
    }

    fn grab(&mut self) -> Result<GrabOutcome> {
        let mut candidate = self.next;
        while self.session.dropped_frames.contains(&candidate) {
            candidate += 1;
        }
        if candidate >= self.session.frame_count {
            return Ok(GrabOutcome::EndOfSession);
        }
        if let Some(remaining) = self.failures_left.get_mut(&candidate) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(GrabOutcome::NotReady);
            }
        }
        self.last = Some(candidate);
        self.next = candidate + 1;
        Ok(GrabOutcome::Frame)
    }

    fn position(&self) -> u64 {
        self.last.unwrap_or(self.next)
    }

    fn retrieve_image(&mut self, eye: Eye, view: ViewMode) -> Result<RgbImage> {
        let index = self
            .last
            .ok_or_else(|| ExportError::Decode("no frame has been grabbed".to_string()))?;
        let shade = (index % 251) as u8;
        let eye_channel = match eye {
            Eye::Left => 64,
            Eye::Right => 192,
        };
        let view_channel = match view {
            ViewMode::Unrectified => 0,
            ViewMode::Rectified => 255,
        };
        Ok(RgbImage::from_pixel(
            self.session.width,
            self.session.height,
            Rgb([shade, eye_channel, view_channel]),
        ))
    }

    fn timestamp_millis(&self) -> Result<u64> {
        let index = self
            .last
            .ok_or_else(|| ExportError::Decode("no frame has been grabbed".to_string()))?;
        Ok(self.session.timestamp_of(index))
    }
}
