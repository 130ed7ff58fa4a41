use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ExportError, Result};

/// File name of the timestamp manifest inside the output directory.
pub const MANIFEST_FILE_NAME: &str = "Timestamps.txt";

/// One exported frame: its session-relative index and capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_index: u64,
    pub timestamp_millis: u64,
}

/// Ordered record of the frames one export run produced.
///
/// Insertion order is frame order; records are never mutated after they are
/// appended. The collection is flushed to a single text artifact once
/// iteration completes.
#[derive(Debug, Default, Clone)]
pub struct ExportManifest {
    records: Vec<FrameRecord>,
}

impl ExportManifest {
    pub fn push(&mut self, record: FrameRecord) {
        if let Some(last) = self.records.last() {
            debug_assert!(
                record.frame_index > last.frame_index,
                "manifest records must be appended in ascending frame order"
            );
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Write the manifest as a text table: header row, then one row per
    /// record in sequence order. Deterministic for a given record sequence.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let write_failure = |source| ExportError::WriteFailure {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(write_failure)?;
        let mut out = BufWriter::new(file);
        writeln!(out, "Index, Timestamp").map_err(write_failure)?;
        for record in &self.records {
            writeln!(out, "{}, {}", record.frame_index, record.timestamp_millis)
                .map_err(write_failure)?;
        }
        out.flush().map_err(write_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn writes_header_and_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);

        let mut manifest = ExportManifest::default();
        manifest.push(FrameRecord {
            frame_index: 10,
            timestamp_millis: 1_330,
        });
        manifest.push(FrameRecord {
            frame_index: 15,
            timestamp_millis: 1_495,
        });
        manifest.write_to(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Index, Timestamp\n10, 1330\n15, 1495\n");
    }

    #[test]
    fn empty_manifest_still_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        ExportManifest::default().write_to(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Index, Timestamp\n");
    }

    #[test]
    fn identical_records_produce_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");

        let mut manifest = ExportManifest::default();
        for index in [0u64, 3, 6] {
            manifest.push(FrameRecord {
                frame_index: index,
                timestamp_millis: 1_000 + index * 33,
            });
        }
        manifest.write_to(&first).unwrap();
        manifest.write_to(&second).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }
}
