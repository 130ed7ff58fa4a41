pub mod console;
pub mod video;

use svox_core::{ExportReport, ExportRequest, FrameExporter, ProgressSink, RawExportRequest, Result};

use crate::video::VideoSession;

/// Validate the raw request and run the export against the FFmpeg-backed
/// session reader, reporting progress to `progress`.
pub fn export(raw: RawExportRequest, progress: &mut dyn ProgressSink) -> Result<ExportReport> {
    let request = ExportRequest::validate(raw)?;
    let source = VideoSession::new(request.source_path.clone());
    FrameExporter::new(request).run(&source, progress)
}
