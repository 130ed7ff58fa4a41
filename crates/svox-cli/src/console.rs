use std::io::{self, Write};

use svox_core::ProgressSink;

const BAR_WIDTH: usize = 30;

/// In-place console progress bar, redrawn once per exported frame.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn frame_exported(&mut self, frame_index: u64, fraction: f64) {
        let filled = ((fraction * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
        print!(
            "\r[{}{}] {:3.0}% (frame {})",
            "=".repeat(filled),
            " ".repeat(BAR_WIDTH - filled),
            fraction * 100.0,
            frame_index
        );
        let _ = io::stdout().flush();
    }

    fn finished(&mut self) {
        println!();
    }
}
