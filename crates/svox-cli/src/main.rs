use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};

use svox_cli::console::ConsoleProgress;
use svox_core::{ImageFileFormat, RawExportRequest, ViewMode};

/// Export stereo image pairs and per-frame timestamps from a recorded
/// session file.
#[derive(Debug, Parser)]
#[command(name = "svox", version)]
struct Cli {
    /// Recorded session file (.mkv)
    #[arg(long)]
    input: PathBuf,

    /// Destination directory; created if absent
    #[arg(long)]
    output: PathBuf,

    /// First frame index, inclusive
    #[arg(long, default_value_t = 0)]
    start: i64,

    /// Last frame index, inclusive; defaults to the end of the session and is
    /// clamped to the actual frame count
    #[arg(long)]
    stop: Option<i64>,

    /// Export every Nth frame of the selected range
    #[arg(long, default_value_t = 1)]
    step: i64,

    /// Retrieve rectified images
    #[arg(long, overrides_with = "no_rectify")]
    rectify: bool,

    /// Retrieve raw, unrectified images (default)
    #[arg(long)]
    no_rectify: bool,

    /// Image encoding for exported frames
    #[arg(long, value_enum, default_value_t = FormatArg::Png)]
    format: FormatArg,

    /// Consecutive transient grab failures tolerated before aborting;
    /// 0 retries forever
    #[arg(long, default_value_t = 100)]
    max_grab_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for ImageFileFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Png => ImageFileFormat::Png,
            FormatArg::Jpeg => ImageFileFormat::Jpeg,
        }
    }
}

impl Cli {
    fn into_request(self) -> RawExportRequest {
        let view = if self.rectify {
            ViewMode::Rectified
        } else {
            ViewMode::Unrectified
        };
        RawExportRequest {
            source_path: self.input,
            output_dir: self.output,
            start: self.start,
            stop: self.stop,
            step: self.step,
            view,
            format: self.format.into(),
            max_grab_retries: self.max_grab_retries,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut progress = ConsoleProgress::default();

    match svox_cli::export(cli.into_request(), &mut progress) {
        Ok(report) => {
            println!(
                "exported {} of {} frames (stop index {})",
                report.exported_frames, report.total_frames, report.stop_index
            );
            println!("manifest: {}", report.manifest_path.display());
            println!("summary:  {}", report.summary_path.display());
        }
        Err(err) => {
            eprintln!("export failed: {err}");
            process::exit(err.exit_code());
        }
    }
}
