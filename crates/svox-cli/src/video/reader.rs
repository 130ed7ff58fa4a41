use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use log::{debug, info};

use svox_core::errors::{ExportError, Result};
use svox_core::session::{Eye, GrabOutcome, SessionReader, SessionSource, ViewMode};

/// Container metadata tag the recorder stamps when a session was captured
/// rectified. Absent or "0" means the stream holds raw imagery.
const RECTIFIED_TAG: &str = "stereo_rectified";

/// A recorded stereo session on disk: a Matroska container holding one
/// side-by-side (left|right) video stream.
pub struct VideoSession {
    path: PathBuf,
}

impl VideoSession {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl SessionSource for VideoSession {
    type Reader = VideoSessionReader;

    fn open(&self) -> Result<VideoSessionReader> {
        VideoSessionReader::open(&self.path)
    }
}

struct GrabbedFrame {
    index: u64,
    timestamp_millis: u64,
    /// Full side-by-side frame; eyes are cropped out at retrieval.
    image: RgbImage,
}

enum FeedOutcome {
    Sent,
    Corrupt,
    Flushed,
    Exhausted,
}

/// FFmpeg-backed session reader.
///
/// Frame indices and timestamps are derived from presentation timestamps, so
/// the reported position stays authoritative even when the codec skips or
/// repeats frames around a seek.
pub struct VideoSessionReader {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    frame_rate: f64,
    total_frames: u64,
    rectified_source: bool,
    seek_target: u64,
    current: Option<GrabbedFrame>,
    eof_sent: bool,
}

impl VideoSessionReader {
    pub fn open(path: &Path) -> Result<Self> {
        let unreadable = |reason: String| ExportError::SourceUnreadable {
            path: path.to_path_buf(),
            reason,
        };

        ffmpeg::init().map_err(|e| unreadable(format!("failed to initialize FFmpeg: {e}")))?;

        let input = ffmpeg::format::input(&path).map_err(|e| unreadable(e.to_string()))?;

        let (stream_index, time_base, frame_rate, total_frames, parameters) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| unreadable("no video stream in container".to_string()))?;

            let rate = stream.avg_frame_rate();
            if rate.denominator() == 0 || rate.numerator() <= 0 {
                return Err(unreadable("stream reports no frame rate".to_string()));
            }
            let frame_rate = rate.numerator() as f64 / rate.denominator() as f64;

            let total_frames = if stream.frames() > 0 {
                stream.frames() as u64
            } else {
                let duration = stream.duration() as f64 * f64::from(stream.time_base());
                (duration * frame_rate).round() as u64
            };

            (
                stream.index(),
                stream.time_base(),
                frame_rate,
                total_frames,
                stream.parameters(),
            )
        };

        let rectified_source = input
            .metadata()
            .get(RECTIFIED_TAG)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let decoder = ffmpeg::codec::context::Context::from_parameters(parameters)
            .map_err(|e| unreadable(format!("failed to create codec context: {e}")))?
            .decoder()
            .video()
            .map_err(|e| unreadable(format!("failed to create decoder: {e}")))?;

        if decoder.width() % 2 != 0 {
            return Err(unreadable(format!(
                "side-by-side stream width must be even, got {}",
                decoder.width()
            )));
        }

        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| unreadable(format!("failed to create pixel converter: {e}")))?;

        info!(
            "Opened session '{}': {}x{} @ {:.2} fps, {} frames, {}",
            path.display(),
            decoder.width(),
            decoder.height(),
            frame_rate,
            total_frames,
            if rectified_source {
                "rectified"
            } else {
                "unrectified"
            }
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            frame_rate,
            total_frames,
            rectified_source,
            seek_target: 0,
            current: None,
            eof_sent: false,
        })
    }

    /// Feed the decoder one packet from the session's video stream.
    fn feed_packet(&mut self) -> Result<FeedOutcome> {
        let Self {
            input,
            decoder,
            stream_index,
            eof_sent,
            ..
        } = self;

        let mut packets = input.packets();
        loop {
            match packets.next() {
                Some((stream, packet)) => {
                    if stream.index() != *stream_index {
                        continue;
                    }
                    return match decoder.send_packet(&packet) {
                        Ok(()) => Ok(FeedOutcome::Sent),
                        // Corrupt packet; the next grab attempt moves past it.
                        Err(ffmpeg::Error::InvalidData) => Ok(FeedOutcome::Corrupt),
                        Err(e) => Err(ExportError::Decode(format!("failed to send packet: {e}"))),
                    };
                }
                None => {
                    if *eof_sent {
                        return Ok(FeedOutcome::Exhausted);
                    }
                    decoder
                        .send_eof()
                        .map_err(|e| ExportError::Decode(format!("failed to flush decoder: {e}")))?;
                    *eof_sent = true;
                    return Ok(FeedOutcome::Flushed);
                }
            }
        }
    }

    fn ingest(&mut self, decoded: &ffmpeg::frame::Video) -> Result<()> {
        let pts = decoded.timestamp().unwrap_or(0);
        let seconds = (pts as f64 * f64::from(self.time_base)).max(0.0);
        let index = (seconds * self.frame_rate).round() as u64;
        let timestamp_millis = (seconds * 1_000.0).round() as u64;

        let mut converted = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut converted)
            .map_err(|e| ExportError::Decode(format!("failed to convert frame: {e}")))?;

        let width = converted.width();
        let height = converted.height();
        let stride = converted.stride(0);
        let data = converted.data(0);
        let row_len = width as usize * 3;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let offset = row * stride;
            pixels.extend_from_slice(&data[offset..offset + row_len]);
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| ExportError::Decode("frame buffer has unexpected size".to_string()))?;

        debug!("decoded frame {index} (t={timestamp_millis}ms)");
        self.current = Some(GrabbedFrame {
            index,
            timestamp_millis,
            image,
        });
        Ok(())
    }
}

impl SessionReader for VideoSessionReader {
    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        let seconds = index as f64 / self.frame_rate;
        let target = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.input
            .seek(target, ..target)
            .map_err(|e| ExportError::Decode(format!("failed to seek to frame {index}: {e}")))?;
        self.decoder.flush();
        self.seek_target = index;
        self.current = None;
        self.eof_sent = false;
        Ok(())
    }

    fn grab(&mut self) -> Result<GrabOutcome> {
        loop {
            let mut decoded = ffmpeg::frame::Video::empty();
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    self.ingest(&decoded)?;
                    return Ok(GrabOutcome::Frame);
                }
                Err(ffmpeg::Error::Other {
                    errno: ffmpeg::error::EAGAIN,
                }) => match self.feed_packet()? {
                    FeedOutcome::Sent | FeedOutcome::Flushed => continue,
                    FeedOutcome::Corrupt => return Ok(GrabOutcome::NotReady),
                    FeedOutcome::Exhausted => return Ok(GrabOutcome::EndOfSession),
                },
                Err(ffmpeg::Error::Eof) => return Ok(GrabOutcome::EndOfSession),
                Err(e) => {
                    return Err(ExportError::Decode(format!("failed to receive frame: {e}")))
                }
            }
        }
    }

    fn position(&self) -> u64 {
        self.current
            .as_ref()
            .map(|frame| frame.index)
            .unwrap_or(self.seek_target)
    }

    fn retrieve_image(&mut self, eye: Eye, view: ViewMode) -> Result<RgbImage> {
        let rectified_requested = matches!(view, ViewMode::Rectified);
        if rectified_requested != self.rectified_source {
            return Err(ExportError::UnsupportedView { requested: view });
        }
        let frame = self
            .current
            .as_ref()
            .ok_or_else(|| ExportError::Decode("no frame has been grabbed".to_string()))?;
        Ok(eye_half(&frame.image, eye))
    }

    fn timestamp_millis(&self) -> Result<u64> {
        self.current
            .as_ref()
            .map(|frame| frame.timestamp_millis)
            .ok_or_else(|| ExportError::Decode("no frame has been grabbed".to_string()))
    }
}

/// Crop one eye out of a side-by-side stereo frame.
fn eye_half(full: &RgbImage, eye: Eye) -> RgbImage {
    let half_width = full.width() / 2;
    let x0 = match eye {
        Eye::Left => 0,
        Eye::Right => half_width,
    };
    image::imageops::crop_imm(full, x0, 0, half_width, full.height()).to_image()
}
