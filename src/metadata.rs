//! Media metadata types.
//!
//! This module defines the metadata structures returned by
//! [`FrameSource::metadata`](crate::FrameSource::metadata). Metadata is read
//! once when a source is opened and cached for its lifetime. Everything the
//! layout planner and scheduler need (duration, time base, display size) is
//! resolved here so that they never have to talk to FFmpeg directly.

use ffmpeg_next::Rational;

use crate::conversion::pts_to_seconds;

/// Complete metadata for a media file.
///
/// # Example
///
/// ```no_run
/// use shotgrid::{FrameSource, MediaSource, SheetOptions};
///
/// let source = MediaSource::open("input.mp4", &SheetOptions::default()).unwrap();
/// let metadata = source.metadata();
/// println!("Duration: {:.1}s", metadata.duration_seconds);
/// println!("Format: {}", metadata.format);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct MediaMetadata {
    /// File name without directories.
    pub file_name: String,
    /// File size in bytes, `0` when unknown.
    pub file_size: u64,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"matroska,webm"`).
    pub format: String,
    /// Total duration in seconds.
    pub duration_seconds: f64,
    /// `true` when the container did not report a duration and it was
    /// estimated from the bit rate.
    pub duration_estimated: bool,
    /// Container start time in seconds (often `0`, non-zero for MPEG-TS / VOB).
    pub start_time_seconds: f64,
    /// Container bit rate in bits per second, `0` when unknown.
    pub bit_rate: u64,
    /// The video stream that shots are taken from.
    pub video: VideoMetadata,
    /// One summary per stream, in container order.
    pub streams: Vec<StreamSummary>,
}

/// Metadata for the sampled video stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Index of the stream inside the container.
    pub stream_index: usize,
    /// Coded frame width in pixels.
    pub width: u32,
    /// Coded frame height in pixels.
    pub height: u32,
    /// Width after sample-aspect-ratio correction and rotation.
    pub display_width: u32,
    /// Height after rotation.
    pub display_height: u32,
    /// Sample (pixel) aspect ratio; `0/1` when undefined.
    pub sample_aspect_ratio: Rational,
    /// Clockwise rotation in degrees: 0, 90, 180 or 270.
    pub rotation: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`).
    pub codec: String,
    /// Stream time base; all timestamps handed out by a source use it.
    pub time_base: Rational,
    /// First timestamp of the stream, in time-base units.
    pub start_pts: i64,
}

impl VideoMetadata {
    /// Start of the stream in seconds.
    pub fn start_seconds(&self) -> f64 {
        pts_to_seconds(self.start_pts, self.time_base)
    }

    /// `true` when rotation swaps the coded width and height.
    pub fn is_transposed(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }
}

/// The kind-specific part of a [`StreamSummary`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDetail {
    /// A video stream.
    Video {
        /// Coded width.
        width: u32,
        /// Coded height.
        height: u32,
        /// Frames per second.
        frames_per_second: f64,
        /// Embedded cover art rather than moving video.
        attached_picture: bool,
    },
    /// An audio stream.
    Audio {
        /// Sample rate in hertz.
        sample_rate: u32,
        /// Channel count.
        channels: u16,
    },
    /// A subtitle stream.
    Subtitle {
        /// Optional `title` tag.
        title: Option<String>,
    },
    /// Data, attachment or unknown streams.
    Other,
}

/// A one-line description of a container stream, used in the info header.
#[derive(Debug, Clone)]
pub struct StreamSummary {
    /// Index inside the container.
    pub index: usize,
    /// Codec name.
    pub codec: String,
    /// `language` tag, if present.
    pub language: Option<String>,
    /// Stream bit rate in bits per second, `0` when unknown.
    pub bit_rate: u64,
    /// Kind-specific details.
    pub detail: StreamDetail,
}

/// Resolve the on-screen size of a video frame.
///
/// Horizontal size is scaled by the sample aspect ratio (or replaced by the
/// forced display aspect ratio), then the axes are swapped for 90/270 degree
/// rotations.
pub fn display_dimensions(
    width: u32,
    height: u32,
    sample_aspect_ratio: Rational,
    rotation: u32,
    forced_aspect: Option<f64>,
) -> (u32, u32) {
    let mut scaled_width = width;
    if let Some(aspect) = forced_aspect.filter(|aspect| *aspect > 0.0) {
        scaled_width = (height as f64 * aspect).round() as u32;
    } else if sample_aspect_ratio.numerator() > 0 && sample_aspect_ratio.denominator() > 0 {
        let ratio = sample_aspect_ratio.numerator() as f64 / sample_aspect_ratio.denominator() as f64;
        scaled_width = (ratio * width as f64).round() as u32;
    }
    let scaled_width = scaled_width.max(1);

    if rotation == 90 || rotation == 270 {
        (height, scaled_width)
    } else {
        (scaled_width, height)
    }
}

/// Snap an arbitrary rotation angle (degrees, counter-clockwise as reported by
/// the display matrix) to a clockwise multiple of 90.
pub fn normalize_rotation(degrees: f64) -> u32 {
    if !degrees.is_finite() {
        return 0;
    }
    let clockwise = (-degrees).rem_euclid(360.0);
    let quarter = (clockwise / 90.0).round() as u32;
    (quarter % 4) * 90
}

/// Estimate a duration from file size and bit rate.
///
/// Returns `None` when either value is unknown.
pub fn estimate_duration(file_size: u64, bit_rate: u64) -> Option<f64> {
    if file_size == 0 || bit_rate == 0 {
        return None;
    }
    Some(0.9 * file_size as f64 / (bit_rate as f64 / 8.0))
}
