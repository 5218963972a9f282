//! Error types for the `shotgrid` crate.
//!
//! This module defines [`ShotgridError`], the unified error type returned by
//! all fallible operations in the crate. Sampling anomalies (overshooting
//! seeks, duplicate or blank frames) are handled inside the scheduler and are
//! never reported through this type; running out of frames early is a
//! [`SheetStatus::Partial`](crate::SheetStatus) outcome rather than an error.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `shotgrid` operations.
///
/// Every public method that can fail returns `Result<T, ShotgridError>`.
/// Each error aborts the current source only; callers processing several
/// files are expected to carry on with the next one.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShotgridError {
    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::MediaSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a usable video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// An explicitly requested stream index is not a video stream.
    #[error("Stream {index} is not a video stream (file has {stream_count} streams)")]
    VideoStreamOutOfRange {
        /// Requested stream index.
        index: usize,
        /// Number of streams in the container.
        stream_count: usize,
    },

    /// The video decoder could not be created or opened.
    #[error("Failed to open video codec: {0}")]
    CodecOpen(String),

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The decoder consumed too many packets without producing a picture.
    #[error("No picture after reading {packets} packets")]
    NoPicture {
        /// Number of packets read since the last picture.
        packets: u32,
    },

    /// The usable duration is zero or negative after trimming.
    #[error("Usable duration is {duration_seconds:.2}s; check --begin/--end/--cut")]
    InvalidDuration {
        /// Net duration in seconds.
        duration_seconds: f64,
    },

    /// Even a single column cannot satisfy the minimum shot height.
    #[error(
        "Thumbnail would be too small (minimum shot height {min_height}px); \
         try --width {suggested_width} or --min-height {suggested_min_height}"
    )]
    LayoutTooSmall {
        /// The configured minimum shot height.
        min_height: u32,
        /// A canvas width that would fit one column at the minimum height.
        suggested_width: u32,
        /// A minimum height that the configured width can satisfy.
        suggested_min_height: u32,
    },

    /// The source is too short to give each shot a distinct timestamp.
    #[error("Movie is too short ({duration_seconds:.2}s) for the requested grid")]
    ClipTooShort {
        /// Net duration in seconds.
        duration_seconds: f64,
    },

    /// No shot was obtained at all.
    #[error("All rows were skipped; no shot could be taken")]
    AllRowsSkipped,

    /// The composed image exceeds what the output encoder accepts.
    #[error("Image size {width}x{height} exceeds the {limit}px limit of the output format")]
    CanvasTooLarge {
        /// Canvas width in pixels.
        width: u32,
        /// Canvas height in pixels.
        height: u32,
        /// Maximum size per axis.
        limit: u32,
    },

    /// A font could not be loaded or used.
    #[error("Font error: {0}")]
    Font(String),

    /// A configuration value is invalid.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The output file exists and overwriting is disabled.
    #[error("Output already exists: {0}")]
    OutputExists(PathBuf),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while composing or encoding.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for ShotgridError {
    fn from(error: FfmpegError) -> Self {
        ShotgridError::FfmpegError(error.to_string())
    }
}
