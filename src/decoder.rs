//! The decoder contract the sampler is written against.
//!
//! [`FrameSource`] is the narrow interface that
//! [`SamplingScheduler`](crate::SamplingScheduler) needs from a video
//! decoder: position near a timestamp, decode forward one picture at a time,
//! and hand out the current picture scaled to shot size. [`MediaSource`](crate::MediaSource) implements
//! it on top of FFmpeg; tests implement it with scripted timestamps.

use image::RgbImage;

use crate::error::ShotgridError;
use crate::metadata::MediaMetadata;

/// A seekable stream of decoded pictures.
///
/// All timestamps are in the time base reported by
/// [`VideoMetadata::time_base`](crate::VideoMetadata::time_base).
pub trait FrameSource {
    /// Metadata gathered when the source was opened.
    fn metadata(&self) -> &MediaMetadata;

    /// Position the demuxer near `target`. The landing point may be before
    /// or after the target; callers must not rely on accuracy.
    ///
    /// An error means every seeking strategy failed.
    fn seek(&mut self, target: i64) -> Result<(), ShotgridError>;

    /// Drop any pictures buffered inside the decoder.
    fn flush(&mut self);

    /// Return to the start of the stream and flush.
    fn rewind(&mut self) -> Result<(), ShotgridError>;

    /// Decode the next picture and return its timestamp, or `None` at end
    /// of stream.
    fn decode_next_frame(&mut self) -> Result<Option<i64>, ShotgridError>;

    /// The most recently decoded picture, scaled to `width` × `height`
    /// (display orientation).
    fn current_frame(&mut self, width: u32, height: u32) -> Result<RgbImage, ShotgridError>;
}
