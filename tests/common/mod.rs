//! Scripted frame source shared by the sampling and rendering tests.

#![allow(dead_code)]

use std::ops::Range;

use ffmpeg_next::Rational;
use image::{Rgb, RgbImage};
use shotgrid::{FrameSource, MediaMetadata, ShotgridError, VideoMetadata};

pub const TIME_BASE: Rational = Rational(1, 1000);

/// Metadata for a 320x240 stream with a millisecond time base.
pub fn metadata(duration_seconds: f64) -> MediaMetadata {
    MediaMetadata {
        file_name: "scripted.mp4".to_string(),
        file_size: 0,
        format: "scripted".to_string(),
        duration_seconds,
        duration_estimated: false,
        start_time_seconds: 0.0,
        bit_rate: 0,
        video: VideoMetadata {
            stream_index: 0,
            width: 320,
            height: 240,
            display_width: 320,
            display_height: 240,
            sample_aspect_ratio: Rational(1, 1),
            rotation: 0,
            frames_per_second: 10.0,
            codec: "scripted".to_string(),
            time_base: TIME_BASE,
            start_pts: 0,
        },
        streams: Vec::new(),
    }
}

/// Vertical black and white stripes: plenty of edges.
pub fn detailed_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if (x / 4) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// A picture every `interval` ticks from zero to `end` inclusive. Seeks land
/// on the first picture at or after `target + landing_offset(target)`.
pub struct ScriptedSource {
    metadata: MediaMetadata,
    frames: Vec<i64>,
    position: usize,
    current: Option<i64>,
    landing_offset: Box<dyn Fn(i64) -> i64>,
    blank: Vec<Range<i64>>,
    pub seeks: Vec<i64>,
    pub rewinds: u32,
}

impl ScriptedSource {
    pub fn new(duration_seconds: f64, end: i64, interval: i64) -> Self {
        Self {
            metadata: metadata(duration_seconds),
            frames: (0..=end / interval).map(|index| index * interval).collect(),
            position: 0,
            current: None,
            landing_offset: Box::new(|_| 0),
            blank: Vec::new(),
            seeks: Vec::new(),
            rewinds: 0,
        }
    }

    pub fn with_landing(mut self, offset: impl Fn(i64) -> i64 + 'static) -> Self {
        self.landing_offset = Box::new(offset);
        self
    }

    /// Pictures with timestamps in `range` are solid black.
    pub fn with_blank(mut self, range: Range<i64>) -> Self {
        self.blank.push(range);
        self
    }
}

impl FrameSource for ScriptedSource {
    fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    fn seek(&mut self, target: i64) -> Result<(), ShotgridError> {
        self.seeks.push(target);
        let landing = target + (self.landing_offset)(target);
        self.position = self.frames.partition_point(|frame| *frame < landing);
        Ok(())
    }

    fn flush(&mut self) {}

    fn rewind(&mut self) -> Result<(), ShotgridError> {
        self.rewinds += 1;
        self.position = 0;
        self.current = None;
        Ok(())
    }

    fn decode_next_frame(&mut self) -> Result<Option<i64>, ShotgridError> {
        let frame = self.frames.get(self.position).copied();
        if frame.is_some() {
            self.position += 1;
        }
        self.current = frame;
        Ok(frame)
    }

    fn current_frame(&mut self, width: u32, height: u32) -> Result<RgbImage, ShotgridError> {
        let timestamp = self
            .current
            .ok_or_else(|| ShotgridError::VideoDecodeError("no current picture".to_string()))?;
        if self.blank.iter().any(|range| range.contains(&timestamp)) {
            Ok(RgbImage::new(width, height))
        } else {
            Ok(detailed_image(width, height))
        }
    }
}
