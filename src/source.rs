//! FFmpeg-backed [`FrameSource`].
//!
//! [`MediaSource`] opens a file, resolves the metadata the planner needs, and
//! decodes the selected video stream one picture at a time. Seeking falls
//! back from keyframe seeks to any-frame seeks to byte seeks, because some
//! containers (raw MPEG, broken indexes) only support the latter.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input, stream::Disposition},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use ffmpeg_next::util::error::EAGAIN;
use ffmpeg_sys_next::{AVCodecParameters, AVPacketSideDataType};
use image::{RgbImage, imageops};

use crate::configuration::SheetOptions;
use crate::conversion::{frame_to_buffer, pts_to_seconds, time_base_seconds};
use crate::decoder::FrameSource;
use crate::error::ShotgridError;
use crate::metadata::{
    MediaMetadata, StreamDetail, StreamSummary, VideoMetadata, display_dimensions,
    estimate_duration, normalize_rotation,
};

/// Video packets read without producing a picture before giving up.
const PACKET_BUDGET: u32 = 1000;

/// Microseconds per second, the container-level time unit.
const CONTAINER_TICKS_PER_SECOND: f64 = 1_000_000.0;

/// A scaler together with the geometry it was built for.
struct Scaler {
    context: ScalingContext,
    key: (Pixel, u32, u32, u32, u32),
}

/// A video file opened for sampling.
///
/// # Example
///
/// ```no_run
/// use shotgrid::{FrameSource, MediaSource, SheetOptions};
///
/// let mut source = MediaSource::open("input.mkv", &SheetOptions::default())?;
/// source.seek(90_000)?;
/// source.flush();
/// if let Some(pts) = source.decode_next_frame()? {
///     let image = source.current_frame(320, 180)?;
///     image.save(format!("frame_{pts}.png"))?;
/// }
/// # Ok::<(), shotgrid::ShotgridError>(())
/// ```
pub struct MediaSource {
    input: Input,
    decoder: VideoDecoder,
    metadata: MediaMetadata,
    stream_index: usize,
    decoded: VideoFrame,
    has_picture: bool,
    eof_sent: bool,
    last_packet_pts: Option<i64>,
    scaler: Option<Scaler>,
    cover: Option<Vec<u8>>,
    path: PathBuf,
}

impl Debug for MediaSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaSource")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("metadata", &self.metadata)
            .field("has_cover", &self.cover.is_some())
            .finish_non_exhaustive()
    }
}

impl MediaSource {
    /// Open `path` and prepare a decoder for its video stream.
    ///
    /// The stream is the one requested in `options`, or FFmpeg's best video
    /// stream, skipping embedded cover art.
    ///
    /// # Errors
    ///
    /// [`ShotgridError::FileOpen`] when FFmpeg cannot read the file,
    /// [`ShotgridError::NoVideoStream`] or
    /// [`ShotgridError::VideoStreamOutOfRange`] when there is nothing to
    /// sample, and [`ShotgridError::CodecOpen`] when no decoder is available.
    pub fn open<P: AsRef<Path>>(path: P, options: &SheetOptions) -> Result<Self, ShotgridError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("opening {}", path.display());

        ffmpeg_next::init().map_err(|error| ShotgridError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| ShotgridError::FileOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        let stream_index = select_video_stream(&input, options.video_stream)?;
        let stream = input.stream(stream_index).ok_or(ShotgridError::NoVideoStream)?;

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| {
                ShotgridError::CodecOpen(format!("stream {stream_index}: {error}"))
            })?;

        let file_size = std::fs::metadata(&path).map(|metadata| metadata.len()).unwrap_or(0);
        let bit_rate = input.bit_rate().max(0) as u64;

        let container_duration = input.duration();
        let (duration_seconds, duration_estimated) = if container_duration > 0 {
            (container_duration as f64 / CONTAINER_TICKS_PER_SECOND, false)
        } else if let Some(estimate) = estimate_duration(file_size, bit_rate) {
            log::warn!("duration is unknown; estimated {estimate:.1}s from the bit rate");
            (estimate, true)
        } else {
            let stream_duration = stream.duration();
            if stream_duration > 0 {
                (pts_to_seconds(stream_duration, stream.time_base()), false)
            } else {
                (0.0, false)
            }
        };

        // SAFETY: `input` owns a valid format context for its whole lifetime.
        let container_start = unsafe { (*input.as_ptr()).start_time };
        let start_time_seconds = if container_start == ffmpeg_sys_next::AV_NOPTS_VALUE {
            0.0
        } else {
            container_start as f64 / CONTAINER_TICKS_PER_SECOND
        };

        let time_base = stream.time_base();
        let stream_start = stream.start_time();
        let start_pts = if stream_start == ffmpeg_sys_next::AV_NOPTS_VALUE {
            0
        } else {
            stream_start
        };

        let rotation = stream_rotation(&stream);
        let sample_aspect_ratio = decoder.aspect_ratio();
        let (display_width, display_height) = display_dimensions(
            decoder.width(),
            decoder.height(),
            sample_aspect_ratio,
            rotation,
            options.aspect_ratio,
        );

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| stream.parameters().id().name().to_string());

        let video = VideoMetadata {
            stream_index,
            width: decoder.width(),
            height: decoder.height(),
            display_width,
            display_height,
            sample_aspect_ratio,
            rotation,
            frames_per_second: frame_rate(stream.rate(), stream.avg_frame_rate()),
            codec,
            time_base,
            start_pts,
        };

        let streams = input.streams().map(|stream| summarize(&stream)).collect();
        let cover = if options.cover { find_cover(&input) } else { None };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let metadata = MediaMetadata {
            file_name,
            file_size,
            format: input.format().name().to_string(),
            duration_seconds,
            duration_estimated,
            start_time_seconds,
            bit_rate,
            video,
            streams,
        };

        log::debug!(
            "video stream {stream_index}: {}x{} (display {}x{}), rotation {}, {:.2} fps, {:.2}s",
            metadata.video.width,
            metadata.video.height,
            display_width,
            display_height,
            rotation,
            metadata.video.frames_per_second,
            duration_seconds
        );

        Ok(Self {
            input,
            decoder,
            metadata,
            stream_index,
            decoded: VideoFrame::empty(),
            has_picture: false,
            eof_sent: false,
            last_packet_pts: None,
            scaler: None,
            cover,
            path,
        })
    }

    /// Embedded cover art, when requested at open time and present.
    pub fn cover_art(&self) -> Option<&[u8]> {
        self.cover.as_deref()
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seek_with_flags(&mut self, target: i64, flags: i32) -> bool {
        // SAFETY: the format context is valid and the stream index was
        // validated at open time.
        let result = unsafe {
            ffmpeg_sys_next::av_seek_frame(
                self.input.as_mut_ptr(),
                self.stream_index as i32,
                target,
                flags,
            )
        };
        result >= 0
    }

    /// Byte offset proportional to `target`'s position in the file.
    fn byte_position(&self, target: i64) -> Option<i64> {
        let duration = self.metadata.duration_seconds;
        if self.metadata.file_size == 0 || duration <= 0.0 {
            return None;
        }
        let seconds = pts_to_seconds(target, self.metadata.video.time_base)
            - self.metadata.start_time_seconds;
        let fraction = (seconds / duration).clamp(0.0, 1.0);
        Some((fraction * self.metadata.file_size as f64) as i64)
    }

    fn reset_decode_state(&mut self) {
        self.has_picture = false;
        self.eof_sent = false;
        self.last_packet_pts = None;
    }
}

impl FrameSource for MediaSource {
    fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    fn seek(&mut self, target: i64) -> Result<(), ShotgridError> {
        self.reset_decode_state();
        if self.seek_with_flags(target, ffmpeg_sys_next::AVSEEK_FLAG_BACKWARD as i32) {
            return Ok(());
        }
        log::debug!("keyframe seek to {target} failed; trying any-frame seek");
        if self.seek_with_flags(target, ffmpeg_sys_next::AVSEEK_FLAG_ANY as i32) {
            return Ok(());
        }
        log::debug!("any-frame seek to {target} failed; trying byte seek");
        if let Some(position) = self.byte_position(target)
            && self.seek_with_flags(position, ffmpeg_sys_next::AVSEEK_FLAG_BYTE as i32)
        {
            return Ok(());
        }
        Err(ShotgridError::FfmpegError(format!(
            "every seek strategy failed for timestamp {target}"
        )))
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }

    fn rewind(&mut self) -> Result<(), ShotgridError> {
        self.reset_decode_state();
        let start = self.metadata.video.start_pts;
        if !self.seek_with_flags(start, ffmpeg_sys_next::AVSEEK_FLAG_BACKWARD as i32)
            && !self.seek_with_flags(0, ffmpeg_sys_next::AVSEEK_FLAG_BYTE as i32)
        {
            return Err(ShotgridError::FfmpegError(
                "cannot return to the start of the stream".to_string(),
            ));
        }
        self.decoder.flush();
        Ok(())
    }

    fn decode_next_frame(&mut self) -> Result<Option<i64>, ShotgridError> {
        let mut packets = 0_u32;
        loop {
            match received(self.decoder.receive_frame(&mut self.decoded))? {
                Received::Picture => {
                    self.has_picture = true;
                    let pts = self
                        .decoded
                        .timestamp()
                        .or_else(|| self.decoded.pts())
                        .or(self.last_packet_pts)
                        .unwrap_or(self.metadata.video.start_pts);
                    return Ok(Some(pts));
                }
                Received::Drained => return Ok(None),
                Received::NeedsInput => {}
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            if !read_more(packet.read(&mut self.input)) {
                self.decoder.send_eof()?;
                self.eof_sent = true;
                continue;
            }
            if packet.stream() != self.stream_index {
                continue;
            }
            packets += 1;
            if packets > PACKET_BUDGET {
                return Err(ShotgridError::NoPicture { packets });
            }
            if let Some(pts) = packet.pts() {
                self.last_packet_pts = Some(pts);
            }
            self.decoder
                .send_packet(&packet)
                .map_err(|error| ShotgridError::VideoDecodeError(error.to_string()))?;
        }
    }

    fn current_frame(&mut self, width: u32, height: u32) -> Result<RgbImage, ShotgridError> {
        if !self.has_picture {
            return Err(ShotgridError::VideoDecodeError(
                "no picture has been decoded".to_string(),
            ));
        }

        let rotation = self.metadata.video.rotation;
        let (scaled_width, scaled_height) = if self.metadata.video.is_transposed() {
            (height, width)
        } else {
            (width, height)
        };

        let mut rgb_frame = VideoFrame::empty();
        scaler_for(&mut self.scaler, &self.decoded, scaled_width, scaled_height)?
            .context
            .run(&self.decoded, &mut rgb_frame)?;

        let buffer = frame_to_buffer(&rgb_frame, scaled_width, scaled_height, 3);
        let image = RgbImage::from_raw(scaled_width, scaled_height, buffer).ok_or_else(|| {
            ShotgridError::VideoDecodeError(
                "failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;

        Ok(match rotation {
            90 => imageops::rotate90(&image),
            180 => imageops::rotate180(&image),
            270 => imageops::rotate270(&image),
            _ => image,
        })
    }
}

/// The cached scaler, rebuilt when the input or output geometry changes.
fn scaler_for<'a>(
    slot: &'a mut Option<Scaler>,
    frame: &VideoFrame,
    width: u32,
    height: u32,
) -> Result<&'a mut Scaler, ShotgridError> {
    let key = (frame.format(), frame.width(), frame.height(), width, height);
    if slot.as_ref().is_none_or(|scaler| scaler.key != key) {
        let context = ScalingContext::get(
            key.0,
            key.1,
            key.2,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;
        *slot = Some(Scaler { context, key });
    }
    slot.as_mut()
        .ok_or_else(|| ShotgridError::VideoDecodeError("scaler unavailable".to_string()))
}

fn is_cover_art(stream: &ffmpeg_next::Stream<'_>) -> bool {
    stream.disposition().contains(Disposition::ATTACHED_PIC)
}

fn select_video_stream(input: &Input, requested: Option<usize>) -> Result<usize, ShotgridError> {
    if let Some(index) = requested {
        let stream = input
            .stream(index)
            .ok_or(ShotgridError::VideoStreamOutOfRange {
                index,
                stream_count: input.nb_streams() as usize,
            })?;
        if stream.parameters().medium() != Type::Video {
            return Err(ShotgridError::InvalidOption(format!(
                "stream {index} is not a video stream"
            )));
        }
        return Ok(index);
    }

    if let Some(best) = input.streams().best(Type::Video)
        && !is_cover_art(&best)
    {
        return Ok(best.index());
    }
    input
        .streams()
        .find(|stream| stream.parameters().medium() == Type::Video && !is_cover_art(stream))
        .map(|stream| stream.index())
        .ok_or(ShotgridError::NoVideoStream)
}

fn frame_rate(real: Rational, average: Rational) -> f64 {
    let real = time_base_seconds(real);
    if real > 0.0 { real } else { time_base_seconds(average) }
}

/// Clockwise rotation from the `rotate` tag or the display matrix.
fn stream_rotation(stream: &ffmpeg_next::Stream<'_>) -> u32 {
    if let Some(degrees) = stream
        .metadata()
        .get("rotate")
        .and_then(|value| value.trim().parse::<f64>().ok())
    {
        return normalize_rotation(-degrees);
    }
    // SAFETY: codec parameters stay valid while the stream is borrowed.
    unsafe { display_matrix_rotation(stream.parameters().as_ptr()) }
        .map(normalize_rotation)
        .unwrap_or(0)
}

/// Counter-clockwise angle stored in the display matrix side data.
unsafe fn display_matrix_rotation(parameters: *const AVCodecParameters) -> Option<f64> {
    if parameters.is_null() {
        return None;
    }
    // SAFETY: caller guarantees `parameters` is valid; side data entries are
    // owned by it.
    unsafe {
        let side_data = ffmpeg_sys_next::av_packet_side_data_get(
            (*parameters).coded_side_data,
            (*parameters).nb_coded_side_data,
            AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX,
        );
        if side_data.is_null() || (*side_data).size < 9 * 4 || (*side_data).data.is_null() {
            return None;
        }
        let angle = ffmpeg_sys_next::av_display_rotation_get((*side_data).data as *const i32);
        angle.is_finite().then_some(angle)
    }
}

fn summarize(stream: &ffmpeg_next::Stream<'_>) -> StreamSummary {
    let parameters = stream.parameters();
    // SAFETY: plain field reads from codec parameters owned by the stream.
    let raw = unsafe { &*parameters.as_ptr() };
    let tags = stream.metadata();

    let detail = match parameters.medium() {
        Type::Video => StreamDetail::Video {
            width: raw.width.max(0) as u32,
            height: raw.height.max(0) as u32,
            frames_per_second: frame_rate(stream.rate(), stream.avg_frame_rate()),
            attached_picture: is_cover_art(stream),
        },
        Type::Audio => StreamDetail::Audio {
            sample_rate: raw.sample_rate.max(0) as u32,
            channels: raw.ch_layout.nb_channels.max(0) as u16,
        },
        Type::Subtitle => StreamDetail::Subtitle {
            title: tags.get("title").map(str::to_string),
        },
        _ => StreamDetail::Other,
    };

    StreamSummary {
        index: stream.index(),
        codec: parameters.id().name().to_string(),
        language: tags.get("language").map(str::to_string),
        bit_rate: raw.bit_rate.max(0) as u64,
        detail,
    }
}

fn find_cover(input: &Input) -> Option<Vec<u8>> {
    let stream = input.streams().find(is_cover_art)?;
    // SAFETY: `attached_pic` is a packet owned by the stream; its data is
    // valid for `size` bytes while the input is open.
    let bytes = unsafe {
        let packet = &(*stream.as_ptr()).attached_pic;
        if packet.data.is_null() || packet.size <= 0 {
            return None;
        }
        std::slice::from_raw_parts(packet.data, packet.size as usize).to_vec()
    };
    log::debug!("found {} bytes of cover art in stream {}", bytes.len(), stream.index());
    Some(bytes)
}

/// The decoder's answer to a `receive_frame` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Received {
    Picture,
    NeedsInput,
    Drained,
}

/// Only "try again" asks for more input; any other decoder error is fatal.
fn received(result: Result<(), FfmpegError>) -> Result<Received, ShotgridError> {
    match result {
        Ok(()) => Ok(Received::Picture),
        Err(FfmpegError::Eof) => Ok(Received::Drained),
        Err(FfmpegError::Other { errno }) if errno == EAGAIN => Ok(Received::NeedsInput),
        Err(error) => Err(ShotgridError::VideoDecodeError(error.to_string())),
    }
}

/// `false` once the container has nothing more to give. Read failures end
/// the stream just like end of file does.
fn read_more(result: Result<(), FfmpegError>) -> bool {
    match result {
        Ok(()) => true,
        Err(FfmpegError::Eof) => false,
        Err(error) => {
            log::warn!("read error treated as end of stream: {error}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_eagain_asks_for_more_input() {
        assert_eq!(received(Ok(())).unwrap(), Received::Picture);
        assert_eq!(received(Err(FfmpegError::Eof)).unwrap(), Received::Drained);
        assert_eq!(
            received(Err(FfmpegError::Other { errno: EAGAIN })).unwrap(),
            Received::NeedsInput
        );
    }

    #[test]
    fn other_decoder_errors_are_fatal() {
        for error in [FfmpegError::InvalidData, FfmpegError::Bug, FfmpegError::Other { errno: 5 }] {
            assert!(matches!(
                received(Err(error)),
                Err(ShotgridError::VideoDecodeError(_))
            ));
        }
    }

    #[test]
    fn read_errors_end_the_stream() {
        assert!(read_more(Ok(())));
        assert!(!read_more(Err(FfmpegError::Eof)));
        assert!(!read_more(Err(FfmpegError::Other { errno: 5 })));
        assert!(!read_more(Err(FfmpegError::InvalidData)));
    }
}
