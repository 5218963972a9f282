//! Internal conversion helpers.
//!
//! Pixel-data copying, timestamp rescaling between stream time bases and
//! seconds, and the human-readable formatting used for labels, caption
//! cues and the info header.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// `bytes_per_pixel` is the number of bytes per pixel for the output format
/// (3 for RGB24).
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_length {
        return data[..row_length * (height as usize)].to_vec();
    }

    let mut buffer = Vec::with_capacity(row_length * (height as usize));
    for row in 0..(height as usize) {
        let row_start = row * stride;
        buffer.extend_from_slice(&data[row_start..row_start + row_length]);
    }
    buffer
}

/// Seconds represented by one tick of `time_base`.
pub fn time_base_seconds(time_base: Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a PTS value from stream time base to seconds.
pub fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base_seconds(time_base)
}

/// Convert seconds to ticks of `time_base`, truncating toward zero.
pub fn seconds_to_pts(seconds: f64, time_base: Rational) -> i64 {
    let tick = time_base_seconds(time_base);
    if tick <= 0.0 {
        return 0;
    }
    (seconds / tick) as i64
}

/// Format seconds as `HH:MM:SS`, truncating fractions.
///
/// Negative values render as `N/A`.
pub fn format_time(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return "N/A".to_string();
    }
    let total = seconds as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// Format seconds as a caption-track timestamp, `HH:MM:SS.mmm`.
pub fn format_cue_time(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

/// Format a byte count with binary units.
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if bytes < 1024 {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.0} kiB", value / KIB)
    } else if value < KIB * KIB * KIB {
        format!("{:.0} MiB", value / (KIB * KIB))
    } else {
        format!("{:.1} GiB", value / (KIB * KIB * KIB))
    }
}
