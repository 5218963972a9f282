//! The info header.
//!
//! A short description of the file and its streams, drawn above (or below)
//! the grid and optionally saved next to the sheet as a text file.
//!
//! ```text
//! File: holiday.mkv
//! Size: 734003200 bytes (700 MiB), duration: 01:32:10, bitrate: 1061 kb/s
//! Audio: aac, 48000 Hz, 2 channels, 128 kb/s (eng)
//! Video: h264, 720x576, 25.00 fps => 1024x576
//! Subtitles: eng, fre (forced)
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::conversion::{format_size, format_time};
use crate::error::ShotgridError;
use crate::metadata::{MediaMetadata, StreamDetail, StreamSummary};

/// Build the header text for `metadata`, followed by `extra` when given.
pub fn header_text(metadata: &MediaMetadata, extra: Option<&str>) -> String {
    let mut text = format!("File: {}", metadata.file_name);
    let _ = write!(
        text,
        "\nSize: {} bytes ({})",
        metadata.file_size,
        format_size(metadata.file_size)
    );

    if metadata.duration_seconds > 0.0 {
        let _ = write!(text, ", duration: {}", format_time(metadata.duration_seconds));
        if metadata.duration_estimated {
            text.push_str(" (estimated)");
        }
    } else {
        text.push_str(", duration: N/A");
    }

    if metadata.bit_rate > 0 {
        let _ = write!(text, ", bitrate: {} kb/s", metadata.bit_rate / 1000);
    } else if metadata.duration_seconds >= 1.0 && metadata.file_size > 0 {
        let average = metadata.file_size as f64 * 8.0 / metadata.duration_seconds.floor() / 1000.0;
        let _ = write!(text, ", avg.bitrate: {average:.0} kb/s");
    } else {
        text.push_str(", bitrate: N/A");
    }

    for stream in &metadata.streams {
        if let StreamDetail::Audio { .. } = stream.detail {
            text.push('\n');
            text.push_str(&stream_line(stream, metadata));
        }
    }
    for stream in &metadata.streams {
        if let StreamDetail::Video { .. } = stream.detail {
            text.push('\n');
            text.push_str(&stream_line(stream, metadata));
        }
    }
    if let Some(subtitles) = subtitle_line(&metadata.streams) {
        let _ = write!(text, "\nSubtitles: {subtitles}");
    }

    if let Some(extra) = extra.filter(|extra| !extra.is_empty()) {
        text.push('\n');
        text.push_str(extra);
    }
    text
}

/// One line describing an audio or video stream.
pub fn stream_line(stream: &StreamSummary, metadata: &MediaMetadata) -> String {
    let mut line = String::new();
    match &stream.detail {
        StreamDetail::Audio {
            sample_rate,
            channels,
        } => {
            let _ = write!(line, "Audio: {}, {sample_rate} Hz, {channels} channels", stream.codec);
            if stream.bit_rate > 0 {
                let _ = write!(line, ", {} kb/s", stream.bit_rate / 1000);
            }
        }
        StreamDetail::Video {
            width,
            height,
            frames_per_second,
            attached_picture,
        } => {
            let _ = write!(line, "Video: {}, {width}x{height}", stream.codec);
            if stream.bit_rate > 0 {
                let _ = write!(line, ", {} kb/s", stream.bit_rate / 1000);
            }
            if *attached_picture {
                line.push_str(", cover art");
            } else {
                let _ = write!(line, ", {frames_per_second:5.2} fps");
            }
            let video = &metadata.video;
            if stream.index == video.stream_index
                && (video.display_width != *width || video.display_height != *height)
            {
                let _ = write!(line, " => {}x{}", video.display_width, video.display_height);
            }
        }
        StreamDetail::Subtitle { .. } | StreamDetail::Other => {
            let _ = write!(line, "Stream {}: {}", stream.index, stream.codec);
        }
    }
    if let Some(language) = &stream.language {
        let _ = write!(line, " ({language})");
    }
    line
}

/// Languages of labelled subtitle streams, then codec counts for the rest.
fn subtitle_line(streams: &[StreamSummary]) -> Option<String> {
    let mut labelled = Vec::new();
    let mut unlabelled: Vec<(&str, u32)> = Vec::new();

    for stream in streams {
        let StreamDetail::Subtitle { title } = &stream.detail else {
            continue;
        };
        match &stream.language {
            Some(language) => match title.as_deref() {
                Some(title) if !title.eq_ignore_ascii_case("sub") => {
                    labelled.push(format!("{language} ({title})"));
                }
                _ => labelled.push(language.clone()),
            },
            None => match unlabelled.iter_mut().find(|(codec, _)| *codec == stream.codec) {
                Some((_, count)) => *count += 1,
                None => unlabelled.push((&stream.codec, 1)),
            },
        }
    }

    let mut parts = labelled;
    parts.extend(unlabelled.into_iter().map(|(codec, count)| {
        if count > 1 {
            format!("{codec} ({count}x)")
        } else {
            codec.to_string()
        }
    }));

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Write the header text to a sidecar file.
pub fn write_info_file(path: &Path, text: &str) -> Result<(), ShotgridError> {
    let mut contents = text.to_string();
    contents.push('\n');
    fs::write(path, contents)?;
    log::debug!("wrote info file {}", path.display());
    Ok(())
}

/// Write embedded cover art verbatim.
pub fn write_cover(path: &Path, bytes: &[u8]) -> Result<(), ShotgridError> {
    fs::write(path, bytes)?;
    log::debug!("wrote {} bytes of cover art to {}", bytes.len(), path.display());
    Ok(())
}
