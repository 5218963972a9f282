//! Contact-sheet configuration.
//!
//! [`SheetOptions`] is a builder that carries every knob of a contact-sheet
//! job: grid shape, sampling policy, text and shadow decoration, output
//! naming, and the optional sidecar artifacts. Defaults produce a 4×4 grid,
//! 1024 pixels wide, with timestamps and an info header.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shotgrid::{ProgressCallback, ProgressInfo, SeekPolicy, SheetOptions};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{} shots done", info.current);
//!     }
//! }
//!
//! let options = SheetOptions::new()
//!     .with_grid(3, 6)
//!     .with_width(1280)
//!     .with_gap(4)
//!     .with_seek_policy(SeekPolicy::NeverSeek)
//!     .with_progress(Arc::new(LogProgress));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use image::Rgb;

use crate::error::ShotgridError;
use crate::progress::{NoOpProgress, ProgressCallback};

/// How the scheduler may position the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekPolicy {
    /// Seek, and fall back to sequential decoding if seeking proves
    /// unreliable on this source.
    #[default]
    Auto,
    /// Always seek, even when seeking overshoots or lands off target.
    AlwaysSeek,
    /// Never seek; decode every frame in order.
    NeverSeek,
}

/// Where a text block is anchored inside its target area.
///
/// The numeric values match the location codes accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    /// Bottom-left (`1`).
    LowerLeft,
    /// Bottom-right (`2`).
    LowerRight,
    /// Top-right (`3`).
    UpperRight,
    /// Top-left (`4`).
    UpperLeft,
}

impl Corner {
    /// Map a location code (1-4) to a corner.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Corner::LowerLeft),
            2 => Some(Corner::LowerRight),
            3 => Some(Corner::UpperRight),
            4 => Some(Corner::UpperLeft),
            _ => None,
        }
    }

    /// `true` for the two upper corners.
    pub fn is_upper(self) -> bool {
        matches!(self, Corner::UpperLeft | Corner::UpperRight)
    }

    /// `true` for the two right-hand corners.
    pub fn is_right(self) -> bool {
        matches!(self, Corner::LowerRight | Corner::UpperRight)
    }
}

/// Individual shots saved next to the sheet.
///
/// Parsed from letters: `t` for shot-sized pictures with their timestamp,
/// `o` for display-sized pictures, `i` to skip saving the sheet itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndividualShots {
    /// Save `<base>_t_<HH_MM_SS>_<index>.<ext>` at shot size.
    pub thumbnail: bool,
    /// Save `<base>_o_<HH_MM_SS>_<index>.<ext>` at display size.
    pub original: bool,
    /// Do not save the contact sheet.
    pub ignore_grid: bool,
}

impl IndividualShots {
    /// `true` when any per-shot file is written.
    pub fn writes_files(&self) -> bool {
        self.thumbnail || self.original
    }
}

impl FromStr for IndividualShots {
    type Err = ShotgridError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut shots = Self::default();
        for letter in value.trim().chars() {
            match letter.to_ascii_lowercase() {
                't' => shots.thumbnail = true,
                'o' => shots.original = true,
                'i' => shots.ignore_grid = true,
                other => {
                    return Err(ShotgridError::InvalidOption(format!(
                        "unknown individual shot kind '{other}' (expected t, o or i)"
                    )));
                }
            }
        }
        if shots == Self::default() {
            return Err(ShotgridError::InvalidOption(
                "individual shots need at least one of t, o or i".to_string(),
            ));
        }
        Ok(shots)
    }
}

/// Color, size and placement of one kind of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Foreground color.
    pub color: Rgb<u8>,
    /// Font size in points.
    pub size: f32,
    /// Anchor corner.
    pub corner: Corner,
    /// Color of the one-pixel drop shadow, if any.
    pub shadow: Option<Rgb<u8>>,
}

/// The full set of options for one contact-sheet job.
#[derive(Clone)]
pub struct SheetOptions {
    /// Requested number of columns.
    pub columns: u32,
    /// Requested number of rows; `0` derives rows from `step_seconds`.
    pub rows: u32,
    /// Requested time step between shots in seconds; used only when `rows`
    /// is `0`. `<= 0` lets the planner choose.
    pub step_seconds: f64,
    /// Target contact-sheet width in pixels; `0` uses the natural width.
    pub width: u32,
    /// Minimum height of a single shot in pixels.
    pub min_shot_height: u32,
    /// Gap between shots and around the border, in pixels.
    pub gap: u32,
    /// Blank ratio above which a frame is a candidate for evasion.
    /// `>= 1.0` disables evasion.
    pub blank_threshold: f64,
    /// Center weight of the edge-detection kernel; `0` disables it.
    pub edge_sensitivity: u32,
    /// Seeking strategy.
    pub seek_policy: SeekPolicy,
    /// Seconds skipped at the beginning.
    pub skip_begin: f64,
    /// Seconds skipped at the end.
    pub skip_end: f64,
    /// Explicit usable duration in seconds, measured from `skip_begin`.
    pub cut: Option<f64>,
    /// Per-shot timestamp label, or `None` to disable.
    pub timestamp_style: Option<TextStyle>,
    /// Info header style, or `None` to disable the header.
    pub info_style: Option<TextStyle>,
    /// Extra text appended to the info header.
    pub info_text: Option<String>,
    /// TrueType font file; searched in standard locations when unset.
    pub font: Option<PathBuf>,
    /// Canvas background.
    pub background: Rgb<u8>,
    /// Make the background transparent (PNG output only).
    pub transparent: bool,
    /// Drop-shadow radius: `None` disables, `Some(0)` picks one from the shot size.
    pub shadow_radius: Option<u32>,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    /// Suffix appended to the source base name; its extension picks the format.
    pub suffix: String,
    /// Directory for all outputs; beside the source when unset.
    pub output_dir: Option<PathBuf>,
    /// Replace existing outputs.
    pub overwrite: bool,
    /// Write the info header to `<base><info_suffix>` as well.
    pub info_suffix: Option<String>,
    /// Save embedded cover art to `<base>_cover.jpg`.
    pub cover: bool,
    /// Emit a WebVTT caption track and sprite sheets.
    pub sprite: bool,
    /// Prefix prepended to sprite image names inside the caption track.
    pub sprite_prefix: String,
    /// Individual shot files.
    pub individual: IndividualShots,
    /// Explicit video stream index.
    pub video_stream: Option<usize>,
    /// Override the display aspect ratio (width / height).
    pub aspect_ratio: Option<f64>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for SheetOptions {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter
            .debug_struct("SheetOptions")
            .field("columns", &self.columns)
            .field("rows", &self.rows)
            .field("step_seconds", &self.step_seconds)
            .field("width", &self.width)
            .field("min_shot_height", &self.min_shot_height)
            .field("gap", &self.gap)
            .field("blank_threshold", &self.blank_threshold)
            .field("edge_sensitivity", &self.edge_sensitivity)
            .field("seek_policy", &self.seek_policy)
            .field("skip_begin", &self.skip_begin)
            .field("skip_end", &self.skip_end)
            .field("cut", &self.cut)
            .field("suffix", &self.suffix)
            .field("sprite", &self.sprite)
            .field("individual", &self.individual)
            .finish_non_exhaustive()
    }
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 4,
            step_seconds: 120.0,
            width: 1024,
            min_shot_height: 150,
            gap: 0,
            blank_threshold: 0.8,
            edge_sensitivity: 12,
            seek_policy: SeekPolicy::Auto,
            skip_begin: 0.0,
            skip_end: 0.0,
            cut: None,
            timestamp_style: Some(TextStyle {
                color: Rgb([0xFF, 0xFF, 0xFF]),
                size: 8.0,
                corner: Corner::LowerLeft,
                shadow: Some(Rgb([0, 0, 0])),
            }),
            info_style: Some(TextStyle {
                color: Rgb([0x55, 0x55, 0x55]),
                size: 9.0,
                corner: Corner::UpperLeft,
                shadow: None,
            }),
            info_text: None,
            font: None,
            background: Rgb([0xFF, 0xFF, 0xFF]),
            transparent: false,
            shadow_radius: None,
            jpeg_quality: 90,
            suffix: "_s.jpg".to_string(),
            output_dir: None,
            overwrite: true,
            info_suffix: None,
            cover: false,
            sprite: false,
            sprite_prefix: String::new(),
            individual: IndividualShots::default(),
            video_stream: None,
            aspect_ratio: None,
            progress: Arc::new(NoOpProgress),
        }
    }
}

impl SheetOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requested grid: `columns` × `rows` (`rows == 0` for automatic).
    #[must_use]
    pub fn with_grid(mut self, columns: u32, rows: u32) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }

    /// Set the time step in seconds. Only used when rows are automatic.
    #[must_use]
    pub fn with_step(mut self, seconds: f64) -> Self {
        self.step_seconds = seconds;
        self
    }

    /// Set the target contact-sheet width (`0` = natural width).
    #[must_use]
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Set the minimum height of a single shot.
    #[must_use]
    pub fn with_min_shot_height(mut self, height: u32) -> Self {
        self.min_shot_height = height;
        self
    }

    /// Set the gap between shots.
    #[must_use]
    pub fn with_gap(mut self, gap: u32) -> Self {
        self.gap = gap;
        self
    }

    /// Set the blank-frame evasion threshold.
    #[must_use]
    pub fn with_blank_threshold(mut self, threshold: f64) -> Self {
        self.blank_threshold = threshold;
        self
    }

    /// Set the edge-detection sensitivity (`0` disables edge detection).
    #[must_use]
    pub fn with_edge_sensitivity(mut self, sensitivity: u32) -> Self {
        self.edge_sensitivity = sensitivity;
        self
    }

    /// Set the seeking strategy.
    #[must_use]
    pub fn with_seek_policy(mut self, policy: SeekPolicy) -> Self {
        self.seek_policy = policy;
        self
    }

    /// Skip `begin` seconds at the start and `end` seconds at the end.
    #[must_use]
    pub fn with_trim(mut self, begin: f64, end: f64) -> Self {
        self.skip_begin = begin;
        self.skip_end = end;
        self
    }

    /// Only use `seconds` of the source, starting after the begin trim.
    #[must_use]
    pub fn with_cut(mut self, seconds: f64) -> Self {
        self.cut = Some(seconds);
        self
    }

    /// Set or disable the per-shot timestamp label.
    #[must_use]
    pub fn with_timestamps(mut self, style: Option<TextStyle>) -> Self {
        self.timestamp_style = style;
        self
    }

    /// Set or disable the info header.
    #[must_use]
    pub fn with_info(mut self, style: Option<TextStyle>) -> Self {
        self.info_style = style;
        self
    }

    /// Append free text to the info header.
    #[must_use]
    pub fn with_info_text(mut self, text: impl Into<String>) -> Self {
        self.info_text = Some(text.into());
        self
    }

    /// Use a specific TrueType font.
    #[must_use]
    pub fn with_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.font = Some(path.into());
        self
    }

    /// Set the background color.
    #[must_use]
    pub fn with_background(mut self, color: Rgb<u8>) -> Self {
        self.background = color;
        self
    }

    /// Make the background transparent (requires PNG output).
    #[must_use]
    pub fn with_transparent_background(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Draw a drop shadow under each shot; `0` picks a radius automatically.
    #[must_use]
    pub fn with_shadow(mut self, radius: u32) -> Self {
        self.shadow_radius = Some(radius);
        self
    }

    /// Set the JPEG quality.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Set the output suffix, e.g. `"_s.jpg"` or `".png"`.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Write every output into `directory`.
    #[must_use]
    pub fn with_output_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(directory.into());
        self
    }

    /// Allow or forbid replacing existing outputs.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Also write the info header to a text file with this suffix.
    #[must_use]
    pub fn with_info_file(mut self, suffix: impl Into<String>) -> Self {
        self.info_suffix = Some(suffix.into());
        self
    }

    /// Also save embedded cover art.
    #[must_use]
    pub fn with_cover(mut self, cover: bool) -> Self {
        self.cover = cover;
        self
    }

    /// Emit a WebVTT caption track with sprite sheets. Image references
    /// inside the track are prefixed with `prefix`.
    #[must_use]
    pub fn with_sprite(mut self, prefix: impl Into<String>) -> Self {
        self.sprite = true;
        self.sprite_prefix = prefix.into();
        self
    }

    /// Save individual shots as well as, or instead of, the sheet.
    #[must_use]
    pub fn with_individual(mut self, individual: IndividualShots) -> Self {
        self.individual = individual;
        self
    }

    /// Take shots from a specific stream.
    #[must_use]
    pub fn with_video_stream(mut self, index: usize) -> Self {
        self.video_stream = Some(index);
        self
    }

    /// Override the display aspect ratio.
    #[must_use]
    pub fn with_aspect_ratio(mut self, ratio: f64) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// `true` when the output suffix selects JPEG encoding.
    pub fn is_jpeg_output(&self) -> bool {
        matches!(
            suffix_extension(&self.suffix).as_deref(),
            Some("jpg") | Some("jpeg")
        )
    }

    /// Check option combinations that can never produce a sheet.
    pub fn validate(&self) -> Result<(), ShotgridError> {
        if self.columns == 0 {
            return Err(ShotgridError::InvalidOption(
                "columns must be at least 1".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ShotgridError::InvalidOption(format!(
                "jpeg quality {} is outside 1-100",
                self.jpeg_quality
            )));
        }
        if self.skip_begin < 0.0 || self.skip_end < 0.0 {
            return Err(ShotgridError::InvalidOption(
                "begin and end trims must not be negative".to_string(),
            ));
        }
        if matches!(self.cut, Some(cut) if cut <= 0.0) {
            return Err(ShotgridError::InvalidOption(
                "cut must be positive".to_string(),
            ));
        }
        match suffix_extension(&self.suffix).as_deref() {
            Some("jpg") | Some("jpeg") | Some("png") => {}
            Some(other) => {
                return Err(ShotgridError::InvalidOption(format!(
                    "unsupported output extension: {other}"
                )));
            }
            None => {
                return Err(ShotgridError::InvalidOption(format!(
                    "output suffix {:?} has no extension",
                    self.suffix
                )));
            }
        }
        if self.transparent && self.is_jpeg_output() {
            return Err(ShotgridError::InvalidOption(
                "transparent background requires PNG output".to_string(),
            ));
        }
        if self.individual.ignore_grid && !self.individual.writes_files() {
            return Err(ShotgridError::InvalidOption(
                "skipping the sheet needs individual shots (t or o)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lower-cased extension of an output suffix, if any.
pub(crate) fn suffix_extension(suffix: &str) -> Option<String> {
    let (_, extension) = suffix.rsplit_once('.')?;
    if extension.is_empty() || extension.contains(['/', '\\']) {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}
