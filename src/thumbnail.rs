//! One contact sheet, start to finish.
//!
//! [`ContactSheet::generate`] opens a video, plans the grid, samples shots,
//! composes and saves the sheet, and writes the optional side outputs (info
//! file, cover art, sprite sheets with their caption track, individual
//! shots).
//! [`ContactSheet::render`] runs the same pipeline against any
//! [`FrameSource`] and returns the image instead of saving it.
//!
//! # Example
//!
//! ```no_run
//! use shotgrid::{ContactSheet, SheetOptions, SheetStatus};
//!
//! let options = SheetOptions::new().with_grid(3, 8).with_gap(4);
//! let report = ContactSheet::generate("talk.mp4", &options)?;
//! if let SheetStatus::Partial { obtained, planned } = report.status {
//!     eprintln!("only {obtained} of {planned} shots");
//! }
//! println!("saved {}", report.output.display());
//! # Ok::<(), shotgrid::ShotgridError>(())
//! ```

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::composer::GridComposer;
use crate::configuration::{SheetOptions, TextStyle};
use crate::conversion::format_time;
use crate::decoder::FrameSource;
use crate::error::ShotgridError;
use crate::individual::ShotWriter;
use crate::info::{header_text, write_cover, write_info_file};
use crate::layout::{Layout, LayoutRequest, plan};
use crate::progress::ProgressTracker;
use crate::render::{Rect, TextRenderer, save_canvas};
use crate::scheduler::{SamplingScheduler, SamplingStatistics, Shot, ShotSink};
use crate::source::MediaSource;
use crate::sprite::{SpriteExporter, SpriteOutput};

/// Whether every planned cell received a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetStatus {
    /// All cells filled.
    Complete,
    /// The stream ended (or shots were skipped) before the grid was full.
    Partial {
        /// Shots placed.
        obtained: u32,
        /// Cells planned.
        planned: u32,
    },
}

impl SheetStatus {
    /// `true` for [`SheetStatus::Complete`].
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// An in-memory sheet produced by [`ContactSheet::render`].
#[derive(Debug, Clone)]
pub struct RenderedSheet {
    /// The cropped canvas.
    pub image: RgbaImage,
    /// Completeness.
    pub status: SheetStatus,
    /// Geometry used.
    pub layout: Layout,
    /// Sampling counters.
    pub statistics: SamplingStatistics,
    /// The info header text, whether or not it was drawn.
    pub header: String,
}

/// What [`ContactSheet::generate`] produced.
#[derive(Debug, Clone)]
pub struct SheetReport {
    /// The input file.
    pub source: PathBuf,
    /// The sheet path.
    pub output: PathBuf,
    /// `false` when individual shots replaced the sheet.
    pub sheet_saved: bool,
    /// Completeness.
    pub status: SheetStatus,
    /// Geometry used.
    pub layout: Layout,
    /// Final canvas size after cropping.
    pub canvas_width: u32,
    /// Final canvas height after cropping.
    pub canvas_height: u32,
    /// Sampling counters.
    pub statistics: SamplingStatistics,
    /// Sidecar info file, when written.
    pub info_file: Option<PathBuf>,
    /// Cover art file, when written.
    pub cover: Option<PathBuf>,
    /// Sprite sheets and caption track, when written.
    pub sprite: Option<SpriteOutput>,
    /// Individual shot files, in the order they were written.
    pub individual: Vec<PathBuf>,
    /// Wall-clock time spent on this source.
    pub elapsed: Duration,
}

/// Contact-sheet generation entry points.
pub struct ContactSheet;

impl ContactSheet {
    /// Build and save the sheet for `path`.
    ///
    /// # Errors
    ///
    /// [`ShotgridError::OutputExists`] when the output exists and overwriting
    /// is off; otherwise any error from opening, planning, sampling or
    /// saving. A sheet that could not be filled is not an error; see
    /// [`SheetReport::status`].
    pub fn generate<P: AsRef<Path>>(
        path: P,
        options: &SheetOptions,
    ) -> Result<SheetReport, ShotgridError> {
        let started = Instant::now();
        let path = path.as_ref();
        options.validate()?;

        let base = output_base(path, options);
        let output = with_suffix(&base, &options.suffix);
        let save_sheet = !options.individual.ignore_grid;
        if save_sheet && !options.overwrite && output.exists() {
            return Err(ShotgridError::OutputExists(output));
        }

        if let Some(directory) = &options.output_dir {
            fs::create_dir_all(directory)?;
        }
        let mut source = MediaSource::open(path, options)?;

        let sprite_target = options.sprite.then(|| split_base(&base));
        let shot_writer = options
            .individual
            .writes_files()
            .then(|| ShotWriter::new(&base, options));
        let (rendered, side) =
            Self::render_with(&mut source, options, sprite_target, shot_writer)?;

        if save_sheet {
            save_canvas(&rendered.image, &output, options.jpeg_quality, options.transparent)?;
            log::info!("saved {}", output.display());
        } else {
            log::info!("individual shots only; {} not written", output.display());
        }

        let sprite = side.sprite.map(SpriteExporter::finish).transpose()?;
        let individual = side.shots.map(ShotWriter::finish).unwrap_or_default();

        let info_file = match &options.info_suffix {
            Some(suffix) => {
                let info_path = with_suffix(&base, suffix);
                write_info_file(&info_path, &rendered.header)?;
                Some(info_path)
            }
            None => None,
        };

        let cover = match source.cover_art() {
            Some(bytes) if options.cover => {
                let cover_path = with_suffix(&base, "_cover.jpg");
                write_cover(&cover_path, bytes)?;
                Some(cover_path)
            }
            _ => {
                if options.cover {
                    log::info!("{} has no embedded cover art", path.display());
                }
                None
            }
        };

        Ok(SheetReport {
            source: path.to_path_buf(),
            output,
            sheet_saved: save_sheet,
            status: rendered.status,
            layout: rendered.layout,
            canvas_width: rendered.image.width(),
            canvas_height: rendered.image.height(),
            statistics: rendered.statistics,
            info_file,
            cover,
            sprite,
            individual,
            elapsed: started.elapsed(),
        })
    }

    /// Build a sheet from `source` without writing anything.
    pub fn render<S: FrameSource + ?Sized>(
        source: &mut S,
        options: &SheetOptions,
    ) -> Result<RenderedSheet, ShotgridError> {
        options.validate()?;
        Self::render_with(source, options, None, None).map(|(rendered, _)| rendered)
    }

    /// Render, feeding a sprite exporter for `(directory, base name)` and a
    /// shot writer when they are given.
    fn render_with<S: FrameSource + ?Sized>(
        source: &mut S,
        options: &SheetOptions,
        sprite_target: Option<(PathBuf, String)>,
        mut shot_writer: Option<ShotWriter>,
    ) -> Result<(RenderedSheet, SideOutputs), ShotgridError> {
        let metadata = source.metadata().clone();
        let duration = net_duration(metadata.duration_seconds, options)?;
        let request = LayoutRequest::from_options(
            options,
            metadata.video.display_width,
            metadata.video.display_height,
            duration,
            metadata.video.time_base,
        );
        let layout = plan(&request)?;
        let mut sprite = match sprite_target {
            Some((directory, base_name)) => {
                Some(SpriteExporter::new(directory, base_name, &layout, options)?)
            }
            None => None,
        };

        let wants_text = options.timestamp_style.is_some() || options.info_style.is_some();
        let renderer = if wants_text {
            TextRenderer::locate(options.font.as_deref())?
        } else {
            None
        };

        let header = header_text(&metadata, options.info_text.as_deref());
        let header_band = match (&renderer, &options.info_style) {
            (Some(renderer), Some(style)) if style.corner.is_upper() => {
                let (_, height) = renderer.measure_block(&header, style.size);
                height + options.gap + renderer.padding(style.size)
            }
            _ => 0,
        };

        let mut composer = GridComposer::new(&layout, options, header_band)?;
        let mut progress =
            ProgressTracker::new(options.progress.clone(), Some(layout.shot_count() as u64));
        let scheduler = SamplingScheduler::new(&layout, options, &metadata);
        let mut statistics = SamplingStatistics::default();

        let outcome = {
            let mut sink = SheetSink {
                composer: &mut composer,
                sprite: sprite.as_mut(),
                shots: shot_writer.as_mut(),
                renderer: renderer.as_ref(),
                timestamp_style: options.timestamp_style.as_ref(),
                progress: &mut progress,
            };
            scheduler.run(source, &mut sink, &mut statistics)?
        };

        let mut image = composer.finalize(outcome.shots_taken)?;
        if let (Some(renderer), Some(style)) = (&renderer, &options.info_style) {
            let area = Rect::of(&image);
            renderer.draw(&mut image, area, &header, style, options.gap);
        }
        progress.finish();

        let status = if outcome.is_partial() {
            log::warn!(
                "{}: only {} of {} shots{}",
                metadata.file_name,
                outcome.shots_taken,
                outcome.shots_planned,
                if outcome.end_of_stream { " before the end of the stream" } else { "" }
            );
            SheetStatus::Partial {
                obtained: outcome.shots_taken,
                planned: outcome.shots_planned,
            }
        } else {
            SheetStatus::Complete
        };

        let rendered = RenderedSheet {
            image,
            status,
            layout,
            statistics,
            header,
        };
        let side = SideOutputs {
            sprite,
            shots: shot_writer,
        };
        Ok((rendered, side))
    }

    /// Where the sheet for `input` is written.
    pub fn output_path(input: &Path, options: &SheetOptions) -> PathBuf {
        with_suffix(&output_base(input, options), &options.suffix)
    }
}

/// Writers that still have files to finish after sampling.
struct SideOutputs {
    sprite: Option<SpriteExporter>,
    shots: Option<ShotWriter>,
}

/// Feeds accepted shots to the sprite exporter, the shot writer and the
/// composer.
struct SheetSink<'a> {
    composer: &'a mut GridComposer,
    sprite: Option<&'a mut SpriteExporter>,
    shots: Option<&'a mut ShotWriter>,
    renderer: Option<&'a TextRenderer>,
    timestamp_style: Option<&'a TextStyle>,
    progress: &'a mut ProgressTracker,
}

impl ShotSink for SheetSink<'_> {
    fn accept(&mut self, shot: Shot) -> Result<(), ShotgridError> {
        // Sprites are unlabelled.
        if let Some(sprite) = self.sprite.as_deref_mut() {
            sprite.add(&shot)?;
        }
        if let Some(shots) = self.shots.as_deref_mut() {
            shots.write(&shot, self.renderer.zip(self.timestamp_style))?;
        }
        let cell = self.composer.place(shot.index, &shot.image)?;
        if let (Some(renderer), Some(style)) = (self.renderer, self.timestamp_style) {
            renderer.draw(self.composer.canvas_mut(), cell, &format_time(shot.seconds), style, 0);
        }
        self.progress
            .advance(Some(Duration::from_secs_f64(shot.seconds.max(0.0))));
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ShotgridError> {
        self.composer.reset();
        if let Some(sprite) = self.sprite.as_deref_mut() {
            sprite.reset()?;
        }
        if let Some(shots) = self.shots.as_deref_mut() {
            shots.reset()?;
        }
        self.progress.restart();
        Ok(())
    }
}

/// Usable duration after trimming.
///
/// A `cut` limits the duration after the skipped beginning; otherwise both
/// ends are trimmed.
pub fn net_duration(duration_seconds: f64, options: &SheetOptions) -> Result<f64, ShotgridError> {
    let net = match options.cut {
        Some(cut) => cut.min(duration_seconds - options.skip_begin),
        None => duration_seconds - options.skip_begin - options.skip_end,
    };
    if net <= 0.0 || !net.is_finite() {
        return Err(ShotgridError::InvalidDuration {
            duration_seconds: net,
        });
    }
    Ok(net)
}

/// Output path without the suffix: the input's stem, in the output
/// directory or next to the input.
fn output_base(input: &Path, options: &SheetOptions) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(|| OsString::from("sheet"));
    match &options.output_dir {
        Some(directory) => directory.join(stem),
        None => input.with_file_name(stem),
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn split_base(base: &Path) -> (PathBuf, String) {
    let directory = base
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let name = base
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    (directory, name)
}
