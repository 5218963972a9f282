//! Sprite sheets and WebVTT thumbnails track.
//!
//! Web players show a preview while scrubbing by looking up the current time
//! in a caption track whose cues point at a region of a sprite image
//! (`sheet.jpg#xywh=x,y,w,h`). [`SpriteExporter`] packs shots into sheets of
//! a bounded size, writes each sheet once it is full, and writes the track
//! when the job finishes.

use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::imageops;
use image::{Rgba, RgbaImage};

use crate::configuration::SheetOptions;
use crate::conversion::format_cue_time;
use crate::error::ShotgridError;
use crate::layout::Layout;
use crate::render::save_canvas;
use crate::scheduler::Shot;

/// Where one shot ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tile {
    seconds: f64,
    sheet: u32,
    x: u32,
    y: u32,
}

/// Files written by [`SpriteExporter::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteOutput {
    /// Sprite sheet images, in order.
    pub sheets: Vec<PathBuf>,
    /// The caption track.
    pub track: PathBuf,
}

/// Packs shots into sprite sheets and builds the matching caption track.
pub struct SpriteExporter {
    directory: PathBuf,
    base_name: String,
    prefix: String,
    tile_width: u32,
    tile_height: u32,
    columns: u32,
    rows: u32,
    step_seconds: f64,
    jpeg_quality: u8,
    sheet: RgbaImage,
    sheet_index: u32,
    in_sheet: u32,
    tiles: Vec<Tile>,
    sheets: Vec<PathBuf>,
}

impl SpriteExporter {
    /// Create an exporter writing `<base_name>_vtt_<n>.jpg` and
    /// `<base_name>.vtt` into `directory`.
    ///
    /// Tiles are shot-sized. Each sheet holds as many columns and rows as
    /// fit in the contact-sheet width. The configured sprite prefix is
    /// prepended to image names inside the track, typically a URL path.
    pub fn new(
        directory: impl Into<PathBuf>,
        base_name: impl Into<String>,
        layout: &Layout,
        options: &SheetOptions,
    ) -> Result<Self, ShotgridError> {
        let tile_width = layout.shot_width;
        let tile_height = layout.shot_height;
        let max_size = layout.canvas_width;
        if tile_width == 0 || tile_height == 0 {
            return Err(ShotgridError::InvalidOption(
                "sprite tiles must not be empty".to_string(),
            ));
        }
        let columns = (max_size / tile_width).max(1);
        let rows = (max_size / tile_height).max(1);
        log::debug!("sprite sheets of {columns}x{rows} tiles ({tile_width}x{tile_height})");

        Ok(Self {
            directory: directory.into(),
            base_name: base_name.into(),
            prefix: options.sprite_prefix.clone(),
            tile_width,
            tile_height,
            columns,
            rows,
            step_seconds: layout.step_seconds(),
            jpeg_quality: options.jpeg_quality,
            sheet: blank_sheet(columns, rows, tile_width, tile_height),
            sheet_index: 0,
            in_sheet: 0,
            tiles: Vec::new(),
            sheets: Vec::new(),
        })
    }

    /// Tiles per sheet as `(columns, rows)`.
    pub fn capacity(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Number of shots added since the last reset.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// `true` before the first shot.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    fn sheet_name(&self, index: u32) -> String {
        format!("{}_vtt_{index}.jpg", self.base_name)
    }

    /// Add a shot, writing the current sheet if this fills it.
    pub fn add(&mut self, shot: &Shot) -> Result<(), ShotgridError> {
        let column = self.in_sheet % self.columns;
        let row = self.in_sheet / self.columns;
        let x = column * self.tile_width;
        let y = row * self.tile_height;

        let tile = image::DynamicImage::ImageRgb8(shot.image.clone()).to_rgba8();
        imageops::replace(&mut self.sheet, &tile, x as i64, y as i64);
        self.tiles.push(Tile {
            seconds: shot.seconds,
            sheet: self.sheet_index,
            x,
            y,
        });

        self.in_sheet += 1;
        if self.in_sheet >= self.columns * self.rows {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the current sheet, cropped to the tiles it holds.
    fn flush(&mut self) -> Result<(), ShotgridError> {
        if self.in_sheet == 0 {
            return Ok(());
        }
        let used_rows = self.in_sheet.div_ceil(self.columns);
        let used_columns = if used_rows > 1 {
            self.columns
        } else {
            self.in_sheet
        };
        let width = used_columns * self.tile_width;
        let height = used_rows * self.tile_height;

        let path = self.directory.join(self.sheet_name(self.sheet_index));
        if width == self.sheet.width() && height == self.sheet.height() {
            save_canvas(&self.sheet, &path, self.jpeg_quality, false)?;
        } else {
            let cropped = imageops::crop_imm(&self.sheet, 0, 0, width, height).to_image();
            save_canvas(&cropped, &path, self.jpeg_quality, false)?;
        }
        log::debug!("wrote sprite sheet {}", path.display());

        self.sheets.push(path);
        self.sheet = blank_sheet(self.columns, self.rows, self.tile_width, self.tile_height);
        self.sheet_index += 1;
        self.in_sheet = 0;
        Ok(())
    }

    /// Forget every shot and delete the sheets already written.
    pub fn reset(&mut self) -> Result<(), ShotgridError> {
        for path in self.sheets.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => log::debug!("removed sprite sheet {}", path.display()),
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
        }
        self.sheet = blank_sheet(self.columns, self.rows, self.tile_width, self.tile_height);
        self.sheet_index = 0;
        self.in_sheet = 0;
        self.tiles.clear();
        Ok(())
    }

    /// The caption track for the shots added so far.
    ///
    /// Each cue runs from the midpoint with the previous shot to the
    /// midpoint with the next one. The first cue starts at zero and the
    /// last one ends half a step after its shot.
    pub fn track(&self) -> String {
        let mut track = String::from("WEBVTT");
        for (index, tile) in self.tiles.iter().enumerate() {
            let from = match index.checked_sub(1).map(|previous| self.tiles[previous]) {
                Some(previous) => (previous.seconds + tile.seconds) / 2.0,
                None => 0.0,
            };
            let to = match self.tiles.get(index + 1) {
                Some(next) => (tile.seconds + next.seconds) / 2.0,
                None => tile.seconds + self.step_seconds / 2.0,
            };
            let _ = write!(
                track,
                "\n\n{} --> {}\n{}{}#xywh={},{},{},{}",
                format_cue_time(from),
                format_cue_time(to),
                self.prefix,
                self.sheet_name(tile.sheet),
                tile.x,
                tile.y,
                self.tile_width,
                self.tile_height
            );
        }
        track.push('\n');
        track
    }

    /// Write the last sheet and the caption track.
    pub fn finish(mut self) -> Result<SpriteOutput, ShotgridError> {
        self.flush()?;
        let track = track_path(&self.directory, &self.base_name);
        fs::write(&track, self.track())?;
        log::debug!("wrote caption track {}", track.display());
        Ok(SpriteOutput {
            sheets: self.sheets,
            track,
        })
    }
}

fn track_path(directory: &Path, base_name: &str) -> PathBuf {
    directory.join(format!("{base_name}.vtt"))
}

fn blank_sheet(columns: u32, rows: u32, tile_width: u32, tile_height: u32) -> RgbaImage {
    RgbaImage::from_pixel(columns * tile_width, rows * tile_height, Rgba([0, 0, 0, 255]))
}
