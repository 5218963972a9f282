//! Individual shot files.
//!
//! Besides the sheet, each accepted shot can be saved on its own: at shot
//! size with its timestamp drawn in, and at the source's display size.
//! Names carry the shot time and grid index, for example
//! `movie_t_00_12_30_00004.jpg`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};

use crate::configuration::{IndividualShots, SheetOptions, TextStyle, suffix_extension};
use crate::conversion::format_time;
use crate::error::ShotgridError;
use crate::render::{Rect, TextRenderer, save_canvas};
use crate::scheduler::Shot;

/// Writes the individual files of accepted shots.
pub struct ShotWriter {
    base: PathBuf,
    extension: String,
    jpeg_quality: u8,
    kinds: IndividualShots,
    written: Vec<PathBuf>,
}

impl ShotWriter {
    /// Create a writer naming files after `base` (the output path without
    /// its suffix). The image format follows the sheet suffix.
    pub fn new(base: impl Into<PathBuf>, options: &SheetOptions) -> Self {
        Self {
            base: base.into(),
            extension: suffix_extension(&options.suffix).unwrap_or_else(|| "jpg".to_string()),
            jpeg_quality: options.jpeg_quality,
            kinds: options.individual,
            written: Vec::new(),
        }
    }

    /// Path of the `kind` file (`t` or `o`) for `shot`.
    pub fn path_for(&self, kind: char, shot: &Shot) -> PathBuf {
        let time = format_time(shot.seconds).replace(':', "_");
        let mut name = self.base.as_os_str().to_os_string();
        name.push(format!("_{kind}_{time}_{:05}.{}", shot.index, self.extension));
        PathBuf::from(name)
    }

    /// Files written since the last reset.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Save the requested files for `shot`. The thumbnail carries the
    /// timestamp when a renderer and style are given.
    pub fn write(
        &mut self,
        shot: &Shot,
        label: Option<(&TextRenderer, &TextStyle)>,
    ) -> Result<(), ShotgridError> {
        if self.kinds.thumbnail {
            let mut tile = DynamicImage::ImageRgb8(shot.image.clone()).to_rgba8();
            if let Some((renderer, style)) = label {
                let area = Rect::of(&tile);
                renderer.draw(&mut tile, area, &format_time(shot.seconds), style, 0);
            }
            let path = self.path_for('t', shot);
            save_canvas(&tile, &path, self.jpeg_quality, false)?;
            self.written.push(path);
        }

        if self.kinds.original {
            match &shot.original {
                Some(original) => {
                    let path = self.path_for('o', shot);
                    save_picture(original, &path, self.jpeg_quality)?;
                    self.written.push(path);
                }
                None => log::debug!("shot {} carries no display-size picture", shot.index),
            }
        }
        Ok(())
    }

    /// Delete every file written so far; sampling is starting over.
    pub fn reset(&mut self) -> Result<(), ShotgridError> {
        for path in self.written.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }

    /// The files written by the final run.
    pub fn finish(self) -> Vec<PathBuf> {
        log::debug!("wrote {} individual shots", self.written.len());
        self.written
    }
}

fn save_picture(picture: &RgbImage, path: &Path, jpeg_quality: u8) -> Result<(), ShotgridError> {
    let canvas = DynamicImage::ImageRgb8(picture.clone()).to_rgba8();
    save_canvas(&canvas, path, jpeg_quality, false)
}
