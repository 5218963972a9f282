//! Contact-sheet canvas.
//!
//! [`GridComposer`] owns the output canvas for one job. Shots are placed by
//! grid index as they arrive; [`GridComposer::finalize`] trims rows (and, for
//! a single short row, columns) that never received a shot.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage, RgbImage};

use crate::configuration::SheetOptions;
use crate::error::ShotgridError;
use crate::layout::Layout;
use crate::render::{JPEG_MAX_DIMENSION, Rect};

/// Lays shots out on a canvas according to a [`Layout`].
pub struct GridComposer {
    layout: Layout,
    canvas: RgbaImage,
    background: Rgba<u8>,
    header_height: u32,
    shadow: Option<(RgbaImage, u32)>,
    placed: u32,
}

impl GridComposer {
    /// Allocate the canvas.
    ///
    /// `header_height` is the caption band reserved above the grid; pass `0`
    /// when the info header is off or drawn in a lower corner.
    pub fn new(layout: &Layout, options: &SheetOptions, header_height: u32) -> Result<Self, ShotgridError> {
        let width = layout.canvas_width;
        let height = layout.canvas_height + header_height;
        if options.is_jpeg_output() && (width > JPEG_MAX_DIMENSION || height > JPEG_MAX_DIMENSION) {
            return Err(ShotgridError::CanvasTooLarge {
                width,
                height,
                limit: JPEG_MAX_DIMENSION,
            });
        }

        let [red, green, blue] = options.background.0;
        let alpha = if options.transparent { 0 } else { 255 };
        let background = Rgba([red, green, blue, alpha]);

        let shadow = options.shadow_radius.map(|radius| {
            let radius = if radius == 0 {
                auto_shadow_radius(layout.shot_width, layout.shot_height)
            } else {
                radius
            };
            if layout.gap < 2 * radius + 1 {
                log::warn!(
                    "gap {} is smaller than the shadow ({}px); shadows will overlap neighbouring shots",
                    layout.gap,
                    2 * radius + 1
                );
            }
            (shadow_tile(layout.shot_width, layout.shot_height, radius), radius)
        });

        log::debug!("canvas {width}x{height}, header band {header_height}px");

        Ok(Self {
            layout: *layout,
            canvas: RgbaImage::from_pixel(width, height, background),
            background,
            header_height,
            shadow,
            placed: 0,
        })
    }

    /// The layout being composed.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Height of the caption band above the grid.
    pub fn header_height(&self) -> u32 {
        self.header_height
    }

    /// Number of shots placed since the last reset.
    pub fn placed(&self) -> u32 {
        self.placed
    }

    /// Canvas rectangle of the cell at `index`.
    pub fn cell(&self, index: u32) -> Rect {
        let (x, y) = self.layout.shot_position(index, self.header_height);
        Rect {
            x,
            y,
            width: self.layout.shot_width,
            height: self.layout.shot_height,
        }
    }

    /// Mutable access to the canvas, for text drawn after placement.
    pub fn canvas_mut(&mut self) -> &mut RgbaImage {
        &mut self.canvas
    }

    /// Copy `image` into cell `index`, drawing the drop shadow first.
    ///
    /// Images that do not match the shot size are resized.
    pub fn place(&mut self, index: u32, image: &RgbImage) -> Result<Rect, ShotgridError> {
        if index >= self.layout.shot_count() {
            return Err(ShotgridError::InvalidOption(format!(
                "shot index {index} is outside a grid of {} cells",
                self.layout.shot_count()
            )));
        }
        let cell = self.cell(index);

        if let Some((tile, radius)) = &self.shadow {
            let offset = (*radius + 1) as i64;
            imageops::overlay(&mut self.canvas, tile, cell.x as i64 + offset, cell.y as i64 + offset);
        }

        let mut shot = DynamicImage::ImageRgb8(image.clone());
        if image.width() != cell.width || image.height() != cell.height {
            shot = shot.resize_exact(cell.width, cell.height, FilterType::Triangle);
        }
        imageops::replace(&mut self.canvas, &shot.to_rgba8(), cell.x as i64, cell.y as i64);

        self.placed += 1;
        Ok(cell)
    }

    /// Clear the canvas for a fresh sampling run.
    pub fn reset(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = self.background;
        }
        self.placed = 0;
    }

    /// Crop the canvas to the shots actually obtained and return it.
    ///
    /// Whole rows that never received a shot are removed. When every shot
    /// fits in a single short row, unused columns are removed as well.
    pub fn finalize(self, obtained: u32) -> Result<RgbaImage, ShotgridError> {
        let layout = self.layout;
        let columns = layout.columns.max(1);
        let created_rows = obtained.div_ceil(columns).min(layout.rows);
        if created_rows == 0 {
            return Err(ShotgridError::AllRowsSkipped);
        }

        let mut width = self.canvas.width();
        let mut height = self.canvas.height();
        let skipped_rows = layout.rows - created_rows;
        if skipped_rows > 0 {
            height -= skipped_rows * (layout.shot_height + layout.gap);
            log::info!("{skipped_rows} of {} rows were skipped; cropping the sheet", layout.rows);
        }
        if created_rows == 1 && obtained < columns {
            width -= (columns - obtained) * (layout.shot_width + layout.gap);
        }

        if width == self.canvas.width() && height == self.canvas.height() {
            return Ok(self.canvas);
        }
        Ok(imageops::crop_imm(&self.canvas, 0, 0, width, height).to_image())
    }
}

/// Default shadow radius: 3% of the shorter side, at least 3px.
pub fn auto_shadow_radius(shot_width: u32, shot_height: u32) -> u32 {
    ((shot_width.min(shot_height) as f64 * 0.03) as u32).max(3)
}

/// A blurred black rectangle on a transparent tile of `shot + 2r + 1`.
fn shadow_tile(shot_width: u32, shot_height: u32, radius: u32) -> RgbaImage {
    let mut tile = RgbaImage::new(shot_width + 2 * radius + 1, shot_height + 2 * radius + 1);
    for y in (radius + 1)..=shot_height.min(tile.height() - 1) {
        for x in (radius + 1)..=shot_width.min(tile.width() - 1) {
            tile.put_pixel(x, y, Rgba([0, 0, 0, 255]));
        }
    }
    imageops::blur(&tile, radius as f32 * 2.0 / 3.0)
}
