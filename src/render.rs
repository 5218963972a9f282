//! Drawing and encoding.
//!
//! Text is rasterized with [`fontdue`] and alpha-blended onto RGBA canvases.
//! Output images are encoded with the `image` crate; the file extension of
//! the output path selects JPEG or PNG.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use fontdue::layout::{CoordinateSystem, Layout as GlyphLayout, LayoutSettings, TextStyle as GlyphRun};
use fontdue::{Font, FontSettings};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, Rgba, RgbaImage};

use crate::configuration::{Corner, TextStyle};
use crate::error::ShotgridError;

/// Largest width or height a baseline JPEG can carry.
pub const JPEG_MAX_DIMENSION: u32 = 65_500;

const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/local/share/fonts/DejaVuSans.ttf",
    "/Library/Fonts/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\DejaVuSans.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Rect {
    /// The whole of an image.
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            x: 0,
            y: 0,
            width: image.width(),
            height: image.height(),
        }
    }
}

/// Parse `RRGGBB` (optionally prefixed with `#`).
pub fn parse_color(value: &str) -> Result<Rgb<u8>, ShotgridError> {
    let hex = value.trim().trim_start_matches('#');
    let invalid = || ShotgridError::InvalidOption(format!("invalid color {value:?}; expected RRGGBB"));
    if hex.len() != 6 {
        return Err(invalid());
    }
    let packed = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
    Ok(Rgb([(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]))
}

/// Points to pixels at 96 dpi.
fn pixel_size(points: f32) -> f32 {
    points * 96.0 / 72.0
}

/// A loaded TrueType font.
pub struct TextRenderer {
    font: Font,
}

impl TextRenderer {
    /// Parse font data.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ShotgridError> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|error| ShotgridError::Font(error.to_string()))?;
        Ok(Self { font })
    }

    /// Load a font file.
    pub fn from_file(path: &Path) -> Result<Self, ShotgridError> {
        let bytes = fs::read(path)
            .map_err(|error| ShotgridError::Font(format!("{}: {error}", path.display())))?;
        Self::from_bytes(bytes)
    }

    /// Load `explicit`, or the first font found in the usual system places.
    ///
    /// A missing explicit font is an error. When nothing is configured and
    /// nothing is found, returns `None` so the caller can go without text.
    pub fn locate(explicit: Option<&Path>) -> Result<Option<Self>, ShotgridError> {
        if let Some(path) = explicit {
            return Self::from_file(path).map(Some);
        }
        let Some(found) = FONT_SEARCH_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
        else {
            log::warn!("no font found; timestamps and info text are disabled (see --font)");
            return Ok(None);
        };
        log::debug!("using font {}", found.display());
        Self::from_file(&found).map(Some)
    }

    fn layout(&self, text: &str, points: f32) -> GlyphLayout {
        let mut layout = GlyphLayout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[&self.font], &GlyphRun::new(text, pixel_size(points), 0));
        layout
    }

    /// Width and height of `text` rendered at `points`.
    pub fn measure_block(&self, text: &str, points: f32) -> (u32, u32) {
        if text.is_empty() {
            return (0, 0);
        }
        let layout = self.layout(text, points);
        let width = layout
            .glyphs()
            .iter()
            .map(|glyph| glyph.x + glyph.width as f32)
            .fold(0.0_f32, f32::max);
        (width.ceil() as u32, layout.height().ceil() as u32)
    }

    /// Distance kept between text and the edge of its area: 30% of the
    /// text height, at least one pixel.
    pub fn padding(&self, points: f32) -> u32 {
        let (_, height) = self.measure_block("SAMPLE", points);
        ((height as f32 * 0.3).round() as u32).max(1)
    }

    /// Draw `text` into `area` of `canvas`, anchored at `style.corner`,
    /// `margin + padding` pixels away from the edges.
    pub fn draw(&self, canvas: &mut RgbaImage, area: Rect, text: &str, style: &TextStyle, margin: u32) {
        if text.is_empty() {
            return;
        }
        let (width, height) = self.measure_block(text, style.size);
        let inset = (margin + self.padding(style.size)) as i64;
        let left = area.x as i64 + inset;
        let right = area.x as i64 + area.width as i64 - width as i64 - inset;
        let top = area.y as i64 + inset;
        let bottom = area.y as i64 + area.height as i64 - height as i64 - inset;

        let (x, y) = match style.corner {
            Corner::LowerLeft => (left, bottom),
            Corner::LowerRight => (right, bottom),
            Corner::UpperRight => (right, top),
            Corner::UpperLeft => (left, top),
        };

        if let Some(shadow) = style.shadow {
            let (shadow_at, text_at) = match style.corner {
                Corner::LowerLeft => ((x + 1, y), (x, y - 1)),
                Corner::LowerRight => ((x, y), (x - 1, y - 1)),
                Corner::UpperRight => ((x, y + 1), (x - 1, y)),
                Corner::UpperLeft => ((x + 1, y + 1), (x, y)),
            };
            self.blit(canvas, area, text, style.size, shadow_at, shadow);
            self.blit(canvas, area, text, style.size, text_at, style.color);
        } else {
            self.blit(canvas, area, text, style.size, (x, y), style.color);
        }
    }

    fn blit(
        &self,
        canvas: &mut RgbaImage,
        clip: Rect,
        text: &str,
        points: f32,
        origin: (i64, i64),
        color: Rgb<u8>,
    ) {
        let layout = self.layout(text, points);
        let clip_right = (clip.x + clip.width).min(canvas.width()) as i64;
        let clip_bottom = (clip.y + clip.height).min(canvas.height()) as i64;

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (_, coverage) = self.font.rasterize_config(glyph.key);
            let glyph_x = origin.0 + glyph.x.round() as i64;
            let glyph_y = origin.1 + glyph.y.round() as i64;

            for row in 0..glyph.height {
                let y = glyph_y + row as i64;
                if y < clip.y as i64 || y >= clip_bottom {
                    continue;
                }
                for column in 0..glyph.width {
                    let x = glyph_x + column as i64;
                    if x < clip.x as i64 || x >= clip_right {
                        continue;
                    }
                    let alpha = coverage[row * glyph.width + column];
                    if alpha == 0 {
                        continue;
                    }
                    blend(canvas.get_pixel_mut(x as u32, y as u32), color, alpha);
                }
            }
        }
    }
}

/// Alpha-blend `color` with `coverage` over `pixel`.
fn blend(pixel: &mut Rgba<u8>, color: Rgb<u8>, coverage: u8) {
    let alpha = coverage as u32;
    for channel in 0..3 {
        let under = pixel[channel] as u32;
        pixel[channel] = ((color[channel] as u32 * alpha + under * (255 - alpha)) / 255) as u8;
    }
    pixel[3] = pixel[3].max(coverage);
}

/// Encode `canvas` to `path`.
///
/// `.jpg`/`.jpeg` produce an opaque JPEG at `jpeg_quality`; anything else is
/// written as PNG, keeping the alpha channel only when `keep_alpha` is set.
pub fn save_canvas(
    canvas: &RgbaImage,
    path: &Path,
    jpeg_quality: u8,
    keep_alpha: bool,
) -> Result<(), ShotgridError> {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if extension == "jpg" || extension == "jpeg" {
        if canvas.width() > JPEG_MAX_DIMENSION || canvas.height() > JPEG_MAX_DIMENSION {
            return Err(ShotgridError::CanvasTooLarge {
                width: canvas.width(),
                height: canvas.height(),
                limit: JPEG_MAX_DIMENSION,
            });
        }
        let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
        let writer = BufWriter::new(File::create(path)?);
        JpegEncoder::new_with_quality(writer, jpeg_quality).encode_image(&rgb)?;
    } else if keep_alpha {
        canvas.save_with_format(path, ImageFormat::Png)?;
    } else {
        let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
        rgb.save_with_format(path, ImageFormat::Png)?;
    }

    log::debug!("saved {}x{} image to {}", canvas.width(), canvas.height(), path.display());
    Ok(())
}
