//! Grid geometry planning.
//!
//! [`plan`] turns the requested grid shape and the source's display size
//! into a [`Layout`]: how many columns and rows fit, how large each shot is,
//! how large the canvas is, and how far apart in time the shots are. It is a
//! pure computation with no FFmpeg involvement, so it can be evaluated (and
//! tested) before a decoder is ever opened.
//!
//! # Example
//!
//! ```
//! use ffmpeg_next::Rational;
//! use shotgrid::layout::{LayoutRequest, plan};
//!
//! let request = LayoutRequest {
//!     source_width: 1920,
//!     source_height: 1080,
//!     columns: 4,
//!     rows: 4,
//!     step_seconds: 0.0,
//!     width: 1024,
//!     min_shot_height: 100,
//!     gap: 0,
//!     duration_seconds: 600.0,
//!     time_base: Rational::new(1, 1000),
//! };
//! let layout = plan(&request).unwrap();
//! assert_eq!(layout.shot_count(), 16);
//! assert_eq!(layout.shot_width, 256);
//! ```

use ffmpeg_next::Rational;

use crate::configuration::SheetOptions;
use crate::conversion::time_base_seconds;
use crate::error::ShotgridError;

/// Everything the planner needs to know about a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutRequest {
    /// Source width after aspect-ratio correction and rotation.
    pub source_width: u32,
    /// Source height after rotation.
    pub source_height: u32,
    /// Requested column count.
    pub columns: u32,
    /// Requested row count; `0` derives it from the step.
    pub rows: u32,
    /// Requested step in seconds; `<= 0` derives it from the grid.
    pub step_seconds: f64,
    /// Target canvas width; `0` for the natural width.
    pub width: u32,
    /// Minimum shot height.
    pub min_shot_height: u32,
    /// Gap between shots.
    pub gap: u32,
    /// Usable (net) duration in seconds.
    pub duration_seconds: f64,
    /// Time base the step is expressed in.
    pub time_base: Rational,
}

impl LayoutRequest {
    /// Build a request from job options and the source's display size.
    pub fn from_options(
        options: &SheetOptions,
        source_width: u32,
        source_height: u32,
        duration_seconds: f64,
        time_base: Rational,
    ) -> Self {
        Self {
            source_width,
            source_height,
            columns: options.columns,
            rows: options.rows,
            step_seconds: options.step_seconds,
            width: options.width,
            min_shot_height: options.min_shot_height,
            gap: options.gap,
            duration_seconds,
            time_base,
        }
    }
}

/// Computed grid geometry. Immutable once planned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    /// Number of columns; `0` signals a failed plan.
    pub columns: u32,
    /// Number of rows.
    pub rows: u32,
    /// Width of each shot; always even.
    pub shot_width: u32,
    /// Height of each shot; always even.
    pub shot_height: u32,
    /// Canvas width.
    pub canvas_width: u32,
    /// Canvas height, without any caption band.
    pub canvas_height: u32,
    /// Time between shots in time-base units; `0` signals a failed plan.
    pub step: i64,
    /// Horizontal offset that centers the grid when the width does not
    /// divide evenly.
    pub center_gap: u32,
    /// Gap between shots.
    pub gap: u32,
    /// Time base of `step`.
    pub time_base: Rational,
}

impl Layout {
    fn failed(request: &LayoutRequest) -> Self {
        Self {
            columns: 0,
            rows: 0,
            shot_width: 0,
            shot_height: 0,
            canvas_width: 0,
            canvas_height: 0,
            step: 0,
            center_gap: 0,
            gap: request.gap,
            time_base: request.time_base,
        }
    }

    /// Number of grid cells.
    pub fn shot_count(&self) -> u32 {
        self.columns * self.rows
    }

    /// Step in seconds.
    pub fn step_seconds(&self) -> f64 {
        self.step as f64 * time_base_seconds(self.time_base)
    }

    /// Top-left pixel of the cell at `index`, below a caption band of
    /// `header_height` pixels.
    pub fn shot_position(&self, index: u32, header_height: u32) -> (u32, u32) {
        let column = index % self.columns.max(1);
        let row = index / self.columns.max(1);
        let x = column * (self.shot_width + self.gap) + self.gap + self.center_gap;
        let y = row * (self.shot_height + self.gap) + self.gap + header_height;
        (x, y)
    }
}

/// Compute the geometry for a fixed column count.
///
/// `rows` may be `0` to derive the row count from the requested step.
pub fn calculate(request: &LayoutRequest, columns: u32, rows: u32) -> Layout {
    if columns == 0 || request.source_width == 0 {
        return Layout::failed(request);
    }

    let tick = time_base_seconds(request.time_base);
    let duration_ticks = if tick > 0.0 {
        request.duration_seconds / tick
    } else {
        0.0
    };
    let columns_f = columns as f64;

    let mut step = if request.step_seconds > 0.0 && tick > 0.0 {
        (request.step_seconds / tick) as i64
    } else {
        (duration_ticks / (columns_f * rows as f64 + 1.0)) as i64
    };

    let rows = if rows > 0 {
        rows
    } else if step > 0 {
        (request.duration_seconds / columns_f / (step as f64 * tick) + 0.5).floor() as u32
    } else {
        0
    }
    .max(1);

    // Last row full.
    step = (duration_ticks / (columns_f * rows as f64 + 1.0)) as i64;

    let gap = request.gap as i64;
    let columns_i = columns as i64;
    let full_width = columns_i * (request.source_width as i64 + gap) + gap;
    let canvas_width = if request.width > 0 && (request.width as i64) < full_width {
        request.width as i64
    } else {
        full_width
    };

    let usable_width = (canvas_width - gap * (columns_i + 1)).max(0);
    let mut shot_width = usable_width / columns_i;
    shot_width -= shot_width % 2;
    let mut shot_height = (request.source_height as f64 / request.source_width as f64
        * shot_width as f64
        + 0.5)
        .floor() as i64;
    shot_height -= shot_height % 2;
    let center_gap = (usable_width - shot_width * columns_i) / 2;
    let canvas_height = shot_height * rows as i64 + gap * (rows as i64 + 1);

    Layout {
        columns,
        rows,
        shot_width: shot_width as u32,
        shot_height: shot_height as u32,
        canvas_width: canvas_width as u32,
        canvas_height: canvas_height as u32,
        step,
        center_gap: center_gap as u32,
        gap: request.gap,
        time_base: request.time_base,
    }
}

/// Drop columns until shots reach the minimum height, then drop rows if the
/// source is too short for the grid.
///
/// A returned layout with zero columns or zero step means the job cannot be
/// built; [`plan`] turns those into errors.
pub fn reduce_to_fit(request: &LayoutRequest) -> Layout {
    if request.columns == 0 {
        return Layout::failed(request);
    }
    let even_source_width = request.source_width - request.source_width % 2;
    let mut columns = request.columns;
    let mut layout = calculate(request, columns, request.rows);

    while layout.shot_height < request.min_shot_height && layout.shot_width < even_source_width {
        columns -= 1;
        if columns == 0 {
            log::debug!("no column count satisfies min height {}", request.min_shot_height);
            return Layout::failed(request);
        }
        layout = calculate(request, columns, request.rows);
    }

    if columns < request.columns {
        log::debug!(
            "reduced columns from {} to {} to keep shots at least {}px high",
            request.columns,
            columns,
            request.min_shot_height
        );
    }

    if layout.step <= 0 && layout.columns > 0 && layout.rows > 1 {
        let reduced_rows = (((request.duration_seconds - 1.0) / layout.columns as f64).floor()
            as i64)
            .max(1) as u32;
        log::info!("movie is too short, reducing number of rows to {reduced_rows}");
        layout = calculate(request, layout.columns, reduced_rows);
    }

    layout
}

/// Plan a layout, failing with a diagnostic when none is possible.
///
/// On success every shot is at least 2x2 pixels.
pub fn plan(request: &LayoutRequest) -> Result<Layout, ShotgridError> {
    if request.duration_seconds <= 0.0 {
        return Err(ShotgridError::InvalidDuration {
            duration_seconds: request.duration_seconds,
        });
    }
    if request.columns == 0 {
        return Err(ShotgridError::InvalidOption(
            "columns must be at least 1".to_string(),
        ));
    }

    let layout = reduce_to_fit(request);

    if layout.columns == 0 || layout.shot_width == 0 || layout.shot_height == 0 {
        let (suggested_width, suggested_min_height) = suggest_fit(request);
        return Err(ShotgridError::LayoutTooSmall {
            min_height: request.min_shot_height,
            suggested_width,
            suggested_min_height,
        });
    }
    if layout.step <= 0 {
        return Err(ShotgridError::ClipTooShort {
            duration_seconds: request.duration_seconds,
        });
    }

    log::debug!(
        "layout {}x{} shots of {}x{} on {}x{}, step {:.2}s",
        layout.columns,
        layout.rows,
        layout.shot_width,
        layout.shot_height,
        layout.canvas_width,
        layout.canvas_height,
        layout.step_seconds()
    );
    Ok(layout)
}

/// A canvas width that fits one shot at the minimum height, and the tallest
/// minimum height the configured width can satisfy. Both even.
fn suggest_fit(request: &LayoutRequest) -> (u32, u32) {
    let aspect = request.source_width as f64 / request.source_height.max(1) as f64;
    let gap = request.gap as f64;

    let min_height = request.min_shot_height.max(2) as f64;
    let mut width = (min_height * aspect + 2.0 * gap).ceil() as u32;
    width += width % 2;

    let usable = (request.width as f64 - 2.0 * gap).max(0.0);
    let mut height = (usable / aspect).floor() as u32;
    height -= height % 2;

    (width, height)
}

/// Distance between evasion retries, in time-base units.
///
/// At most ten seconds and at most a fourteenth of the step. Returns `0`
/// (evasion off) when that would be a second or less.
pub fn evasion_step(step: i64, time_base: Rational) -> i64 {
    let tick = time_base_seconds(time_base);
    if tick <= 0.0 {
        return 0;
    }
    let evade = ((10.0 / tick) as i64).min(step / 14);
    if evade as f64 * tick <= 1.0 {
        return 0;
    }
    evade
}
