//! Canvas composition and cropping tests.

use ffmpeg_next::Rational;
use image::{Rgb, RgbImage};
use shotgrid::composer::auto_shadow_radius;
use shotgrid::layout::{Layout, LayoutRequest, plan};
use shotgrid::{GridComposer, SheetOptions, ShotgridError};

fn layout(gap: u32) -> Layout {
    plan(&LayoutRequest {
        source_width: 320,
        source_height: 240,
        columns: 4,
        rows: 4,
        step_seconds: 0.0,
        width: 0,
        min_shot_height: 0,
        gap,
        duration_seconds: 255.0,
        time_base: Rational::new(1, 1000),
    })
    .expect("plan")
}

fn red() -> RgbImage {
    RgbImage::from_pixel(320, 240, Rgb([255, 0, 0]))
}

// ── Placement ──────────────────────────────────────────────────────

#[test]
fn canvas_matches_layout_plus_header() {
    let layout = layout(4);
    let composer = GridComposer::new(&layout, &SheetOptions::new(), 30).expect("composer");
    let image = composer.finalize(16).expect("finalize");

    assert_eq!(image.width(), 4 * 324 + 4);
    assert_eq!(image.height(), 4 * 244 + 4 + 30);
}

#[test]
fn shots_land_in_their_cells() {
    let layout = layout(4);
    let mut composer = GridComposer::new(&layout, &SheetOptions::new(), 30).expect("composer");

    let cell = composer.place(5, &red()).expect("place");
    assert_eq!((cell.x, cell.y), (324 + 4, 244 + 4 + 30));
    assert_eq!(composer.placed(), 1);

    let canvas = composer.canvas_mut();
    assert_eq!(canvas.get_pixel(cell.x + 10, cell.y + 10).0, [255, 0, 0, 255]);
    // White background elsewhere.
    assert_eq!(canvas.get_pixel(1, 1).0, [255, 255, 255, 255]);
}

#[test]
fn mismatched_shots_are_resized() {
    let layout = layout(0);
    let mut composer = GridComposer::new(&layout, &SheetOptions::new(), 0).expect("composer");
    let small = RgbImage::from_pixel(32, 24, Rgb([0, 0, 255]));

    let cell = composer.place(0, &small).expect("place");
    let [red, _, blue, _] = composer.canvas_mut().get_pixel(cell.width - 2, cell.height - 2).0;
    assert!(red < 5 && blue > 250);
}

#[test]
fn index_outside_the_grid_is_rejected() {
    let layout = layout(0);
    let mut composer = GridComposer::new(&layout, &SheetOptions::new(), 0).expect("composer");
    assert!(composer.place(16, &red()).is_err());
}

#[test]
fn reset_restores_the_background() {
    let layout = layout(0);
    let options = SheetOptions::new().with_background(Rgb([10, 20, 30]));
    let mut composer = GridComposer::new(&layout, &options, 0).expect("composer");
    composer.place(0, &red()).expect("place");
    composer.reset();

    assert_eq!(composer.placed(), 0);
    assert_eq!(composer.canvas_mut().get_pixel(5, 5).0, [10, 20, 30, 255]);
}

#[test]
fn transparent_background_has_zero_alpha() {
    let layout = layout(0);
    let options = SheetOptions::new()
        .with_suffix("_s.png")
        .with_transparent_background(true);
    let mut composer = GridComposer::new(&layout, &options, 0).expect("composer");
    assert_eq!(composer.canvas_mut().get_pixel(0, 0).0[3], 0);
}

// ── Shadows ────────────────────────────────────────────────────────

#[test]
fn automatic_shadow_radius() {
    assert_eq!(auto_shadow_radius(320, 240), 7);
    assert_eq!(auto_shadow_radius(64, 48), 3);
}

#[test]
fn shadow_darkens_below_and_right_of_a_shot() {
    let layout = layout(16);
    let options = SheetOptions::new().with_shadow(3);
    let mut composer = GridComposer::new(&layout, &options, 0).expect("composer");
    let cell = composer.place(0, &red()).expect("place");

    let canvas = composer.canvas_mut();
    let beside = canvas.get_pixel(cell.x + cell.width + 1, cell.y + cell.height / 2);
    let below = canvas.get_pixel(cell.x + cell.width / 2, cell.y + cell.height + 1);
    assert!(beside.0[0] < 200, "{beside:?}");
    assert!(below.0[0] < 200, "{below:?}");
    // Above and left of the shot stays clean.
    assert_eq!(canvas.get_pixel(cell.x - 1, cell.y + 20).0, [255, 255, 255, 255]);
}

// ── Cropping ───────────────────────────────────────────────────────

#[test]
fn missing_rows_are_cropped() {
    let layout = layout(4);
    let mut composer = GridComposer::new(&layout, &SheetOptions::new(), 0).expect("composer");
    for index in 0..10 {
        composer.place(index, &red()).expect("place");
    }
    let image = composer.finalize(10).expect("finalize");

    // ceil(10 / 4) = 3 rows remain.
    assert_eq!(image.height(), 3 * 244 + 4);
    assert_eq!(image.width(), 4 * 324 + 4);
}

#[test]
fn single_short_row_drops_unused_columns() {
    let layout = layout(4);
    let composer = GridComposer::new(&layout, &SheetOptions::new(), 0).expect("composer");
    let image = composer.finalize(3).expect("finalize");

    assert_eq!(image.height(), 244 + 4);
    assert_eq!(image.width(), 3 * 324 + 4);
}

#[test]
fn no_shots_is_an_error() {
    let layout = layout(0);
    let composer = GridComposer::new(&layout, &SheetOptions::new(), 0).expect("composer");
    assert!(matches!(composer.finalize(0), Err(ShotgridError::AllRowsSkipped)));
}

#[test]
fn oversized_jpeg_canvas_is_refused() {
    let layout = plan(&LayoutRequest {
        source_width: 32,
        source_height: 240,
        columns: 1,
        rows: 300,
        step_seconds: 0.0,
        width: 0,
        min_shot_height: 0,
        gap: 0,
        duration_seconds: 3600.0,
        time_base: Rational::new(1, 1000),
    })
    .expect("plan");

    let result = GridComposer::new(&layout, &SheetOptions::new(), 0);
    assert!(matches!(result, Err(ShotgridError::CanvasTooLarge { height: 72_000, .. })));
    assert!(GridComposer::new(&layout, &SheetOptions::new().with_suffix(".png"), 0).is_ok());
}
