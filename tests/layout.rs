//! Layout planning tests.

use ffmpeg_next::Rational;
use shotgrid::ShotgridError;
use shotgrid::layout::{LayoutRequest, evasion_step, plan};

fn request(source: (u32, u32), grid: (u32, u32), width: u32, duration_seconds: f64) -> LayoutRequest {
    LayoutRequest {
        source_width: source.0,
        source_height: source.1,
        columns: grid.0,
        rows: grid.1,
        step_seconds: 0.0,
        width,
        min_shot_height: 0,
        gap: 0,
        duration_seconds,
        time_base: Rational::new(1, 1000),
    }
}

// ── Fixed grids ────────────────────────────────────────────────────

#[test]
fn ten_minutes_on_four_by_four() {
    let layout = plan(&request((1920, 1080), (4, 4), 1024, 600.0)).expect("plan");

    assert_eq!(layout.shot_count(), 16);
    assert_eq!((layout.shot_width, layout.shot_height), (256, 144));
    assert_eq!((layout.canvas_width, layout.canvas_height), (1024, 576));
    assert_eq!(layout.step, 600_000 / 17);
    assert!((layout.step_seconds() - 35.294).abs() < 0.001);
}

#[test]
fn natural_width_with_gaps() {
    let mut request = request((320, 240), (3, 2), 0, 120.0);
    request.gap = 5;
    let layout = plan(&request).expect("plan");

    assert_eq!(layout.canvas_width, 3 * (320 + 5) + 5);
    assert_eq!((layout.shot_width, layout.shot_height), (320, 240));
    assert_eq!(layout.canvas_height, 2 * 240 + 3 * 5);
    assert_eq!(layout.center_gap, 0);
}

#[test]
fn wider_target_than_natural_width_is_capped() {
    let layout = plan(&request((320, 240), (2, 2), 4000, 60.0)).expect("plan");
    assert_eq!(layout.canvas_width, 640);
    assert_eq!(layout.shot_width, 320);
}

#[test]
fn shot_sizes_are_even() {
    for (width, height) in [(1920, 1080), (1279, 719), (853, 480), (333, 177), (1080, 1920)] {
        for canvas in [0, 777, 1024, 1500] {
            let layout = plan(&request((width, height), (5, 3), canvas, 300.0)).expect("plan");
            assert_eq!(layout.shot_width % 2, 0, "{width}x{height} on {canvas}");
            assert_eq!(layout.shot_height % 2, 0, "{width}x{height} on {canvas}");
            assert!(layout.canvas_width >= layout.columns * layout.shot_width);
        }
    }
}

#[test]
fn shot_positions_account_for_gap_and_header() {
    let mut request = request((320, 240), (3, 2), 0, 120.0);
    request.gap = 5;
    let layout = plan(&request).expect("plan");

    assert_eq!(layout.shot_position(0, 0), (5, 5));
    assert_eq!(layout.shot_position(4, 20), (325 + 5, 245 + 5 + 20));
}

// ── Column and row reduction ───────────────────────────────────────

#[test]
fn columns_drop_until_minimum_height() {
    let mut request = request((1920, 1080), (4, 4), 1024, 600.0);
    request.min_shot_height = 150;
    let layout = plan(&request).expect("plan");

    assert_eq!(layout.columns, 3);
    assert_eq!((layout.shot_width, layout.shot_height), (340, 190));
    assert_eq!(layout.center_gap, 2);
}

#[test]
fn impossible_minimum_height_suggests_a_fit() {
    let mut request = request((1920, 1080), (1, 1), 200, 600.0);
    request.min_shot_height = 500;

    match plan(&request) {
        Err(ShotgridError::LayoutTooSmall {
            min_height,
            suggested_width,
            suggested_min_height,
        }) => {
            assert_eq!(min_height, 500);
            assert_eq!(suggested_width, 890);
            assert_eq!(suggested_min_height, 112);
        }
        other => panic!("expected LayoutTooSmall, got {other:?}"),
    }
}

#[test]
fn width_narrower_than_the_grid_is_too_small() {
    // 6px across four columns leaves no room for an even shot width.
    let result = plan(&request((1920, 1080), (4, 4), 6, 600.0));
    assert!(
        matches!(result, Err(ShotgridError::LayoutTooSmall { suggested_width: 4, .. })),
        "{result:?}"
    );
}

#[test]
fn extremely_wide_source_rounds_shots_to_nothing() {
    let result = plan(&request((4000, 2), (4, 4), 1024, 600.0));
    match result {
        Err(ShotgridError::LayoutTooSmall {
            suggested_width,
            suggested_min_height,
            ..
        }) => {
            assert_eq!(suggested_width, 4000);
            assert_eq!(suggested_min_height, 0);
        }
        other => panic!("expected LayoutTooSmall, got {other:?}"),
    }
}

#[test]
fn short_clip_keeps_the_grid_within_its_duration() {
    let mut request = request((320, 240), (4, 4), 0, 20.0);
    request.time_base = Rational::new(1, 1);
    let layout = plan(&request).expect("plan");

    assert!(layout.step > 0);
    assert!(i64::from(layout.rows * layout.columns) * layout.step <= 20);
}

#[test]
fn too_short_for_the_rows_reduces_them() {
    let mut request = request((320, 240), (4, 4), 0, 10.0);
    request.time_base = Rational::new(1, 1);
    let layout = plan(&request).expect("plan");

    assert_eq!(layout.rows, 2);
    assert_eq!(layout.step, 1);
}

#[test]
fn far_too_short_clip_is_an_error() {
    let mut request = request((320, 240), (4, 4), 0, 3.0);
    request.time_base = Rational::new(1, 1);
    assert!(matches!(plan(&request), Err(ShotgridError::ClipTooShort { .. })));
}

#[test]
fn zero_duration_is_rejected() {
    let request = request((320, 240), (4, 4), 0, 0.0);
    assert!(matches!(plan(&request), Err(ShotgridError::InvalidDuration { .. })));
}

// ── Step-driven rows ───────────────────────────────────────────────

#[test]
fn rows_follow_requested_step() {
    let mut request = request((320, 240), (5, 0), 0, 600.0);
    request.step_seconds = 30.0;
    let layout = plan(&request).expect("plan");

    assert_eq!(layout.rows, 4);
    // The step is re-derived so the last row ends before the clip does.
    assert_eq!(layout.step, 600_000 / 21);
}

#[test]
fn evasion_step_is_bounded() {
    let time_base = Rational::new(1, 1000);
    assert_eq!(evasion_step(35_294, time_base), 35_294 / 14);
    assert_eq!(evasion_step(600_000, time_base), 10_000);
    // Under a second between retries turns evasion off.
    assert_eq!(evasion_step(10_000, time_base), 0);
}
