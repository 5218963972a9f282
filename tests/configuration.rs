//! SheetOptions builder and validation tests.

use image::Rgb;
use shotgrid::{Corner, IndividualShots, SeekPolicy, SheetOptions, ShotgridError, TextStyle};

// ── Defaults ───────────────────────────────────────────────────────

#[test]
fn defaults_describe_a_four_by_four_sheet() {
    let options = SheetOptions::new();
    assert_eq!((options.columns, options.rows), (4, 4));
    assert_eq!(options.width, 1024);
    assert_eq!(options.min_shot_height, 150);
    assert_eq!(options.gap, 0);
    assert_eq!(options.seek_policy, SeekPolicy::Auto);
    assert_eq!(options.suffix, "_s.jpg");
    assert_eq!(options.jpeg_quality, 90);
    assert!(options.overwrite);
    assert!(!options.sprite);
    assert!(options.validate().is_ok());

    let timestamps = options.timestamp_style.expect("timestamps on by default");
    assert_eq!(timestamps.corner, Corner::LowerLeft);
    assert_eq!(timestamps.shadow, Some(Rgb([0, 0, 0])));
    let info = options.info_style.expect("info on by default");
    assert_eq!(info.corner, Corner::UpperLeft);
}

#[test]
fn debug_output_hides_the_callback() {
    let debug = format!("{:?}", SheetOptions::new());
    assert!(debug.contains("SheetOptions"));
    assert!(debug.contains("columns: 4"));
    assert!(debug.ends_with(".. }"));
}

// ── Builders ───────────────────────────────────────────────────────

#[test]
fn builders_set_fields() {
    let style = TextStyle {
        color: Rgb([1, 2, 3]),
        size: 12.0,
        corner: Corner::UpperRight,
        shadow: None,
    };
    let options = SheetOptions::new()
        .with_grid(3, 0)
        .with_step(45.0)
        .with_trim(5.0, 10.0)
        .with_cut(60.0)
        .with_timestamps(None)
        .with_info(Some(style))
        .with_info_text("hello")
        .with_shadow(0)
        .with_sprite("/vtt/")
        .with_info_file(".txt")
        .with_overwrite(false);

    assert_eq!((options.columns, options.rows), (3, 0));
    assert_eq!(options.step_seconds, 45.0);
    assert_eq!((options.skip_begin, options.skip_end), (5.0, 10.0));
    assert_eq!(options.cut, Some(60.0));
    assert!(options.timestamp_style.is_none());
    assert_eq!(options.info_style, Some(style));
    assert_eq!(options.info_text.as_deref(), Some("hello"));
    assert_eq!(options.shadow_radius, Some(0));
    assert!(options.sprite);
    assert_eq!(options.sprite_prefix, "/vtt/");
    assert_eq!(options.info_suffix.as_deref(), Some(".txt"));
    assert!(!options.overwrite);
}

#[test]
fn corner_codes() {
    assert_eq!(Corner::from_code(1), Some(Corner::LowerLeft));
    assert_eq!(Corner::from_code(2), Some(Corner::LowerRight));
    assert_eq!(Corner::from_code(3), Some(Corner::UpperRight));
    assert_eq!(Corner::from_code(4), Some(Corner::UpperLeft));
    assert_eq!(Corner::from_code(0), None);
    assert!(Corner::UpperRight.is_upper() && Corner::UpperRight.is_right());
    assert!(!Corner::LowerLeft.is_upper() && !Corner::LowerLeft.is_right());
}

// ── Validation ─────────────────────────────────────────────────────

fn rejected(options: SheetOptions) -> bool {
    matches!(options.validate(), Err(ShotgridError::InvalidOption(_)))
}

#[test]
fn invalid_combinations_are_rejected() {
    assert!(rejected(SheetOptions::new().with_grid(0, 4)));
    assert!(rejected(SheetOptions::new().with_jpeg_quality(0)));
    assert!(rejected(SheetOptions::new().with_jpeg_quality(101)));
    assert!(rejected(SheetOptions::new().with_trim(-1.0, 0.0)));
    assert!(rejected(SheetOptions::new().with_cut(0.0)));
    assert!(rejected(SheetOptions::new().with_suffix("_s.gif")));
    assert!(rejected(SheetOptions::new().with_suffix("_sheet")));
    assert!(rejected(SheetOptions::new().with_transparent_background(true)));
    let sheetless = IndividualShots {
        ignore_grid: true,
        ..IndividualShots::default()
    };
    assert!(rejected(SheetOptions::new().with_individual(sheetless)));
}

#[test]
fn output_format_follows_suffix() {
    assert!(SheetOptions::new().is_jpeg_output());
    assert!(SheetOptions::new().with_suffix(".JPEG").is_jpeg_output());
    let png = SheetOptions::new()
        .with_suffix("_s.png")
        .with_transparent_background(true);
    assert!(!png.is_jpeg_output());
    assert!(png.validate().is_ok());
}

// ── Individual shots ───────────────────────────────────────────────

#[test]
fn individual_letters_parse_in_any_case() {
    let kinds: IndividualShots = "tO".parse().expect("parse");
    assert!(kinds.thumbnail && kinds.original && !kinds.ignore_grid);
    assert!(kinds.writes_files());

    let only_originals: IndividualShots = " oi ".parse().expect("parse");
    assert!(!only_originals.thumbnail && only_originals.original && only_originals.ignore_grid);

    assert!(matches!("tx".parse::<IndividualShots>(), Err(ShotgridError::InvalidOption(_))));
    assert!(matches!("".parse::<IndividualShots>(), Err(ShotgridError::InvalidOption(_))));
}

#[test]
fn individual_shots_are_off_by_default() {
    let options = SheetOptions::new();
    assert_eq!(options.individual, IndividualShots::default());
    assert!(!options.individual.writes_files());

    let kinds = IndividualShots {
        thumbnail: true,
        ignore_grid: true,
        ..IndividualShots::default()
    };
    let options = options.with_individual(kinds);
    assert_eq!(options.individual, kinds);
    assert!(options.validate().is_ok());
}
