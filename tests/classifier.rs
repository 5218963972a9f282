//! Blank and edge classification tests.

use image::{Rgb, RgbImage};
use shotgrid::FrameClassifier;
use shotgrid::classifier::{EDGE_REGIONS, blank_ratio, edge_regions, edge_scores};

fn stripes(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if (x / 4) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Grey, except for striped rows that miss the blank bands but cross two
/// edge regions.
fn banded_detail() -> RgbImage {
    RgbImage::from_fn(256, 144, |x, y| {
        let striped = (42..52).contains(&y) || (84..97).contains(&y);
        match (striped, (x / 4) % 2 == 0) {
            (false, _) => Rgb([128, 128, 128]),
            (true, true) => Rgb([255, 255, 255]),
            (true, false) => Rgb([0, 0, 0]),
        }
    })
}

fn solid(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

// ── Blank ratio ────────────────────────────────────────────────────

#[test]
fn uniform_frame_is_fully_blank() {
    assert!((blank_ratio(&solid(256, 144, 0)) - 1.0).abs() < f64::EPSILON);
    assert!((blank_ratio(&solid(256, 144, 200)) - 1.0).abs() < f64::EPSILON);
}

#[test]
fn vertical_gradient_is_not_blank() {
    let image = RgbImage::from_fn(256, 144, |_, y| {
        let value = (y * 255 / 143) as u8;
        Rgb([value, value, value])
    });
    assert!(blank_ratio(&image) < 0.8);
}

#[test]
fn frames_shorter_than_eleven_rows_score_zero() {
    assert_eq!(blank_ratio(&solid(64, 10, 0)), 0.0);
}

// ── Edges ──────────────────────────────────────────────────────────

#[test]
fn flat_frame_has_no_edges() {
    let scores = edge_scores(&solid(256, 144, 90), 12);
    assert!(scores.iter().all(|score| *score == 0.0));
}

#[test]
fn stripes_light_up_every_region() {
    let scores = edge_scores(&stripes(256, 144), 12);
    assert_eq!(scores.len(), EDGE_REGIONS);
    assert!(scores.iter().all(|score| *score > 0.01), "{scores:?}");
}

#[test]
fn regions_stay_inside_the_frame() {
    for (width, height) in [(256, 144), (2, 2), (17, 31), (1920, 1080)] {
        for (x0, y0, x1, y1) in edge_regions(width, height) {
            assert!(x0 <= x1 || width < 4, "{width}x{height}");
            assert!(x1 < width && y1 < height, "{width}x{height}");
            assert!(y0 <= y1, "{width}x{height}");
        }
    }
}

// ── Accept / reject ────────────────────────────────────────────────

#[test]
fn blank_and_edgeless_is_rejected() {
    let classifier = FrameClassifier::new(0.8, 12);
    let result = classifier.classify(&solid(256, 144, 0));
    assert!(!result.has_edges());
    assert!(classifier.is_rejected(&result));
}

#[test]
fn blank_but_detailed_is_kept() {
    let classifier = FrameClassifier::new(0.8, 12);
    let result = classifier.classify(&banded_detail());
    assert!(result.blank_ratio > 0.8);
    assert!(result.has_edges());
    assert!(!classifier.is_rejected(&result));
}

#[test]
fn disabled_edge_detection_leaves_blankness_alone() {
    let classifier = FrameClassifier::new(0.8, 0);
    let result = classifier.classify(&banded_detail());
    assert_eq!(result.edge_regions(), 0);
    assert!(classifier.is_rejected(&result));
}

#[test]
fn extreme_threshold_rejects_detailed_frames_too() {
    let image = stripes(256, 144);
    let relaxed = FrameClassifier::new(0.8, 12).classify(&image);
    assert!(relaxed.has_edges());
    assert!(relaxed.blank_ratio > 0.2);
    assert!(!FrameClassifier::new(0.8, 12).is_rejected(&relaxed));

    let extreme = FrameClassifier::new(0.2, 12);
    assert!(extreme.is_rejected(&extreme.classify(&image)));
}

#[test]
fn threshold_of_one_disables_rejection() {
    let classifier = FrameClassifier::new(1.0, 12);
    assert!(!classifier.evasion_enabled());
    let result = classifier.classify(&solid(256, 144, 0));
    assert!(!classifier.is_rejected(&result));
}
