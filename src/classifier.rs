//! Blank and featureless frame detection.
//!
//! A shot is uninformative when it is nearly uniform (fade to black, title
//! card background, white flash) and shows no detail. [`blank_ratio`]
//! measures uniformity by comparing three horizontal bands and the thirds
//! within each band; [`edge_scores`] runs a Laplacian high-pass filter over
//! six regions that avoid letterbox bars and centered logos.

use image::RgbImage;

/// Channels closer than this are considered equal.
const SAME_TOLERANCE: i16 = 20;

/// Fraction of bright filtered pixels above which a region has an edge.
pub const EDGE_FOUND: f32 = 0.001;

/// Number of regions examined by [`edge_scores`].
pub const EDGE_REGIONS: usize = 6;

/// Filtered channel value that counts as an edge pixel.
const EDGE_BRIGHT: f32 = 208.0;

/// Offset added after filtering so that flat areas land on mid-grey.
const EDGE_OFFSET: f32 = 128.0;

/// Regions that must contain an edge for the frame to count as detailed.
const EDGE_REGIONS_REQUIRED: usize = 2;

/// Thresholds at or below this reject on blankness alone.
const UNCONDITIONAL_THRESHOLD: f64 = 0.2;

/// Scores for one candidate frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    /// Uniformity in `[0, 1]`; `1` is a perfectly uniform frame.
    pub blank_ratio: f64,
    /// Fraction of edge pixels per region; all zero when edge detection
    /// is disabled.
    pub region_edge_scores: [f32; EDGE_REGIONS],
}

impl ClassificationResult {
    /// Number of regions whose score reaches [`EDGE_FOUND`].
    pub fn edge_regions(&self) -> usize {
        self.region_edge_scores
            .iter()
            .filter(|score| **score >= EDGE_FOUND)
            .count()
    }

    /// `true` when enough regions contain edges.
    pub fn has_edges(&self) -> bool {
        self.edge_regions() >= EDGE_REGIONS_REQUIRED
    }
}

/// Accept/reject policy for candidate shots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClassifier {
    blank_threshold: f64,
    edge_sensitivity: u32,
}

impl FrameClassifier {
    /// Create a classifier.
    ///
    /// A `blank_threshold >= 1` disables rejection. A threshold of `0.2` or
    /// less ignores edges, so almost every frame is rejected.
    pub fn new(blank_threshold: f64, edge_sensitivity: u32) -> Self {
        if blank_threshold <= UNCONDITIONAL_THRESHOLD {
            log::warn!(
                "blank threshold {blank_threshold:.2} is extreme; nearly every frame will be evaded"
            );
        }
        Self {
            blank_threshold,
            edge_sensitivity,
        }
    }

    /// `false` when the threshold makes rejection impossible.
    pub fn evasion_enabled(&self) -> bool {
        self.blank_threshold < 1.0
    }

    /// Score `image`.
    pub fn classify(&self, image: &RgbImage) -> ClassificationResult {
        let region_edge_scores = if self.edge_sensitivity > 0 {
            edge_scores(image, self.edge_sensitivity)
        } else {
            [0.0; EDGE_REGIONS]
        };
        ClassificationResult {
            blank_ratio: blank_ratio(image),
            region_edge_scores,
        }
    }

    /// A frame is rejected when it is both blank and edgeless, or merely
    /// blank under an extreme threshold.
    pub fn is_rejected(&self, result: &ClassificationResult) -> bool {
        self.evasion_enabled()
            && result.blank_ratio > self.blank_threshold
            && (self.blank_threshold <= UNCONDITIONAL_THRESHOLD || !result.has_edges())
    }
}

/// Fraction of positions where all three slices agree within tolerance.
fn agreement(a: &[u8], b: &[u8], c: &[u8]) -> f64 {
    let length = a.len().min(b.len()).min(c.len());
    if length == 0 {
        return 0.0;
    }
    let same = (0..length)
        .filter(|&index| {
            let (a, b, c) = (a[index] as i16, b[index] as i16, c[index] as i16);
            (a - b).abs() < SAME_TOLERANCE
                && (a - c).abs() < SAME_TOLERANCE
                && (b - c).abs() < SAME_TOLERANCE
        })
        .count();
    same as f64 / length as f64
}

/// Uniformity of `image` in `[0, 1]`.
///
/// Samples bands starting at 2/11, 5/11 and 8/11 of the height. The three
/// bands are compared with each other (weight 0.4), and each band's thirds
/// are compared with each other (weight 0.2 per band). Frames shorter than
/// eleven rows score `0`.
pub fn blank_ratio(image: &RgbImage) -> f64 {
    let raw = image.as_raw();
    let band = (image.height() as usize / 11) * image.width() as usize * 3;
    if band == 0 {
        return 0.0;
    }

    let band_at = |offset: usize| &raw[band * offset..band * (offset + 1)];
    let (a, b, c) = (band_at(2), band_at(5), band_at(8));

    let third = band / 3;
    let thirds_agree = |slice: &[u8]| {
        agreement(
            &slice[..third],
            &slice[third..third * 2],
            &slice[third * 2..third * 3],
        )
    };

    let horizontal = agreement(a, b, c);
    let vertical = thirds_agree(a) + thirds_agree(b) + thirds_agree(c);
    (2.0 * horizontal + vertical) / 5.0
}

/// Inclusive pixel rectangle `(x0, y0, x1, y1)`.
type Region = (u32, u32, u32, u32);

/// The six regions examined for edges: for each of three horizontal bands,
/// the left half of its upper slice and the right half of its lower slice,
/// with an eighth cropped at both sides.
pub fn edge_regions(width: u32, height: u32) -> [Region; EDGE_REGIONS] {
    let y_size = height / 10;
    let x_crop = width / 8;
    let half = width / 2;
    let right = width.saturating_sub(x_crop).min(width.saturating_sub(1));
    let bottom = height.saturating_sub(1);

    let band = |top: u32| -> [Region; 2] {
        [
            (x_crop, top, half, (top + y_size).min(bottom)),
            (
                (half + 1).min(right),
                (top + y_size).min(bottom),
                right,
                (top + 2 * y_size).min(bottom),
            ),
        ]
    };

    let [r0, r1] = band(2 * y_size);
    let [r2, r3] = band(4 * y_size);
    let [r4, r5] = band(6 * y_size);
    [r0, r1, r2, r3, r4, r5]
}

/// Per-region fraction of pixels that light up under a 3×3 Laplacian with
/// center weight `sensitivity` and orthogonal weights `-sensitivity / 4`.
pub fn edge_scores(image: &RgbImage, sensitivity: u32) -> [f32; EDGE_REGIONS] {
    let mut scores = [0.0; EDGE_REGIONS];
    if image.width() == 0 || image.height() == 0 {
        return scores;
    }

    let center = sensitivity as f32;
    let side = -center / 4.0;
    let max_x = image.width() as i64 - 1;
    let max_y = image.height() as i64 - 1;
    let sample =
        |x: i64, y: i64| *image.get_pixel(x.clamp(0, max_x) as u32, y.clamp(0, max_y) as u32);

    for (score, (x0, y0, x1, y1)) in scores
        .iter_mut()
        .zip(edge_regions(image.width(), image.height()))
    {
        if x1 < x0 || y1 < y0 {
            continue;
        }
        let mut bright = 0_u64;
        for y in y0 as i64..=y1 as i64 {
            for x in x0 as i64..=x1 as i64 {
                let lit = (0..3).all(|channel| {
                    let value = center * sample(x, y)[channel] as f32
                        + side
                            * (sample(x, y - 1)[channel] as f32
                                + sample(x - 1, y)[channel] as f32
                                + sample(x + 1, y)[channel] as f32
                                + sample(x, y + 1)[channel] as f32)
                        + EDGE_OFFSET;
                    value.clamp(0.0, 255.0) >= EDGE_BRIGHT
                });
                if lit {
                    bright += 1;
                }
            }
        }
        let area = (x1 - x0 + 1) as f32 * (y1 - y0 + 1) as f32;
        *score = bright as f32 / area;
    }
    scores
}
