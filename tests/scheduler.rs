//! Sampling scheduler tests against a scripted frame source.

mod common;

use common::{ScriptedSource, TIME_BASE};
use shotgrid::layout::{Layout, LayoutRequest, plan};
use shotgrid::scheduler::sequential_cost_per_shot;
use shotgrid::{
    FrameSource, IndividualShots, SamplingOutcome, SamplingScheduler, SamplingStatistics, SeekMode, SeekPolicy,
    SheetOptions, Shot, ShotSink, ShotgridError,
};

/// 255 seconds on a 4x4 grid: one shot every 15 seconds.
const DURATION: f64 = 255.0;
const STEP: i64 = 15_000;

fn layout() -> Layout {
    plan(&LayoutRequest {
        source_width: 320,
        source_height: 240,
        columns: 4,
        rows: 4,
        step_seconds: 0.0,
        width: 0,
        min_shot_height: 0,
        gap: 0,
        duration_seconds: DURATION,
        time_base: TIME_BASE,
    })
    .expect("plan")
}

fn source() -> ScriptedSource {
    ScriptedSource::new(DURATION, 255_000, 100)
}

#[derive(Default)]
struct RecordingSink {
    shots: Vec<Shot>,
    resets: u32,
}

impl ShotSink for RecordingSink {
    fn accept(&mut self, shot: Shot) -> Result<(), ShotgridError> {
        self.shots.push(shot);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ShotgridError> {
        self.shots.clear();
        self.resets += 1;
        Ok(())
    }
}

fn run(
    source: &mut ScriptedSource,
    options: &SheetOptions,
) -> (SamplingOutcome, RecordingSink, SamplingStatistics) {
    let layout = layout();
    let scheduler = SamplingScheduler::new(&layout, options, source.metadata());
    let mut sink = RecordingSink::default();
    let mut statistics = SamplingStatistics::default();
    let outcome = scheduler
        .run(source, &mut sink, &mut statistics)
        .expect("sampling");
    (outcome, sink, statistics)
}

fn assert_ordered(shots: &[Shot]) {
    for (position, shot) in shots.iter().enumerate() {
        assert_eq!(shot.index as usize, position);
        assert_eq!((shot.image.width(), shot.image.height()), (320, 240));
    }
    for pair in shots.windows(2) {
        assert!(
            pair[0].timestamp < pair[1].timestamp,
            "{} >= {}",
            pair[0].timestamp,
            pair[1].timestamp
        );
    }
}

// ── Seeking ────────────────────────────────────────────────────────

#[test]
fn accurate_seeking_fills_the_grid() {
    let layout = layout();
    assert_eq!(layout.step, STEP);

    let mut source = source();
    let (outcome, sink, statistics) = run(&mut source, &SheetOptions::new());

    assert!(!outcome.is_partial());
    assert!(!outcome.end_of_stream);
    assert_eq!(outcome.final_mode, SeekMode::Seeking);
    assert_eq!(sink.shots.len(), 16);
    assert_ordered(&sink.shots);

    let expected: Vec<i64> = (1..=16).map(|k| k * STEP).collect();
    assert_eq!(source.seeks, expected);
    let timestamps: Vec<i64> = sink.shots.iter().map(|shot| shot.timestamp).collect();
    assert_eq!(timestamps, expected);
    assert!((sink.shots[0].seconds - 15.0).abs() < 1e-9);
    assert_eq!(statistics.restarts, 0);
    assert_eq!(statistics.skipped(), 0);
    assert_eq!(statistics.accepted, 16);
}

#[test]
fn never_seek_decodes_sequentially() {
    let mut source = source();
    let options = SheetOptions::new().with_seek_policy(SeekPolicy::NeverSeek);
    let (outcome, sink, statistics) = run(&mut source, &options);

    assert!(source.seeks.is_empty());
    assert_eq!(outcome.final_mode, SeekMode::Sequential);
    assert_eq!(sink.shots.len(), 16);
    assert_ordered(&sink.shots);
    assert_eq!(sink.shots[15].timestamp, 16 * STEP);
    assert_eq!(statistics.frames_decoded, (16 * STEP / 100 + 1) as u64);
}

// ── Restarts ───────────────────────────────────────────────────────

#[test]
fn inaccurate_early_seek_restarts_sequentially() {
    // The third target lands 20s late, more than a step off.
    let mut source =
        source().with_landing(|target| if target == 3 * STEP { 20_000 } else { 0 });
    let (outcome, sink, statistics) = run(&mut source, &SheetOptions::new());

    assert_eq!(statistics.restarts, 1);
    assert_eq!(source.rewinds, 1);
    assert_eq!(sink.resets, 1);
    assert_eq!(source.seeks.len(), 3);
    assert_eq!(outcome.final_mode, SeekMode::Sequential);
    assert!(!outcome.is_partial());
    assert_ordered(&sink.shots);
    assert_eq!(sink.shots[2].timestamp, 3 * STEP);
}

#[test]
fn overshoot_restarts_in_auto_mode() {
    let mut source =
        source().with_landing(|target| if target == 7 * STEP { 16_000 } else { 0 });
    let (outcome, sink, statistics) = run(&mut source, &SheetOptions::new());

    assert_eq!(statistics.restarts, 1);
    assert_eq!(outcome.final_mode, SeekMode::Sequential);
    assert_eq!(sink.shots.len(), 16);
    assert_ordered(&sink.shots);
}

#[test]
fn overshoot_costs_a_cell_when_always_seeking() {
    let mut source =
        source().with_landing(|target| if target == 7 * STEP { 16_000 } else { 0 });
    let options = SheetOptions::new().with_seek_policy(SeekPolicy::AlwaysSeek);
    let (outcome, sink, statistics) = run(&mut source, &options);

    assert_eq!(statistics.restarts, 0);
    assert_eq!(statistics.overshoot_skips, 1);
    assert_eq!(outcome.final_mode, SeekMode::Seeking);
    assert_eq!(outcome.shots_taken, 15);
    assert!(outcome.is_partial());
    assert!(!outcome.end_of_stream);
    assert_ordered(&sink.shots);
    assert_eq!(sink.shots[6].timestamp, 7 * STEP + 16_000);
    assert_eq!(sink.shots[7].timestamp, 9 * STEP);
}

// ── Duplicates and evasion ─────────────────────────────────────────

#[test]
fn repeated_picture_is_skipped() {
    // The seventh seek falls back onto the sixth shot.
    let mut source =
        source().with_landing(|target| if target == 7 * STEP { -STEP } else { 0 });
    let (outcome, sink, statistics) = run(&mut source, &SheetOptions::new());

    assert_eq!(statistics.duplicate_skips, 1);
    assert_eq!(statistics.restarts, 0);
    assert_eq!(outcome.shots_taken, 15);
    assert_ordered(&sink.shots);
    assert_eq!(sink.shots[6].timestamp, 8 * STEP);
}

#[test]
fn blank_picture_is_evaded() {
    let mut source = source().with_blank(45_000..47_000);
    let (outcome, sink, statistics) = run(&mut source, &SheetOptions::new());

    assert_eq!(statistics.evasions, 2);
    assert_eq!(statistics.skipped(), 0);
    assert!(!outcome.is_partial());
    assert_ordered(&sink.shots);
    assert_eq!(sink.shots[2].timestamp, 47_200);
    assert_eq!(sink.shots[3].timestamp, 4 * STEP);
}

#[test]
fn blank_step_is_given_up_on() {
    let mut source = source().with_blank(45_000..59_500);
    let (outcome, sink, statistics) = run(&mut source, &SheetOptions::new());

    assert_eq!(statistics.evasion_skips, 1);
    assert_eq!(statistics.evasions, 14);
    assert_eq!(outcome.shots_taken, 15);
    assert_ordered(&sink.shots);
    assert_eq!(sink.shots[2].timestamp, 4 * STEP);
}

#[test]
fn earlier_landing_while_evading_is_retried() {
    // The first retry of the blank third cell falls back before shot two.
    let mut source = source()
        .with_blank(45_000..45_500)
        .with_landing(|target| if target == 46_071 { -16_500 } else { 0 });
    let options = SheetOptions::new().with_seek_policy(SeekPolicy::AlwaysSeek);
    let (outcome, sink, statistics) = run(&mut source, &options);

    assert_eq!(statistics.evasions, 2);
    assert_eq!(statistics.duplicate_skips, 0);
    assert_eq!(statistics.skipped(), 0);
    assert_eq!(outcome.shots_taken, 16);
    assert_ordered(&sink.shots);
    assert_eq!(sink.shots[2].timestamp, 47_200);
}

#[test]
fn evasion_off_keeps_blank_pictures() {
    let mut source = source().with_blank(0..255_001);
    let options = SheetOptions::new().with_blank_threshold(1.0);
    let (outcome, sink, statistics) = run(&mut source, &options);

    assert_eq!(statistics.evasions, 0);
    assert!(!outcome.is_partial());
    assert_eq!(sink.shots.len(), 16);
}

#[test]
fn display_size_picture_is_captured_on_request() {
    let mut source = source();
    let (_, sink, _) = run(&mut source, &SheetOptions::new());
    assert!(sink.shots.iter().all(|shot| shot.original.is_none()));

    let mut source = source();
    let kinds: IndividualShots = "o".parse().expect("letters");
    let options = SheetOptions::new().with_individual(kinds);
    let (_, sink, _) = run(&mut source, &options);
    assert_eq!(sink.shots.len(), 16);
    for shot in &sink.shots {
        let original = shot.original.as_ref().expect("display-size picture");
        assert_eq!((original.width(), original.height()), (320, 240));
    }
}

// ── End of stream ──────────────────────────────────────────────────

#[test]
fn stream_ending_early_is_partial() {
    let mut source = ScriptedSource::new(DURATION, 150_000, 100);
    let (outcome, sink, _) = run(&mut source, &SheetOptions::new());

    assert!(outcome.end_of_stream);
    assert!(outcome.is_partial());
    assert_eq!(outcome.shots_planned, 16);
    assert_eq!(outcome.shots_taken, 10);
    assert_ordered(&sink.shots);
}

#[test]
fn sequential_cost_scales_with_resolution() {
    assert!((sequential_cost_per_shot(15.0, 320) - 0.9).abs() < 1e-9);
    assert!((sequential_cost_per_shot(15.0, 640) - 5.625).abs() < 1e-9);
    assert!((sequential_cost_per_shot(15.0, 1920) - 15.0).abs() < 1e-9);
}

// ── Adversarial timestamps ─────────────────────────────────────────

#[test]
fn erratic_sources_keep_the_grid_consistent() {
    let landings: [fn(i64) -> i64; 8] = [
        |_| 0,
        |target| if target % (3 * STEP) == 0 { -STEP } else { 0 },
        |target| if target == 5 * STEP { 2 * STEP + 500 } else { 0 },
        |target| -(target % 7_000),
        |target| (target * 7_919) % 9_000 - 4_500,
        |target| if target > 100_000 { 40_000 } else { 0 },
        |_| -2 * STEP,
        |target| if (target / 1_071) % 2 == 0 { -20_000 } else { 1_500 },
    ];
    let blanks: [&[std::ops::Range<i64>]; 5] = [
        &[],
        &[45_000..47_000],
        &[45_000..59_500],
        &[100_000..140_000],
        &[14_000..16_500, 60_000..61_000, 170_000..200_000],
    ];
    let policies = [SeekPolicy::Auto, SeekPolicy::AlwaysSeek, SeekPolicy::NeverSeek];

    for (landing_case, landing) in landings.iter().enumerate() {
        for (blank_case, blank) in blanks.iter().enumerate() {
            for policy in policies {
                let mut source = source().with_landing(*landing);
                for range in blank.iter() {
                    source = source.with_blank(range.clone());
                }
                let options = SheetOptions::new().with_seek_policy(policy);
                let (outcome, sink, statistics) = run(&mut source, &options);
                let case = format!("landing {landing_case}, blanks {blank_case}, {policy:?}");

                assert!(outcome.shots_taken <= 16, "{case}");
                assert_eq!(sink.shots.len() as u32, outcome.shots_taken, "{case}");
                assert_eq!(statistics.accepted, outcome.shots_taken, "{case}");
                if !outcome.end_of_stream {
                    assert_eq!(
                        outcome.shots_taken + statistics.skipped(),
                        outcome.shots_planned,
                        "{case}"
                    );
                }
                assert_ordered(&sink.shots);
            }
        }
    }
}
