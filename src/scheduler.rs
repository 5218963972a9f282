//! Shot sampling.
//!
//! [`SamplingScheduler`] walks the timeline in fixed steps and asks a
//! [`FrameSource`] for a picture near each target. Decoders are not
//! trustworthy here: seeks land on the wrong keyframe, some formats report
//! the same picture twice, and fades or title cards produce empty shots. The
//! scheduler compensates with a small state machine:
//!
//! * **Seeking** positions the decoder at each target and decodes one
//!   picture. If a seek overshoots the next target, or lands far off target
//!   early in the run, seeking is considered unreliable and the whole run
//!   restarts in **Sequential** mode.
//! * **Sequential** decodes every picture and stops at the first one at or
//!   past the target. Overshoots and duplicates there cost a grid cell
//!   instead of a restart.
//! * Blank, edgeless pictures are *evaded*: the same cell is retried a
//!   little later, within one step.
//!
//! Accepted shots are handed to a [`ShotSink`] in strictly increasing index
//! and timestamp order.

use image::RgbImage;

use crate::classifier::FrameClassifier;
use crate::configuration::{SeekPolicy, SheetOptions};
use crate::conversion::{format_time, seconds_to_pts, time_base_seconds};
use crate::decoder::FrameSource;
use crate::error::ShotgridError;
use crate::layout::{Layout, evasion_step};
use crate::metadata::MediaMetadata;

/// Shots with an index below this are checked for seek accuracy.
const ACCURACY_CHECK_SHOTS: u32 = 5;

/// Seek deviation (seconds) tolerated regardless of the step.
const ACCURACY_TOLERANCE_SECONDS: f64 = 15.0;

/// A sequential rescan is declined when one shot would take longer than
/// this many seconds...
const MAX_SEQUENTIAL_SECONDS_PER_SHOT: f64 = 2.0;

/// ...or when the whole grid would take longer than this.
const MAX_SEQUENTIAL_SECONDS_TOTAL: f64 = 120.0;

/// How the scheduler obtains candidate pictures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Seek to each target, then decode one picture.
    Seeking,
    /// Decode forward until reaching each target.
    Sequential,
}

/// One accepted still, ready to be placed.
#[derive(Debug, Clone)]
pub struct Shot {
    /// Grid cell, counted from zero without gaps.
    pub index: u32,
    /// Presentation timestamp in stream time-base units.
    pub timestamp: i64,
    /// Presentation time in seconds, relative to the start of the file.
    pub seconds: f64,
    /// The picture, already at shot size.
    pub image: RgbImage,
    /// The same picture at the source's display size, when requested.
    pub original: Option<RgbImage>,
}

/// Consumer of accepted shots.
pub trait ShotSink {
    /// Take ownership of an accepted shot.
    fn accept(&mut self, shot: Shot) -> Result<(), ShotgridError>;

    /// Discard everything accepted so far; sampling is starting over.
    fn reset(&mut self) -> Result<(), ShotgridError>;
}

impl ShotSink for Vec<Shot> {
    fn accept(&mut self, shot: Shot) -> Result<(), ShotgridError> {
        self.push(shot);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ShotgridError> {
        self.clear();
        Ok(())
    }
}

/// Per-run counters, for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplingStatistics {
    /// Seek requests issued.
    pub seeks: u64,
    /// Pictures decoded.
    pub frames_decoded: u64,
    /// Candidate pictures examined.
    pub candidates: u64,
    /// Restarts in sequential mode.
    pub restarts: u32,
    /// Retries caused by blank pictures.
    pub evasions: u64,
    /// Cells dropped because a previous seek went past the target (final
    /// run only).
    pub overshoot_skips: u32,
    /// Cells dropped because the decoder returned the previous picture
    /// (final run only).
    pub duplicate_skips: u32,
    /// Cells dropped because no informative picture was found within a step
    /// (final run only).
    pub evasion_skips: u32,
    /// Shots handed to the sink (final run only).
    pub accepted: u32,
}

impl SamplingStatistics {
    /// Total dropped cells.
    pub fn skipped(&self) -> u32 {
        self.overshoot_skips + self.duplicate_skips + self.evasion_skips
    }

    /// Forget the grid counters of a run that is being restarted.
    fn discard_run(&mut self) {
        self.overshoot_skips = 0;
        self.duplicate_skips = 0;
        self.evasion_skips = 0;
        self.accepted = 0;
    }
}

/// Mutable state of one sampling run.
///
/// Created fresh for every run; a restart never carries anything over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingState {
    /// Current strategy.
    pub seek_mode: SeekMode,
    /// Next grid target.
    pub seek_target: i64,
    /// Extra offset while evading a blank picture.
    pub seek_evade_offset: i64,
    /// Evasion retries for the current cell.
    pub evade_attempt_count: u32,
    /// Timestamp of the last accepted (or deliberately skipped) picture.
    pub previous_accepted_timestamp: Option<i64>,
    /// Timestamp of the last decoded candidate.
    pub previous_examined_timestamp: Option<i64>,
    /// Index of the next cell to fill.
    pub shot_index: u32,
    /// Cells this run still intends to fill, including the current one.
    pub shots_remaining: u32,
}

impl SamplingState {
    fn new(seek_mode: SeekMode, first_target: i64, shots: u32) -> Self {
        Self {
            seek_mode,
            seek_target: first_target,
            seek_evade_offset: 0,
            evade_attempt_count: 0,
            previous_accepted_timestamp: None,
            previous_examined_timestamp: None,
            shot_index: 0,
            shots_remaining: shots,
        }
    }

    fn evading(&self) -> bool {
        self.evade_attempt_count > 0
    }

    /// Move on to the next target after `found` was used or given up on.
    fn advance(&mut self, found: Option<i64>, step: i64) {
        self.seek_target += step;
        self.seek_evade_offset = 0;
        self.evade_attempt_count = 0;
        if found.is_some() {
            self.previous_accepted_timestamp = found;
            self.previous_examined_timestamp = found;
        }
    }

    /// Drop the current cell from the grid.
    fn skip(&mut self, found: Option<i64>, step: i64) {
        self.shots_remaining -= 1;
        self.advance(found, step);
    }
}

/// Why a run is restarted in sequential mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// A seek landed beyond the following target.
    Overshoot,
    /// A seek landed too far from its target.
    Inaccurate,
}

/// Outcome of examining one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Accepted,
    Skipped,
    Evading,
    Restart(RestartReason),
    EndOfStream,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Completed,
    EndOfStream,
    Restart(RestartReason),
}

/// Result of a full sampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOutcome {
    /// Cells in the layout.
    pub shots_planned: u32,
    /// Shots handed to the sink.
    pub shots_taken: u32,
    /// `true` when the stream ran out before the grid was complete.
    pub end_of_stream: bool,
    /// Strategy in effect at the end.
    pub final_mode: SeekMode,
}

impl SamplingOutcome {
    /// `true` when fewer shots were taken than planned.
    pub fn is_partial(&self) -> bool {
        self.shots_taken < self.shots_planned
    }
}

/// Picks shots from a [`FrameSource`] according to a [`Layout`].
#[derive(Debug, Clone)]
pub struct SamplingScheduler {
    shots: u32,
    step: i64,
    shot_width: u32,
    shot_height: u32,
    first_target: i64,
    stream_start: i64,
    start_seconds: f64,
    time_base_seconds: f64,
    evasion_step: i64,
    seek_policy: SeekPolicy,
    classifier: FrameClassifier,
    sequential_seconds_per_shot: f64,
    original_size: Option<(u32, u32)>,
}

impl SamplingScheduler {
    /// Prepare a scheduler for `layout` on a source described by `metadata`.
    pub fn new(layout: &Layout, options: &SheetOptions, metadata: &MediaMetadata) -> Self {
        let time_base = metadata.video.time_base;
        let start_seconds = metadata.start_time_seconds;
        let stream_start = seconds_to_pts(start_seconds, time_base);
        let first_target = layout.step + seconds_to_pts(start_seconds + options.skip_begin, time_base);

        let classifier = FrameClassifier::new(options.blank_threshold, options.edge_sensitivity);
        let mut evasion = evasion_step(layout.step, time_base);
        if evasion == 0 && classifier.evasion_enabled() {
            log::warn!(
                "step is {:.2}s; blank and blur evasion is turned off",
                layout.step_seconds()
            );
        }
        if !classifier.evasion_enabled() {
            evasion = 0;
        }

        Self {
            shots: layout.shot_count(),
            step: layout.step,
            shot_width: layout.shot_width,
            shot_height: layout.shot_height,
            first_target,
            stream_start,
            start_seconds,
            time_base_seconds: time_base_seconds(time_base),
            evasion_step: evasion,
            seek_policy: options.seek_policy,
            classifier,
            sequential_seconds_per_shot: sequential_cost_per_shot(
                layout.step_seconds(),
                metadata.video.display_width,
            ),
            original_size: options.individual.original.then_some((
                metadata.video.display_width,
                metadata.video.display_height,
            )),
        }
    }

    /// Distance between evasion retries; `0` when evasion is off.
    pub fn evasion_step(&self) -> i64 {
        self.evasion_step
    }

    /// The first grid target.
    pub fn first_target(&self) -> i64 {
        self.first_target
    }

    fn initial_mode(&self) -> SeekMode {
        match self.seek_policy {
            SeekPolicy::NeverSeek => SeekMode::Sequential,
            SeekPolicy::Auto | SeekPolicy::AlwaysSeek => SeekMode::Seeking,
        }
    }

    fn may_switch_to_sequential(&self, state: &SamplingState) -> bool {
        state.seek_mode == SeekMode::Seeking && self.seek_policy == SeekPolicy::Auto
    }

    fn seconds(&self, pts: i64) -> f64 {
        pts as f64 * self.time_base_seconds - self.start_seconds
    }

    fn label(&self, pts: i64) -> String {
        format_time(self.seconds(pts))
    }

    /// Sample the whole grid.
    ///
    /// End of stream is not an error; it ends sampling early and the outcome
    /// reports fewer shots than planned.
    pub fn run<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        statistics: &mut SamplingStatistics,
    ) -> Result<SamplingOutcome, ShotgridError>
    where
        S: FrameSource + ?Sized,
        K: ShotSink + ?Sized,
    {
        let mut mode = self.initial_mode();
        if mode == SeekMode::Sequential {
            log::info!("using sequential decoding; slower but more accurate timing");
        }

        loop {
            let mut state = SamplingState::new(mode, self.first_target, self.shots);
            let phase = self.sample(&mut state, source, sink, statistics)?;

            let end_of_stream = match phase {
                Phase::Completed => false,
                Phase::EndOfStream => true,
                Phase::Restart(reason) => {
                    log::info!("restarting in sequential mode ({reason:?})");
                    statistics.restarts += 1;
                    statistics.discard_run();
                    source.rewind()?;
                    sink.reset()?;
                    mode = SeekMode::Sequential;
                    continue;
                }
            };

            let outcome = SamplingOutcome {
                shots_planned: self.shots,
                shots_taken: state.shot_index,
                end_of_stream,
                final_mode: state.seek_mode,
            };
            log::debug!(
                "sampling finished: {}/{} shots, {} skipped, {} evasions",
                outcome.shots_taken,
                outcome.shots_planned,
                statistics.skipped(),
                statistics.evasions
            );
            return Ok(outcome);
        }
    }

    fn sample<S, K>(
        &self,
        state: &mut SamplingState,
        source: &mut S,
        sink: &mut K,
        statistics: &mut SamplingStatistics,
    ) -> Result<Phase, ShotgridError>
    where
        S: FrameSource + ?Sized,
        K: ShotSink + ?Sized,
    {
        while state.shot_index < state.shots_remaining {
            match self.examine(state, source, sink, statistics)? {
                Transition::Accepted | Transition::Skipped | Transition::Evading => {}
                Transition::Restart(reason) => return Ok(Phase::Restart(reason)),
                Transition::EndOfStream => return Ok(Phase::EndOfStream),
            }
        }
        Ok(Phase::Completed)
    }

    /// Examine one target and update `state` accordingly.
    fn examine<S, K>(
        &self,
        state: &mut SamplingState,
        source: &mut S,
        sink: &mut K,
        statistics: &mut SamplingStatistics,
    ) -> Result<Transition, ShotgridError>
    where
        S: FrameSource + ?Sized,
        K: ShotSink + ?Sized,
    {
        let mut target = (state.seek_target + state.seek_evade_offset).max(self.stream_start);

        if !state.evading()
            && matches!(state.previous_accepted_timestamp, Some(previous) if previous > target)
        {
            if self.may_switch_to_sequential(state) {
                log::info!(
                    "previous seek overshot target {}; switching to sequential mode",
                    self.label(target)
                );
                return Ok(Transition::Restart(RestartReason::Overshoot));
            }
            log::info!(
                "skipping shot at {} because of previous seek or evasions",
                self.label(target)
            );
            statistics.overshoot_skips += 1;
            let previous = state.previous_examined_timestamp;
            state.skip(previous, self.step);
            return Ok(Transition::Skipped);
        }

        if let Some(previous) = state.previous_examined_timestamp {
            target = target.max(previous + 1);
        }

        let Some(found) = self.obtain(state.seek_mode, target, source, statistics)? else {
            return Ok(Transition::EndOfStream);
        };
        statistics.candidates += 1;
        log::debug!(
            "shot {}: target {} ({:.2}s), found {} ({:.2}s)",
            state.shot_index,
            target,
            self.seconds(target),
            found,
            self.seconds(found)
        );

        if state.shot_index < ACCURACY_CHECK_SHOTS && self.may_switch_to_sequential(state) {
            let deviation = (found - target).abs();
            let tolerance = self
                .step
                .max((ACCURACY_TOLERANCE_SECONDS / self.time_base_seconds) as i64);
            if deviation > tolerance {
                let off_by = deviation as f64 * self.time_base_seconds;
                let per_shot = self.sequential_seconds_per_shot;
                if per_shot > MAX_SEQUENTIAL_SECONDS_PER_SHOT
                    || per_shot * self.shots as f64 > MAX_SEQUENTIAL_SECONDS_TOTAL
                {
                    log::warn!(
                        "seeking off target by {off_by:.2}s; increase the step or disable seeking"
                    );
                } else {
                    log::info!("seeking was off target by {off_by:.2}s; switching to sequential mode");
                    return Ok(Transition::Restart(RestartReason::Inaccurate));
                }
            }
        }

        // Shots never repeat or go back in time. While evading, such a
        // picture is just another rejected candidate.
        if matches!(state.previous_accepted_timestamp, Some(previous) if found <= previous) {
            if state.evading() {
                return Ok(self.evade(state, found, statistics, "landed on an earlier picture"));
            }
            log::info!(
                "skipping shot at {} because it repeats the previous shot",
                self.label(target)
            );
            statistics.duplicate_skips += 1;
            state.skip(Some(found), self.step);
            return Ok(Transition::Skipped);
        }

        let image = source.current_frame(self.shot_width, self.shot_height)?;

        if self.evasion_step > 0 {
            let result = self.classifier.classify(&image);
            if self.classifier.is_rejected(&result) {
                let reason = format!("blank {:.2}", result.blank_ratio);
                return Ok(self.evade(state, found, statistics, &reason));
            }
        }

        let original = match self.original_size {
            Some((width, height)) => Some(source.current_frame(width, height)?),
            None => None,
        };
        sink.accept(Shot {
            index: state.shot_index,
            timestamp: found,
            seconds: self.seconds(found),
            image,
            original,
        })?;
        statistics.accepted += 1;
        state.shot_index += 1;
        state.advance(Some(found), self.step);
        Ok(Transition::Accepted)
    }

    /// Retry the current cell a little later, or give it up once the
    /// retries would reach the next target.
    fn evade(
        &self,
        state: &mut SamplingState,
        found: i64,
        statistics: &mut SamplingStatistics,
        reason: &str,
    ) -> Transition {
        state.evade_attempt_count += 1;
        state.seek_evade_offset = self.evasion_step * state.evade_attempt_count as i64;
        let examined = state
            .previous_examined_timestamp
            .map_or(found, |previous| previous.max(found));
        state.previous_examined_timestamp = Some(examined);
        statistics.evasions += 1;

        if state.seek_evade_offset < self.step - self.evasion_step {
            log::debug!(
                "{reason}; try #{} at +{:.2}s",
                state.evade_attempt_count,
                state.seek_evade_offset as f64 * self.time_base_seconds
            );
            return Transition::Evading;
        }

        log::info!(
            "{reason}; skipping shot at {} after {} tries",
            self.label(state.seek_target),
            state.evade_attempt_count
        );
        statistics.evasion_skips += 1;
        state.skip(Some(examined), self.step);
        Transition::Skipped
    }

    /// Fetch the candidate picture for `target`, or `None` at end of stream.
    fn obtain<S>(
        &self,
        mode: SeekMode,
        target: i64,
        source: &mut S,
        statistics: &mut SamplingStatistics,
    ) -> Result<Option<i64>, ShotgridError>
    where
        S: FrameSource + ?Sized,
    {
        match mode {
            SeekMode::Seeking => {
                statistics.seeks += 1;
                if let Err(error) = source.seek(target) {
                    log::warn!("seeking to {:.2}s failed: {error}", self.seconds(target));
                    return Ok(None);
                }
                source.flush();
                let found = source.decode_next_frame()?;
                if found.is_some() {
                    statistics.frames_decoded += 1;
                }
                Ok(found)
            }
            SeekMode::Sequential => loop {
                match source.decode_next_frame()? {
                    None => return Ok(None),
                    Some(found) => {
                        statistics.frames_decoded += 1;
                        if found >= target {
                            return Ok(Some(found));
                        }
                    }
                }
            },
        }
    }
}

/// Rough wall-clock cost (seconds) of decoding one step sequentially.
///
/// Assumes about 30 decoded pictures per second of video and a decode speed
/// that scales with resolution.
pub fn sequential_cost_per_shot(step_seconds: f64, source_width: u32) -> f64 {
    let decode_rate = if source_width > 768 {
        30.0
    } else if source_width > 384 {
        80.0
    } else {
        500.0
    };
    step_seconds * 30.0 / decode_rate
}
