//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for monitoring contact-sheet
//! generation and [`ProgressInfo`], the snapshot delivered to it. A report is
//! emitted after every accepted shot, when the scheduler restarts in
//! sequential mode, and once when the sheet is finished.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shotgrid::{ContactSheet, ProgressCallback, ProgressInfo, SheetOptions, ShotgridError};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.stage);
//!         }
//!     }
//! }
//!
//! let options = SheetOptions::new().with_progress(Arc::new(PrintProgress));
//! let report = ContactSheet::generate("input.mp4", &options)?;
//! # Ok::<(), ShotgridError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a progress report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressStage {
    /// A shot was accepted.
    Sampling,
    /// Sampling started over in sequential mode; `current` is back to zero.
    Restarted,
    /// The sheet has been composed and saved.
    Finished,
}

/// A snapshot of sampling progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What triggered this report.
    pub stage: ProgressStage,
    /// Shots accepted so far in the current run.
    pub current: u64,
    /// Shots planned, if known.
    pub total: Option<u64>,
    /// Completion percentage (0.0 - 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since sampling started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Presentation time of the latest shot.
    pub current_timestamp: Option<Duration>,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`] so that a single callback
/// can be shared across jobs through an [`Arc`].
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// operation.
pub trait ProgressCallback: Send + Sync {
    /// Called after each accepted shot and at the end of a job.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Internal helper that tracks progress timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: Option<u64>) -> Self {
        Self {
            callback,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one accepted shot.
    pub(crate) fn advance(&mut self, timestamp: Option<Duration>) {
        self.current += 1;
        self.report(ProgressStage::Sampling, timestamp);
    }

    /// Start counting from zero again.
    pub(crate) fn restart(&mut self) {
        self.current = 0;
        self.report(ProgressStage::Restarted, None);
    }

    /// Unconditionally emit a final progress report.
    pub(crate) fn finish(&mut self) {
        self.report(ProgressStage::Finished, None);
    }

    fn report(&self, stage: ProgressStage, timestamp: Option<Duration>) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| (self.current as f32 / total as f32) * 100.0);

        let estimated_remaining = if self.current > 0 {
            self.total.map(|total| {
                let remaining = total.saturating_sub(self.current);
                let per_item = elapsed / self.current as u32;
                per_item * remaining as u32
            })
        } else {
            None
        };

        let info = ProgressInfo {
            stage,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_timestamp: timestamp,
        };

        self.callback.on_progress(&info);
    }
}
