//! # shotgrid
//!
//! Contact sheets from video files: a grid of representative stills, with
//! timestamps and a short description of the file, saved as one JPEG or PNG.
//!
//! Picking the stills is the interesting part. Seeking in compressed video
//! is imprecise and format-dependent, and evenly spaced samples happily land
//! on fades and title cards. `shotgrid` plans the grid from the source's
//! display size and duration, then samples it with a scheduler that detects
//! unreliable seeking (and falls back to sequential decoding), skips
//! duplicate pictures, and steps around blank, featureless frames.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shotgrid::{ContactSheet, SheetOptions};
//!
//! let options = SheetOptions::new()
//!     .with_grid(4, 6)
//!     .with_width(1280)
//!     .with_gap(2);
//! let report = ContactSheet::generate("input.mp4", &options)?;
//! println!("{} -> {:?}", report.output.display(), report.status);
//! # Ok::<(), shotgrid::ShotgridError>(())
//! ```
//!
//! ### Scrubbing sprites
//!
//! ```no_run
//! use shotgrid::{ContactSheet, SheetOptions};
//!
//! // Also writes input_vtt_0.jpg, ... and input.vtt next to the sheet.
//! let options = SheetOptions::new().with_step(10.0).with_grid(5, 0).with_sprite("/thumbs/");
//! ContactSheet::generate("input.mp4", &options)?;
//! # Ok::<(), shotgrid::ShotgridError>(())
//! ```
//!
//! ### Planning without a decoder
//!
//! ```
//! use ffmpeg_next::Rational;
//! use shotgrid::layout::{LayoutRequest, plan};
//!
//! let layout = plan(&LayoutRequest {
//!     source_width: 1280,
//!     source_height: 720,
//!     columns: 3,
//!     rows: 2,
//!     step_seconds: 0.0,
//!     width: 960,
//!     min_shot_height: 100,
//!     gap: 0,
//!     duration_seconds: 70.0,
//!     time_base: Rational::new(1, 1000),
//! })?;
//! assert_eq!(layout.step, 10_000);
//! # Ok::<(), shotgrid::ShotgridError>(())
//! ```
//!
//! ## Components
//!
//! - [`layout`]: grid geometry from display size, duration and options
//! - [`classifier`]: blank and edge scoring for candidate frames
//! - [`scheduler`]: the sampling state machine, generic over [`FrameSource`]
//! - [`composer`]: the canvas, drop shadows and final cropping
//! - [`sprite`]: sprite sheets and a WebVTT thumbnails track
//! - [`individual`]: per-shot image files
//! - [`source`]: the FFmpeg-backed [`MediaSource`]
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed. Text rendering needs a
//! TrueType font; DejaVu Sans is picked up from the usual system locations,
//! or pass one with [`SheetOptions::with_font`].

pub mod classifier;
pub mod composer;
pub mod configuration;
pub mod conversion;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod individual;
pub mod info;
pub mod layout;
pub mod metadata;
pub mod progress;
pub mod render;
pub mod scheduler;
pub mod source;
pub mod sprite;
pub mod thumbnail;

pub use classifier::{ClassificationResult, FrameClassifier};
pub use composer::GridComposer;
pub use configuration::{Corner, IndividualShots, SeekPolicy, SheetOptions, TextStyle};
pub use decoder::FrameSource;
pub use error::ShotgridError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use individual::ShotWriter;
pub use layout::{Layout, LayoutRequest};
pub use metadata::{MediaMetadata, StreamDetail, StreamSummary, VideoMetadata};
pub use progress::{ProgressCallback, ProgressInfo, ProgressStage};
pub use render::TextRenderer;
pub use scheduler::{
    SamplingOutcome, SamplingScheduler, SamplingState, SamplingStatistics, SeekMode, Shot,
    ShotSink,
};
pub use source::MediaSource;
pub use sprite::{SpriteExporter, SpriteOutput};
pub use thumbnail::{ContactSheet, RenderedSheet, SheetReport, SheetStatus};
