//! FFmpeg console verbosity.
//!
//! FFmpeg writes its own diagnostics to stderr, independently of the `log`
//! facade used by this crate. Damaged files can make it very chatty while a
//! sheet is sampled, so callers usually lower it:
//!
//! ```no_run
//! use shotgrid::FfmpegLogLevel;
//!
//! shotgrid::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```

use std::str::FromStr;

use ffmpeg_next::util::log::Level;

use crate::error::ShotgridError;

/// FFmpeg's `AV_LOG_*` levels, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FfmpegLogLevel {
    /// No output.
    Quiet,
    /// Only conditions that abort the process.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings; FFmpeg's default.
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging output.
    Debug,
    /// Everything.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            Self::Quiet => Level::Quiet,
            Self::Panic => Level::Panic,
            Self::Fatal => Level::Fatal,
            Self::Error => Level::Error,
            Self::Warning => Level::Warning,
            Self::Info => Level::Info,
            Self::Verbose => Level::Verbose,
            Self::Debug => Level::Debug,
            Self::Trace => Level::Trace,
        }
    }

    /// Level matching the crate's own verbosity: warnings normally, FFmpeg's
    /// verbose output when the caller asked for debug logging.
    pub fn for_verbosity(verbose: bool) -> Self {
        if verbose { Self::Verbose } else { Self::Error }
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = ShotgridError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(Self::Quiet),
            "panic" => Ok(Self::Panic),
            "fatal" => Ok(Self::Fatal),
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            "verbose" => Ok(Self::Verbose),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(ShotgridError::InvalidOption(format!(
                "unknown FFmpeg log level '{other}'; expected one of quiet, panic, fatal, \
                 error, warning, info, verbose, debug, trace"
            ))),
        }
    }
}

/// Set FFmpeg's console verbosity for the whole process.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}
