use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use shotgrid::{
    ContactSheet, Corner, FfmpegLogLevel, IndividualShots, ProgressCallback, ProgressInfo,
    ProgressStage, SeekPolicy, SheetOptions, SheetReport, SheetStatus, ShotgridError, TextStyle,
    render,
};
use walkdir::WalkDir;

const CLI_AFTER_HELP: &str = "Examples:\n  shotgrid movie.mkv\n  shotgrid -c 3 -r 8 -g 4 --shadow talk.mp4\n  shotgrid -r 0 -s 60 --vtt=/thumbs/ --output-dir sheets -R ~/Videos\n  shotgrid --no-overwrite --json *.mp4\n  shotgrid completions zsh > _shotgrid\n\nExit status: 0 when every sheet is complete, 1 when some were partial, 2 when some failed.";

/// Files picked up when walking a directory.
const VIDEO_EXTENSIONS: &[&str] = &[
    "3g2", "3gp", "asf", "avi", "divx", "dv", "f4v", "flv", "m1v", "m2ts", "m2v", "m4v", "mkv",
    "mov", "mp4", "mpeg", "mpg", "mts", "mxf", "ogm", "ogv", "qt", "rm", "rmvb", "ts", "vob",
    "webm", "wmv",
];

#[derive(Debug, Parser)]
#[command(
    name = "shotgrid",
    version,
    about = "Build contact sheets (thumbnail grids) from video files",
    after_help = CLI_AFTER_HELP,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(flatten)]
    sheet: SheetArgs,

    /// Video files or directories.
    inputs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Args, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar per file.
    #[arg(long, global = true)]
    progress: bool,

    /// Replace existing sheets (the default).
    #[arg(long, overrides_with = "no_overwrite")]
    overwrite: bool,

    /// Skip files whose sheet already exists.
    #[arg(long, overrides_with = "overwrite")]
    no_overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<FfmpegLogLevel>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SeekArg {
    /// Seek, falling back to sequential decoding when seeking is unreliable.
    Auto,
    /// Always seek.
    Always,
    /// Never seek.
    Never,
}

impl From<SeekArg> for SeekPolicy {
    fn from(value: SeekArg) -> Self {
        match value {
            SeekArg::Auto => SeekPolicy::Auto,
            SeekArg::Always => SeekPolicy::AlwaysSeek,
            SeekArg::Never => SeekPolicy::NeverSeek,
        }
    }
}

#[derive(Debug, Args, Clone)]
struct SheetArgs {
    /// Number of columns.
    #[arg(short = 'c', long, default_value_t = 4)]
    columns: u32,

    /// Number of rows; 0 derives rows from --step.
    #[arg(short = 'r', long, default_value_t = 4)]
    rows: u32,

    /// Time between shots when --rows is 0 (seconds, MM:SS or HH:MM:SS).
    #[arg(short = 's', long, value_parser = parse_timecode)]
    step: Option<Duration>,

    /// Sheet width in pixels; 0 for the natural width.
    #[arg(short = 'w', long, default_value_t = 1024)]
    width: u32,

    /// Minimum shot height; columns are dropped until shots reach it.
    #[arg(long, default_value_t = 150)]
    min_height: u32,

    /// Gap between shots in pixels.
    #[arg(short = 'g', long, default_value_t = 0)]
    gap: u32,

    /// Blank threshold in 0..=1; 1 turns blank evasion off.
    #[arg(short = 'b', long, default_value_t = 0.8)]
    blank: f64,

    /// Edge detection sensitivity; 0 turns it off.
    #[arg(short = 'D', long, default_value_t = 12)]
    edge: u32,

    /// Seeking strategy.
    #[arg(long, value_enum, default_value_t = SeekArg::Auto)]
    seek: SeekArg,

    /// Skip this much at the beginning.
    #[arg(short = 'B', long, value_parser = parse_timecode)]
    skip_begin: Option<Duration>,

    /// Skip this much at the end.
    #[arg(short = 'E', long, value_parser = parse_timecode)]
    skip_end: Option<Duration>,

    /// Use only this much of the video after --skip-begin.
    #[arg(short = 'C', long, value_parser = parse_timecode)]
    cut: Option<Duration>,

    /// Do not draw timestamps.
    #[arg(long)]
    no_timestamps: bool,

    /// Timestamp color (RRGGBB).
    #[arg(long, value_parser = parse_color_arg)]
    timestamp_color: Option<image::Rgb<u8>>,

    /// Timestamp size in points.
    #[arg(long)]
    timestamp_size: Option<f32>,

    /// Timestamp corner: 1 lower-left, 2 lower-right, 3 upper-right, 4 upper-left.
    #[arg(long, value_parser = parse_corner)]
    timestamp_corner: Option<Corner>,

    /// Timestamp shadow color (RRGGBB).
    #[arg(long, value_parser = parse_color_arg)]
    timestamp_shadow: Option<image::Rgb<u8>>,

    /// Do not draw the info header.
    #[arg(long)]
    no_info: bool,

    /// Info header color (RRGGBB).
    #[arg(long, value_parser = parse_color_arg)]
    info_color: Option<image::Rgb<u8>>,

    /// Info header size in points.
    #[arg(long)]
    info_size: Option<f32>,

    /// Info header corner: 1 lower-left, 2 lower-right, 3 upper-right, 4 upper-left.
    #[arg(long, value_parser = parse_corner)]
    info_corner: Option<Corner>,

    /// Extra text appended to the info header.
    #[arg(short = 'T', long)]
    text: Option<String>,

    /// TrueType font file.
    #[arg(short = 'f', long)]
    font: Option<PathBuf>,

    /// Background color (RRGGBB).
    #[arg(short = 'k', long, value_parser = parse_color_arg)]
    background: Option<image::Rgb<u8>>,

    /// Transparent background (PNG output only).
    #[arg(long)]
    transparent: bool,

    /// Drop shadow radius; without a value or 0 it is sized automatically.
    #[arg(long, num_args = 0..=1, default_missing_value = "0")]
    shadow: Option<u32>,

    /// JPEG quality (1-100).
    #[arg(short = 'j', long, default_value_t = 90)]
    quality: u8,

    /// Output name suffix; the extension selects JPEG or PNG.
    #[arg(short = 'o', long, default_value = "_s.jpg")]
    suffix: String,

    /// Write outputs to this directory instead of next to each input.
    #[arg(short = 'O', long)]
    output_dir: Option<PathBuf>,

    /// Also save the info header to <name><SUFFIX>.
    #[arg(short = 'N', long)]
    info_suffix: Option<String>,

    /// Also save embedded cover art to <name>_cover.jpg.
    #[arg(long)]
    cover: bool,

    /// Also write sprite sheets and a WebVTT track; the value prefixes image names in the track.
    #[arg(long, num_args = 0..=1, default_missing_value = "", require_equals = true)]
    vtt: Option<String>,

    /// Also save each shot: t at shot size, o at display size, i skips the sheet (e.g. -I to).
    #[arg(short = 'I', long, value_parser = parse_individual)]
    individual: Option<IndividualShots>,

    /// Video stream index to sample.
    #[arg(long)]
    stream: Option<usize>,

    /// Override the display aspect ratio (e.g. 1.7778).
    #[arg(short = 'a', long)]
    aspect: Option<f64>,

    /// Walk directories recursively.
    #[arg(short = 'R', long)]
    recursive: bool,

    /// Print a JSON report instead of status lines.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".to_string());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(Duration::from_secs_f64(seconds.max(0.0)));
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}"));
    }

    let number = |part: &str| {
        part.parse::<u64>()
            .map_err(|_| format!("invalid time format: {trimmed}"))
    };
    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (number(parts[0])?, number(parts[1])?, parts[2])
    } else {
        (0_u64, number(parts[0])?, parts[1])
    };

    let seconds = seconds_str
        .parse::<f64>()
        .map_err(|_| format!("invalid time format: {trimmed}"))?;
    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    Ok(Duration::from_secs_f64(total_seconds.max(0.0)))
}

fn parse_log_level(value: &str) -> Result<FfmpegLogLevel, String> {
    value.parse().map_err(|error: ShotgridError| error.to_string())
}

fn parse_color_arg(value: &str) -> Result<image::Rgb<u8>, String> {
    render::parse_color(value).map_err(|error| error.to_string())
}

fn parse_individual(value: &str) -> Result<IndividualShots, String> {
    value.parse().map_err(|error: ShotgridError| error.to_string())
}

fn parse_corner(value: &str) -> Result<Corner, String> {
    let corner = match value.trim().to_ascii_lowercase().as_str() {
        "1" | "lower-left" | "ll" => Corner::from_code(1),
        "2" | "lower-right" | "lr" => Corner::from_code(2),
        "3" | "upper-right" | "ur" => Corner::from_code(3),
        "4" | "upper-left" | "ul" => Corner::from_code(4),
        _ => None,
    };
    corner.ok_or_else(|| format!("invalid corner {value:?}; expected 1-4"))
}

fn restyle(
    base: Option<TextStyle>,
    color: Option<image::Rgb<u8>>,
    size: Option<f32>,
    corner: Option<Corner>,
    shadow: Option<image::Rgb<u8>>,
) -> Option<TextStyle> {
    base.map(|mut style| {
        if let Some(color) = color {
            style.color = color;
        }
        if let Some(size) = size {
            style.size = size;
        }
        if let Some(corner) = corner {
            style.corner = corner;
        }
        if shadow.is_some() {
            style.shadow = shadow;
        }
        style
    })
}

fn sheet_options(args: &SheetArgs, global: &GlobalOptions) -> SheetOptions {
    let defaults = SheetOptions::default();
    let timestamps = if args.no_timestamps {
        None
    } else {
        restyle(
            defaults.timestamp_style,
            args.timestamp_color,
            args.timestamp_size,
            args.timestamp_corner,
            args.timestamp_shadow,
        )
    };
    let info = if args.no_info {
        None
    } else {
        restyle(
            defaults.info_style,
            args.info_color,
            args.info_size,
            args.info_corner,
            None,
        )
    };

    let mut options = SheetOptions::new()
        .with_grid(args.columns, args.rows)
        .with_width(args.width)
        .with_min_shot_height(args.min_height)
        .with_gap(args.gap)
        .with_blank_threshold(args.blank)
        .with_edge_sensitivity(args.edge)
        .with_seek_policy(args.seek.into())
        .with_trim(
            args.skip_begin.map_or(0.0, |begin| begin.as_secs_f64()),
            args.skip_end.map_or(0.0, |end| end.as_secs_f64()),
        )
        .with_timestamps(timestamps)
        .with_info(info)
        .with_transparent_background(args.transparent)
        .with_jpeg_quality(args.quality)
        .with_suffix(args.suffix.clone())
        .with_overwrite(global.overwrite || !global.no_overwrite)
        .with_cover(args.cover);

    if let Some(step) = args.step {
        options = options.with_step(step.as_secs_f64());
    }
    if let Some(cut) = args.cut {
        options = options.with_cut(cut.as_secs_f64());
    }
    if let Some(text) = &args.text {
        options = options.with_info_text(text.clone());
    }
    if let Some(font) = &args.font {
        options = options.with_font(font.clone());
    }
    if let Some(background) = args.background {
        options = options.with_background(background);
    }
    if let Some(radius) = args.shadow {
        options = options.with_shadow(radius);
    }
    if let Some(directory) = &args.output_dir {
        options = options.with_output_dir(directory.clone());
    }
    if let Some(suffix) = &args.info_suffix {
        options = options.with_info_file(suffix.clone());
    }
    if let Some(prefix) = &args.vtt {
        options = options.with_sprite(prefix.clone());
    }
    if let Some(individual) = args.individual {
        options = options.with_individual(individual);
    }
    if let Some(stream) = args.stream {
        options = options.with_video_stream(stream);
    }
    if let Some(aspect) = args.aspect {
        options = options.with_aspect_ratio(aspect);
    }
    options
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|extension| VIDEO_EXTENSIONS.contains(&extension.as_str()))
}

/// Expand directories into the video files they contain, sorted by name.
fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let walker = WalkDir::new(input)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name();
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_video_file(entry.path()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(error) => log::warn!("skipping unreadable entry: {error}"),
            }
        }
    }
    files
}

fn init_logging(global: &GlobalOptions) {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let level = global
        .log_level
        .unwrap_or_else(|| FfmpegLogLevel::for_verbosity(global.verbose));
    shotgrid::set_ffmpeg_log_level(level);
}

/// Drives an `indicatif` bar from sampling progress.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(label: String) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        bar.set_message(label);
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        match info.stage {
            ProgressStage::Restarted => self.bar.println(format!(
                "{} seeking is unreliable; decoding sequentially",
                "warning:".yellow().bold()
            )),
            ProgressStage::Finished => self.bar.finish_and_clear(),
            _ => {}
        }
    }
}

fn report_json(report: &SheetReport) -> Value {
    let (status, obtained, planned) = match report.status {
        SheetStatus::Complete => ("complete", report.layout.shot_count(), report.layout.shot_count()),
        SheetStatus::Partial { obtained, planned } => ("partial", obtained, planned),
    };
    json!({
        "source": report.source.display().to_string(),
        "output": report.output.display().to_string(),
        "sheet_saved": report.sheet_saved,
        "status": status,
        "shots": obtained,
        "planned": planned,
        "columns": report.layout.columns,
        "rows": report.layout.rows,
        "shot_width": report.layout.shot_width,
        "shot_height": report.layout.shot_height,
        "width": report.canvas_width,
        "height": report.canvas_height,
        "step_seconds": report.layout.step_seconds(),
        "restarts": report.statistics.restarts,
        "skipped": report.statistics.skipped(),
        "evasions": report.statistics.evasions,
        "info_file": report.info_file.as_ref().map(|path| path.display().to_string()),
        "cover": report.cover.as_ref().map(|path| path.display().to_string()),
        "vtt": report.sprite.as_ref().map(|sprite| sprite.track.display().to_string()),
        "individual": report.individual.len(),
        "elapsed_seconds": report.elapsed.as_secs_f64(),
    })
}

fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "shotgrid", &mut std::io::stdout());
        return Ok(0);
    }

    init_logging(&cli.global);

    let files = collect_inputs(&cli.inputs, cli.sheet.recursive);
    if files.is_empty() {
        return Err("no input files (see --help)".into());
    }

    let base_options = sheet_options(&cli.sheet, &cli.global);
    base_options.validate()?;

    let mut exit_code = 0;
    let mut reports = Vec::new();

    for file in &files {
        let mut options = base_options.clone();
        if cli.global.progress && !cli.sheet.json {
            let label = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            options = options.with_progress(Arc::new(TerminalProgress::new(label)?));
        }

        match ContactSheet::generate(file, &options) {
            Ok(report) => {
                match report.status {
                    SheetStatus::Complete => {
                        if !cli.sheet.json && report.sheet_saved {
                            println!("{} {}", "done".green().bold(), report.output.display());
                        } else if !cli.sheet.json {
                            println!(
                                "{} {} individual shots from {}",
                                "done".green().bold(),
                                report.individual.len(),
                                report.source.display()
                            );
                        }
                    }
                    SheetStatus::Partial { obtained, planned } => {
                        exit_code = exit_code.max(1);
                        if !cli.sheet.json {
                            eprintln!(
                                "{} {} has only {obtained} of {planned} shots",
                                "warning:".yellow().bold(),
                                report.output.display()
                            );
                        }
                    }
                }
                if cli.global.verbose && !cli.sheet.json {
                    eprintln!(
                        "  {}x{} grid, {:.2}s step, {} restarts, {} skipped, {:.2}s",
                        report.layout.columns,
                        report.layout.rows,
                        report.layout.step_seconds(),
                        report.statistics.restarts,
                        report.statistics.skipped(),
                        report.elapsed.as_secs_f64()
                    );
                }
                reports.push(report_json(&report));
            }
            Err(ShotgridError::OutputExists(path)) => {
                if !cli.sheet.json {
                    eprintln!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        format!("{} exists, skipping (use --overwrite to replace)", path.display())
                            .yellow()
                    );
                }
                reports.push(json!({
                    "source": file.display().to_string(),
                    "output": path.display().to_string(),
                    "status": "skipped",
                }));
            }
            Err(error) => {
                exit_code = 2;
                if !cli.sheet.json {
                    eprintln!("{} {}: {error}", "error:".red().bold(), file.display());
                }
                reports.push(json!({
                    "source": file.display().to_string(),
                    "status": "failed",
                    "error": error.to_string(),
                }));
            }
        }
    }

    if cli.sheet.json {
        println!("{}", serde_json::to_string_pretty(&Value::Array(reports))?);
    }
    Ok(exit_code)
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            std::process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_video_file, parse_color_arg, parse_corner, parse_individual, parse_log_level,
        parse_timecode,
    };
    use shotgrid::{Corner, FfmpegLogLevel};
    use std::path::Path;

    #[test]
    fn parse_timecode_formats() {
        let seconds = parse_timecode("75").unwrap();
        assert_eq!(seconds.as_secs(), 75);

        let mm_ss = parse_timecode("01:15").unwrap();
        assert_eq!(mm_ss.as_secs(), 75);

        let hh_mm_ss = parse_timecode("00:01:15.5").unwrap();
        assert_eq!(hh_mm_ss.as_millis(), 75_500);

        assert!(parse_timecode("").is_err());
        assert!(parse_timecode("1:2:3:4").is_err());
        assert!(parse_timecode("aa:10").is_err());
    }

    #[test]
    fn parse_log_level_aliases() {
        assert_eq!(parse_log_level("warn").unwrap(), FfmpegLogLevel::Warning);
        assert_eq!(parse_log_level("QUIET").unwrap(), FfmpegLogLevel::Quiet);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn parse_colors_and_corners() {
        assert_eq!(parse_color_arg("#ff8000").unwrap().0, [255, 128, 0]);
        assert_eq!(parse_color_arg("000000").unwrap().0, [0, 0, 0]);
        assert!(parse_color_arg("fff").is_err());

        assert_eq!(parse_corner("1").unwrap(), Corner::LowerLeft);
        assert_eq!(parse_corner("upper-right").unwrap(), Corner::UpperRight);
        assert!(parse_corner("5").is_err());
    }

    #[test]
    fn parse_individual_letters() {
        let kinds = parse_individual("ti").unwrap();
        assert!(kinds.thumbnail && kinds.ignore_grid && !kinds.original);
        assert!(parse_individual("q").is_err());
    }

    #[test]
    fn video_extension_filter() {
        assert!(is_video_file(Path::new("a/b/movie.MKV")));
        assert!(is_video_file(Path::new("clip.mp4")));
        assert!(!is_video_file(Path::new("notes.txt")));
        assert!(!is_video_file(Path::new("README")));
    }
}
