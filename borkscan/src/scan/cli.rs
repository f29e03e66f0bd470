use super::classify::PatternSet;
use super::error::ScanError;
use super::progress::{IndicatifSink, PlainSink, ProgressRenderer, ProgressSink};
use super::report::ReportWriter;
use super::results::ScanResults;
use super::runner::{ScanSchedulerBuilder, ScanTask};
use crate::shared::prelude::{
    render_command, FfmpegAnalyzerBuilder, FoundConfig, MediaAnalyzer, ScanMode,
};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan for media files
    target: PathBuf,

    /// Scan mode. full decodes entire files, fast only the first frame
    #[arg(value_enum)]
    mode: Option<ScanMode>,

    /// Number of parallel file workers (default: logical processors / 2)
    #[arg(long = "filethreads")]
    file_threads: Option<String>,

    /// Max number of concurrent ffmpeg processes
    #[arg(long = "ffmpeginstances")]
    ffmpeg_instances: Option<String>,

    /// Scan subdirectories
    #[arg(long, overrides_with = "norecursive")]
    recursive: bool,

    /// Do not scan subdirectories
    #[arg(long, overrides_with = "recursive")]
    norecursive: bool,

    /// Directory holding MajorErrorPatterns.txt and MinorErrorPatterns.txt
    #[arg(long)]
    patterns_dir: Option<PathBuf>,

    /// Analysis binary to invoke
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg_bin: String,

    /// Per-file time limit for the analysis tool, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Anything unrecognized lands here and produces a warning instead of
    /// aborting the scan.
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    unrecognized: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScanOptions {
    pub target: PathBuf,
    pub mode: ScanMode,
    pub file_threads: usize,
    pub ffmpeg_instances: usize,
    pub recursive: bool,
    pub patterns_dir: PathBuf,
    pub ffmpeg_bin: String,
    pub timeout: Option<Duration>,
    pub extensions: Vec<String>,
    pub progress_interval: Duration,
}

/// Folds flags, optional config-file defaults, and built-in defaults into
/// concrete options. Malformed values warn and fall back, they never abort.
pub(crate) fn resolve_options(
    args: &ScanArgs,
    config: &FoundConfig,
) -> (ScanOptions, Vec<String>) {
    let mut warnings = Vec::new();

    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    let default_threads = config
        .settings
        .default_file_threads
        .unwrap_or_else(|| (cpus / 2).max(1));
    let default_instances = config.settings.default_ffmpeg_instances.max(1);

    let file_threads = resolve_limit(
        "--filethreads",
        args.file_threads.as_deref(),
        default_threads,
        &mut warnings,
    )
    .min(cpus);
    let ffmpeg_instances = resolve_limit(
        "--ffmpeginstances",
        args.ffmpeg_instances.as_deref(),
        default_instances,
        &mut warnings,
    );

    let recursive = if args.norecursive {
        false
    } else if args.recursive {
        true
    } else {
        config.settings.recursive_by_default
    };

    for token in &args.unrecognized {
        if token.starts_with("--") && token.contains('=') {
            warnings.push(format!(
                "Please separate flag and value: '{}' should be '--flag value'",
                token
            ));
        } else {
            warnings.push(format!("Unknown argument '{}' was ignored", token));
        }
    }

    let options = ScanOptions {
        target: args.target.clone(),
        mode: args.mode.unwrap_or(config.settings.default_scan_mode),
        file_threads,
        ffmpeg_instances,
        recursive,
        patterns_dir: args
            .patterns_dir
            .clone()
            .unwrap_or_else(|| config.working_dir.clone()),
        ffmpeg_bin: args.ffmpeg_bin.clone(),
        timeout: args.timeout.map(Duration::from_secs),
        extensions: config
            .settings
            .video_extensions
            .iter()
            .map(|e| e.to_lowercase())
            .collect(),
        progress_interval: Duration::from_millis(config.settings.progress_update_interval_ms),
    };

    (options, warnings)
}

fn resolve_limit(
    flag: &str,
    raw: Option<&str>,
    default: usize,
    warnings: &mut Vec<String>,
) -> usize {
    match raw {
        None => default,
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) if value >= 1 => value,
            Ok(_) => {
                warnings.push(format!("{} must be at least 1, using {}", flag, default));
                default
            }
            Err(_) => {
                warnings.push(format!(
                    "Invalid {} value '{}', using {}",
                    flag, raw, default
                ));
                default
            }
        },
    }
}

/// Walks the target and builds the fixed task list. This is the only place a
/// failure is fatal to the scan.
pub(crate) fn discover_files(
    target: &Path,
    recursive: bool,
    extensions: &[String],
) -> Result<Vec<ScanTask>, ScanError> {
    let metadata = std::fs::metadata(target).map_err(|error| ScanError::TargetUnreadable {
        path: target.display().to_string(),
        error,
    })?;
    if !metadata.is_dir() {
        return Err(ScanError::TargetNotDirectory {
            path: target.display().to_string(),
        });
    }

    let mut walker = WalkBuilder::new(target);
    walker.standard_filters(false);
    if !recursive {
        walker.max_depth(Some(1));
    }

    let mut tasks = Vec::new();
    for entry in walker.build() {
        match entry {
            Ok(entry) => {
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }
                let path = entry.into_path();
                if has_scan_extension(&path, extensions) {
                    tasks.push(ScanTask::new(path));
                }
            }
            Err(e) => warn!(target: "user", "Skipping unreadable entry: {}", e),
        }
    }

    tasks.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(tasks)
}

fn has_scan_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension() {
        Some(ext) => {
            let dotted = format!(".{}", ext.to_string_lossy().to_lowercase());
            extensions.iter().any(|e| e == &dotted)
        }
        None => false,
    }
}

fn print_banner(options: &ScanOptions, total: usize) {
    info!(target: "user", "Performing a {} scan of directory: {}", options.mode, options.target.display());
    info!(target: "user", "Using {} parallel workers, max {} ffmpeg processes", options.file_threads, options.ffmpeg_instances);
    info!(target: "user", "=== Scan Summary ===");
    info!(target: "user", "Formats to scan: {}", options.extensions.join(", "));
    info!(target: "user", "Recursive: {}", options.recursive);
    info!(target: "user", "Total files found: {}", total);
    info!(target: "user", "FFmpeg Command: {}", render_command(&options.ffmpeg_bin, options.mode));
}

pub async fn scan_root(found_config: &FoundConfig, args: &ScanArgs) -> Result<i32> {
    let (options, warnings) = resolve_options(args, found_config);
    for warning in &warnings {
        warn!(target: "user", "Warning: {}", warning);
    }

    let tasks = match discover_files(&options.target, options.recursive, &options.extensions) {
        Ok(tasks) => tasks,
        Err(e) => {
            error!(target: "always", "Error: {}", e);
            return Ok(2);
        }
    };

    let patterns = Arc::new(PatternSet::load(&options.patterns_dir));
    if patterns.is_empty() {
        warn!(target: "user", "No pattern files in {}, nonempty diagnostics will all classify as minor", options.patterns_dir.display());
    }

    print_banner(&options, tasks.len());

    let results = Arc::new(ScanResults::new(tasks.len()));
    let sink: Arc<dyn ProgressSink> = if found_config.progress_tty {
        Arc::new(IndicatifSink::new(tasks.len(), options.file_threads))
    } else {
        Arc::new(PlainSink)
    };
    let progress = Arc::new(ProgressRenderer::new(
        sink,
        options.file_threads,
        options.progress_interval,
    ));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "always", "Cancellation requested, letting in-flight work settle");
            signal_cancel.cancel();
        }
    });

    let analyzer: Arc<dyn MediaAnalyzer> = Arc::new(
        FfmpegAnalyzerBuilder::default()
            .binary(options.ffmpeg_bin.clone())
            .timeout(options.timeout)
            .build()?,
    );

    let scheduler = ScanSchedulerBuilder::default()
        .file_threads(options.file_threads)
        .ffmpeg_instances(options.ffmpeg_instances)
        .mode(options.mode)
        .analyzer(analyzer)
        .patterns(patterns)
        .results(results.clone())
        .progress(progress.clone())
        .cancel(cancel.clone())
        .build()?;

    progress.update(&results, results.total() == 0);
    scheduler.execute(tasks).await?;
    progress.finish();

    let snapshot = results.snapshot();
    info!(target: "always", "Scan complete! {} | {} | {}",
        format!("Major: {}", snapshot.major.len()).red(),
        format!("Minor: {}", snapshot.minor.len()).yellow(),
        format!("Clean: {}", snapshot.clean.len()).green(),
    );
    if !snapshot.skipped.is_empty() {
        info!(target: "always", "Skipped after cancellation: {}", snapshot.skipped.len());
    }

    let writer = ReportWriter::new(&found_config.working_dir);
    match writer.write(&snapshot) {
        Ok(path) => {
            info!(target: "always", "Output written to: {}", path.display());
            Ok(if snapshot.major.is_empty() { 0 } else { 1 })
        }
        Err(e) => {
            // the snapshot stays in memory, only persistence failed
            error!(target: "always", "Scan finished but the report could not be written: {}", e);
            Ok(3)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scan_args(target: &Path) -> ScanArgs {
        ScanArgs {
            target: target.to_path_buf(),
            mode: None,
            file_threads: None,
            ffmpeg_instances: None,
            recursive: false,
            norecursive: false,
            patterns_dir: None,
            ffmpeg_bin: "ffmpeg".to_string(),
            timeout: None,
            unrecognized: vec![],
        }
    }

    fn config() -> FoundConfig {
        FoundConfig::empty(PathBuf::from("/tmp"))
    }

    #[test]
    fn test_defaults_resolve_without_warnings() {
        let args = scan_args(Path::new("/media"));
        let (options, warnings) = resolve_options(&args, &config());

        assert!(warnings.is_empty());
        assert_eq!(ScanMode::Full, options.mode);
        assert_eq!(4, options.ffmpeg_instances);
        assert!(options.recursive);
        assert!(options.file_threads >= 1);
        assert_eq!(Duration::from_millis(250), options.progress_interval);
    }

    #[test]
    fn test_non_numeric_filethreads_warns_and_uses_default() {
        let mut args = scan_args(Path::new("/media"));
        args.file_threads = Some("abc".to_string());

        let (options, warnings) = resolve_options(&args, &config());

        assert_eq!(1, warnings.len());
        assert!(warnings[0].contains("--filethreads"));
        let cpus = std::thread::available_parallelism().unwrap().get();
        assert_eq!((cpus / 2).max(1), options.file_threads);
    }

    #[test]
    fn test_filethreads_clamped_to_processor_count() {
        let mut args = scan_args(Path::new("/media"));
        args.file_threads = Some("100000".to_string());

        let (options, warnings) = resolve_options(&args, &config());

        assert!(warnings.is_empty());
        let cpus = std::thread::available_parallelism().unwrap().get();
        assert_eq!(cpus, options.file_threads);
    }

    #[test]
    fn test_zero_instances_warns_and_uses_default() {
        let mut args = scan_args(Path::new("/media"));
        args.ffmpeg_instances = Some("0".to_string());

        let (options, warnings) = resolve_options(&args, &config());

        assert_eq!(1, warnings.len());
        assert_eq!(4, options.ffmpeg_instances);
    }

    #[test]
    fn test_norecursive_wins_over_config_default() {
        let mut args = scan_args(Path::new("/media"));
        args.norecursive = true;

        let (options, _) = resolve_options(&args, &config());
        assert!(!options.recursive);
    }

    #[test]
    fn test_unrecognized_tokens_warn_with_guidance() {
        let mut args = scan_args(Path::new("/media"));
        args.unrecognized = vec![
            "--filethreads=4".to_string(),
            "--bogus".to_string(),
        ];

        let (_, warnings) = resolve_options(&args, &config());

        assert_eq!(2, warnings.len());
        assert!(warnings[0].contains("should be '--flag value'"));
        assert!(warnings[1].contains("Unknown argument"));
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "x").unwrap();
    }

    fn extensions() -> Vec<String> {
        vec![".mp4".to_string(), ".mkv".to_string()]
    }

    #[test]
    fn test_discover_filters_by_extension_case_insensitively() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.mp4");
        touch(dir.path(), "b.MKV");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "noext");

        let tasks = discover_files(dir.path(), true, &extensions()).unwrap();

        let names: Vec<_> = tasks
            .iter()
            .map(|t| t.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(vec!["a.mp4", "b.MKV"], names);
        assert!(tasks.iter().all(|t| t.needs_tool));
    }

    #[test]
    fn test_discover_respects_norecursive() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "top.mp4");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "deep.mp4");

        let recursive = discover_files(dir.path(), true, &extensions()).unwrap();
        let flat = discover_files(dir.path(), false, &extensions()).unwrap();

        assert_eq!(2, recursive.len());
        assert_eq!(1, flat.len());
    }

    #[test]
    fn test_discover_missing_directory_is_fatal() {
        let result = discover_files(Path::new("/no/such/dir"), true, &extensions());
        assert!(matches!(result, Err(ScanError::TargetUnreadable { .. })));
    }

    #[test]
    fn test_discover_rejects_file_target() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.mp4");

        let result = discover_files(&dir.path().join("a.mp4"), true, &extensions());
        assert!(matches!(result, Err(ScanError::TargetNotDirectory { .. })));
    }
}
