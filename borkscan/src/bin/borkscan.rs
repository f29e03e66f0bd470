use borkscan::prelude::*;
use clap::Parser;
use human_panic::setup_panic;
use tracing::{enabled, error, info, level_filters::LevelFilter, Level};

/// borkscan
///
/// Scans a directory of media files with ffmpeg, grades each file's
/// diagnostics against known error patterns, and writes a report
/// splitting the files into major, minor, and clean.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(flatten)]
    logging: LoggingOpts,

    #[clap(flatten)]
    config: ConfigOptions,

    #[clap(flatten)]
    scan: ScanArgs,
}

#[tokio::main]
async fn main() {
    setup_panic!();
    let opts = Cli::parse();

    // Banner and summary lines are info-level; the default WARN would
    // swallow them.
    let logging = opts.logging.with_new_default(LevelFilter::INFO);
    let (_guard, file_location) = logging.configure_logging(&opts.config.get_run_id(), "scan");

    let error_code = run_scan(&opts, logging.progress.is_tty()).await;

    if error_code != 0 || enabled!(Level::DEBUG) {
        info!(target: "user", "More detailed logs at {}", file_location);
    }

    std::process::exit(error_code);
}

async fn run_scan(opts: &Cli, progress_tty: bool) -> i32 {
    let found_config = match opts.config.load_config(progress_tty) {
        Err(e) => {
            error!(target: "user", "Failed to load configuration: {}", e);
            return 2;
        }
        Ok(c) => c,
    };

    scan_root(&found_config, &opts.scan)
        .await
        .unwrap_or_else(|e| {
            error!(target: "user", "Critical Error. {}", e);
            2
        })
}
