mod classify;
mod cli;
mod error;
mod progress;
mod report;
mod results;
mod runner;

pub mod prelude {
    pub use super::classify::{
        classify, PatternSet, Severity, MAJOR_PATTERN_FILE, MINOR_PATTERN_FILE,
    };
    pub use super::cli::{scan_root, ScanArgs};
    pub use super::error::ScanError;
    pub use super::progress::{
        IndicatifSink, PlainSink, ProgressFrame, ProgressRenderer, ProgressSink, RecordingSink,
    };
    pub use super::report::{render, ReportError, ReportWriter, REPORT_DIR_NAME};
    pub use super::results::{FileOutcome, ScanResults, ScanSnapshot, SeverityCounts};
    pub use super::runner::{ScanScheduler, ScanSchedulerBuilder, ScanTask};
}
