mod analyzer;
mod config_load;
mod logging;

pub mod prelude {
    pub use super::analyzer::{
        render_command, AnalyzerError, AnalyzerOutput, FfmpegAnalyzer, FfmpegAnalyzerBuilder,
        MediaAnalyzer, MockMediaAnalyzer, ScanMode,
    };
    pub use super::config_load::{
        ConfigOptions, FoundConfig, ScanSettings, CONFIG_FILE_NAME, RUN_ID_ENV_VAR,
    };
    pub use super::logging::{LoggingOpts, LoggingProgress};
}
