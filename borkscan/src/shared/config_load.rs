use super::analyzer::ScanMode;
use anyhow::{anyhow, Result};
use clap::{ArgGroup, Parser};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "borkscan.json";
pub const RUN_ID_ENV_VAR: &str = "BORKSCAN_RUN_ID";

#[derive(Parser, Debug)]
#[clap(group = ArgGroup::new("config"))]
pub struct ConfigOptions {
    /// Override the working directory
    #[arg(long, short = 'C', global(true))]
    working_dir: Option<String>,

    /// When outputting logs, or other files, the run-id is the unique value that will define where these go.
    /// In the case that the run-id is re-used, the old values will be overwritten.
    #[arg(long, global(true), env = RUN_ID_ENV_VAR)]
    run_id: Option<String>,
}

/// Defaults read from an optional `borkscan.json` in the working directory.
/// A broken config file degrades to the built-in defaults, never a failure.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanSettings {
    pub video_extensions: Vec<String>,
    pub default_scan_mode: ScanMode,
    pub default_file_threads: Option<usize>,
    pub default_ffmpeg_instances: usize,
    pub recursive_by_default: bool,
    pub progress_update_interval_ms: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            video_extensions: vec![
                ".mp4".to_string(),
                ".mkv".to_string(),
                ".avi".to_string(),
                ".mov".to_string(),
                ".webm".to_string(),
            ],
            default_scan_mode: ScanMode::Full,
            default_file_threads: None,
            default_ffmpeg_instances: 4,
            recursive_by_default: true,
            progress_update_interval_ms: 250,
        }
    }
}

impl ScanSettings {
    fn load(working_dir: &Path) -> Self {
        let config_path = working_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Self::default();
        }

        debug!("Loading settings from {}", config_path.display());
        let text = match std::fs::read_to_string(&config_path) {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "user", "Unable to read {}, using defaults. {}", config_path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(target: "user", "Malformed {}, using defaults. {}", CONFIG_FILE_NAME, e);
                Self::default()
            }
        }
    }
}

impl ConfigOptions {
    pub fn generate_run_id() -> String {
        let id = nanoid::nanoid!(4, &nanoid::alphabet::SAFE);
        let now = chrono::Local::now();
        let current_time = now.format("%Y%m%d");
        format!("{}-{}", current_time, id)
    }

    pub fn get_run_id(&self) -> String {
        self.run_id.clone().unwrap_or_else(Self::generate_run_id)
    }

    pub fn load_config(&self, progress_tty: bool) -> Result<FoundConfig> {
        let current_dir = std::env::current_dir();
        let working_dir = match (current_dir, &self.working_dir) {
            (Ok(cwd), None) => cwd,
            (_, Some(dir)) => PathBuf::from(&dir),
            _ => {
                return Err(anyhow!("Unable to get a working dir"));
            }
        };

        let settings = ScanSettings::load(&working_dir);
        let found_config = FoundConfig {
            run_id: self.get_run_id(),
            working_dir,
            settings,
            progress_tty,
        };

        debug!("Loaded config {:?}", found_config);

        Ok(found_config)
    }
}

#[derive(Debug, Clone)]
pub struct FoundConfig {
    pub working_dir: PathBuf,
    pub run_id: String,
    pub settings: ScanSettings,
    pub progress_tty: bool,
}

impl FoundConfig {
    pub fn empty(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            run_id: ConfigOptions::generate_run_id(),
            settings: ScanSettings::default(),
            progress_tty: false,
        }
    }
}
