use async_trait::async_trait;
use clap::ValueEnum;
use derive_builder::Builder;
use educe::Educe;
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use which::which;

/// How much of each file the analysis tool is asked to decode.
#[derive(
    ValueEnum, Serialize, Deserialize, strum::Display, Debug, Default, Copy, Clone, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanMode {
    /// Decode the entire file.
    #[default]
    Full,
    /// Decode only the first video frame.
    Fast,
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Unable to find `{name}` on PATH.")]
    MissingBinary { name: String },
    #[error("Unable to launch analysis process. {error:?}")]
    LaunchFailed {
        #[from]
        error: std::io::Error,
    },
    #[error("Analysis timed out after {}s and the process was terminated.", timeout.as_secs())]
    TimedOut { timeout: Duration },
    #[error("Analysis was cancelled and the process was terminated.")]
    Cancelled,
}

/// What came back from one tool invocation. An empty `diagnostic`
/// means the tool had nothing to complain about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzerOutput {
    pub diagnostic: String,
    pub exit_code: Option<i32>,
}

#[automock]
#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        path: &Path,
        mode: ScanMode,
        cancel: CancellationToken,
    ) -> Result<AnalyzerOutput, AnalyzerError>;
}

#[derive(Educe, Builder)]
#[educe(Debug)]
#[builder(setter(into))]
pub struct FfmpegAnalyzer {
    #[builder(default = "\"ffmpeg\".to_string()")]
    pub binary: String,
    /// Per-file wall clock limit. `None` lets the tool run to completion.
    #[builder(default)]
    pub timeout: Option<Duration>,
    /// Best-effort hint to run the tool below normal priority.
    /// Failure to apply it never fails the analysis.
    #[builder(default = "true")]
    pub lower_priority: bool,
}

impl Default for FfmpegAnalyzer {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            timeout: None,
            lower_priority: true,
        }
    }
}

/// The command line handed to the tool, with `<file>` standing in for the
/// target path. Shown to the user in the startup banner.
pub fn render_command(binary: &str, mode: ScanMode) -> String {
    format!("{} -v error -i <file>{} -f null -", binary, mode_args(mode))
}

fn mode_args(mode: ScanMode) -> &'static str {
    match mode {
        ScanMode::Full => "",
        ScanMode::Fast => " -frames:v 1",
    }
}

enum WaitOutcome {
    Finished((std::io::Result<std::process::ExitStatus>, Vec<String>)),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl MediaAnalyzer for FfmpegAnalyzer {
    #[instrument(skip_all, fields(file = %path.display()))]
    async fn analyze(
        &self,
        path: &Path,
        mode: ScanMode,
        cancel: CancellationToken,
    ) -> Result<AnalyzerOutput, AnalyzerError> {
        if cancel.is_cancelled() {
            return Err(AnalyzerError::Cancelled);
        }

        let binary = which(&self.binary).map_err(|_| AnalyzerError::MissingBinary {
            name: self.binary.to_string(),
        })?;

        let mut args: Vec<String> = vec![
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            path.display().to_string(),
        ];
        if mode == ScanMode::Fast {
            args.push("-frames:v".to_string());
            args.push("1".to_string());
        }
        args.push("-f".to_string());
        args.push("null".to_string());
        args.push("-".to_string());

        debug!("Executing {:?} {:?}", binary, args);

        let mut command = match self.lower_priority {
            // `nice` applies the priority hint; when it's unavailable
            // the tool runs at normal priority.
            true if which("nice").is_ok() => {
                let mut cmd = tokio::process::Command::new("nice");
                cmd.arg("-n").arg("10").arg(&binary);
                cmd
            }
            _ => tokio::process::Command::new(&binary),
        };

        let mut child = command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child.stderr.take().expect("stderr to be available");
        let drain = async move {
            let mut captured = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                captured.push(line);
            }
            captured
        };

        // The diagnostic stream is drained while awaiting exit, so a chatty
        // tool can never deadlock on a full pipe. Abandoning `run` on
        // timeout/cancel drops the child, which kills the process.
        let run = async { tokio::join!(child.wait(), drain) };
        tokio::pin!(run);

        let waited = match self.timeout {
            Some(limit) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => WaitOutcome::Cancelled,
                    _ = tokio::time::sleep(limit) => WaitOutcome::TimedOut,
                    finished = &mut run => WaitOutcome::Finished(finished),
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => WaitOutcome::Cancelled,
                    finished = &mut run => WaitOutcome::Finished(finished),
                }
            }
        };

        match waited {
            WaitOutcome::Cancelled => Err(AnalyzerError::Cancelled),
            WaitOutcome::TimedOut => Err(AnalyzerError::TimedOut {
                timeout: self.timeout.unwrap_or_default(),
            }),
            WaitOutcome::Finished((status, lines)) => {
                let exit_code = status.ok().and_then(|x| x.code());
                let diagnostic = lines
                    .iter()
                    .map(|line| line.trim())
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join("; ");
                debug!("Tool exited with {:?}, {} diagnostic lines", exit_code, lines.len());
                Ok(AnalyzerOutput {
                    diagnostic,
                    exit_code,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fake_tool(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-ffmpeg");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn analyzer_for(tool: &PathBuf) -> FfmpegAnalyzer {
        FfmpegAnalyzerBuilder::default()
            .binary(tool.display().to_string())
            .lower_priority(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_render_command_includes_mode_args() {
        assert_eq!(
            "ffmpeg -v error -i <file> -f null -",
            render_command("ffmpeg", ScanMode::Full)
        );
        assert_eq!(
            "ffmpeg -v error -i <file> -frames:v 1 -f null -",
            render_command("ffmpeg", ScanMode::Fast)
        );
    }

    #[tokio::test]
    async fn test_missing_binary_reported() {
        let analyzer = FfmpegAnalyzerBuilder::default()
            .binary("borkscan-no-such-binary")
            .build()
            .unwrap();

        let result = analyzer
            .analyze(Path::new("/tmp/a.mp4"), ScanMode::Full, CancellationToken::new())
            .await;

        assert!(matches!(result, Err(AnalyzerError::MissingBinary { .. })));
    }

    #[tokio::test]
    async fn test_clean_run_yields_empty_diagnostic() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(&dir, "exit 0");

        let output = analyzer_for(&tool)
            .analyze(Path::new("/tmp/a.mp4"), ScanMode::Full, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!("", output.diagnostic);
        assert_eq!(Some(0), output.exit_code);
    }

    #[tokio::test]
    async fn test_stderr_lines_joined_into_diagnostic() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(
            &dir,
            "echo 'moov atom not found' >&2\necho 'invalid data found' >&2\nexit 1",
        );

        let output = analyzer_for(&tool)
            .analyze(Path::new("/tmp/a.mp4"), ScanMode::Full, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!("moov atom not found; invalid data found", output.diagnostic);
        assert_eq!(Some(1), output.exit_code);
    }

    #[tokio::test]
    async fn test_timeout_terminates_process() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(&dir, "sleep 10");

        let analyzer = FfmpegAnalyzerBuilder::default()
            .binary(tool.display().to_string())
            .timeout(Some(Duration::from_millis(100)))
            .lower_priority(false)
            .build()
            .unwrap();

        let result = analyzer
            .analyze(Path::new("/tmp/a.mp4"), ScanMode::Full, CancellationToken::new())
            .await;

        assert!(matches!(result, Err(AnalyzerError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_never_launches() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let tool = fake_tool(&dir, &format!("touch {}", marker.display()));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = analyzer_for(&tool)
            .analyze(Path::new("/tmp/a.mp4"), ScanMode::Full, cancel)
            .await;

        assert!(matches!(result, Err(AnalyzerError::Cancelled)));
        assert!(!marker.exists());
    }
}
