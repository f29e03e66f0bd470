use super::classify::{classify, PatternSet, Severity};
use super::progress::ProgressRenderer;
use super::results::{FileOutcome, ScanResults};
use crate::shared::prelude::{AnalyzerError, MediaAnalyzer, ScanMode};
use anyhow::Result;
use derive_builder::Builder;
use educe::Educe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// One candidate file. `needs_tool` is false for extensions the analysis
/// tool does not handle; those classify clean without an invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanTask {
    pub path: PathBuf,
    pub needs_tool: bool,
}

impl ScanTask {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            needs_tool: true,
        }
    }
}

enum TaskResolution {
    Outcome(FileOutcome),
    Skipped(PathBuf),
}

/// Drives every task through invoke, classify, record, and display under two
/// nested limits: `file_threads` bounds tasks holding a worker slot,
/// `ffmpeg_instances` bounds live tool invocations inside those slots.
#[derive(Educe, Builder)]
#[educe(Debug)]
pub struct ScanScheduler {
    pub file_threads: usize,
    pub ffmpeg_instances: usize,
    pub mode: ScanMode,
    #[educe(Debug(ignore))]
    pub analyzer: Arc<dyn MediaAnalyzer>,
    pub patterns: Arc<PatternSet>,
    pub results: Arc<ScanResults>,
    #[educe(Debug(ignore))]
    pub progress: Arc<ProgressRenderer>,
    pub cancel: CancellationToken,
}

impl ScanScheduler {
    /// Processes every task exactly once and returns only after all of them
    /// have released their worker slot. Per-task failures become outcomes,
    /// never scheduler errors.
    #[instrument(skip_all, fields(tasks = tasks.len()))]
    pub async fn execute(&self, tasks: Vec<ScanTask>) -> Result<()> {
        let outer = Arc::new(Semaphore::new(self.file_threads.max(1)));
        let inner = Arc::new(Semaphore::new(self.ffmpeg_instances.max(1)));

        let mut workers = JoinSet::new();
        for task in tasks {
            let outer = outer.clone();
            let inner = inner.clone();
            let analyzer = self.analyzer.clone();
            let patterns = self.patterns.clone();
            let results = self.results.clone();
            let progress = self.progress.clone();
            let cancel = self.cancel.clone();
            let mode = self.mode;

            workers.spawn(async move {
                let _permit = outer
                    .acquire_owned()
                    .await
                    .expect("worker pool closed while scan in flight");

                let slot = progress.claim_slot(&task.path);

                let resolution =
                    run_task(task, mode, &inner, analyzer.as_ref(), &patterns, &cancel).await;
                let processed = match resolution {
                    TaskResolution::Outcome(outcome) => results.record(outcome),
                    TaskResolution::Skipped(path) => results.record_skipped(path),
                };

                progress.update(&results, processed == results.total());
                progress.release_slot(slot);
            });
        }

        while let Some(worker) = workers.join_next().await {
            worker?;
        }

        debug!("All {} tasks drained", self.results.total());
        Ok(())
    }
}

async fn run_task(
    task: ScanTask,
    mode: ScanMode,
    inner: &Arc<Semaphore>,
    analyzer: &dyn MediaAnalyzer,
    patterns: &PatternSet,
    cancel: &CancellationToken,
) -> TaskResolution {
    if !task.needs_tool {
        return TaskResolution::Outcome(FileOutcome::clean(task.path));
    }

    // Once cancellation is raised no new invocation may start; tasks that
    // were still waiting resolve as skipped instead of degrading.
    let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        permit = inner.clone().acquire_owned() => {
            Some(permit.expect("tool pool closed while scan in flight"))
        }
    };
    let Some(permit) = permit else {
        return TaskResolution::Skipped(task.path);
    };

    let invoked = analyzer.analyze(&task.path, mode, cancel.child_token()).await;
    // The tool slot gates only the subprocess; classification and
    // bookkeeping run outside it.
    drop(permit);

    let outcome = match invoked {
        Ok(output) => {
            let severity = classify(&output.diagnostic, patterns);
            FileOutcome::new(task.path, output.diagnostic, severity)
        }
        Err(error @ AnalyzerError::Cancelled) => {
            FileOutcome::new(task.path, error.to_string(), Severity::Major)
        }
        Err(error) => {
            warn!(target: "user", "{}: {}", task.path.display(), error);
            FileOutcome::new(task.path, error.to_string(), Severity::Major)
        }
    };
    TaskResolution::Outcome(outcome)
}
