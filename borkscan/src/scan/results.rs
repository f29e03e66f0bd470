use super::classify::Severity;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub diagnostic: String,
    pub severity: Severity,
}

impl FileOutcome {
    pub fn new(path: PathBuf, diagnostic: String, severity: Severity) -> Self {
        Self {
            path,
            diagnostic,
            severity,
        }
    }

    pub fn clean(path: PathBuf) -> Self {
        Self::new(path, String::new(), Severity::Clean)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeverityCounts {
    pub major: usize,
    pub minor: usize,
    pub clean: usize,
    pub skipped: usize,
}

/// Shared accumulation of per-file outcomes. Collections are append-only and
/// unordered; `processed` moves exactly once per task. Callers never need
/// their own lock.
#[derive(Debug)]
pub struct ScanResults {
    total: usize,
    processed: AtomicUsize,
    major: Mutex<Vec<FileOutcome>>,
    minor: Mutex<Vec<FileOutcome>>,
    clean: Mutex<Vec<FileOutcome>>,
    skipped: Mutex<Vec<PathBuf>>,
}

impl ScanResults {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: AtomicUsize::new(0),
            major: Mutex::new(Vec::new()),
            minor: Mutex::new(Vec::new()),
            clean: Mutex::new(Vec::new()),
            skipped: Mutex::new(Vec::new()),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Stores the outcome in exactly one bucket. Returns how many tasks have
    /// completed including this one.
    pub fn record(&self, outcome: FileOutcome) -> usize {
        let bucket = match outcome.severity {
            Severity::Major => &self.major,
            Severity::Minor => &self.minor,
            Severity::Clean => &self.clean,
        };
        bucket.lock().expect("results lock poisoned").push(outcome);
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Used only when cancellation resolves a task before its invocation
    /// started. Still counts toward `processed`.
    pub fn record_skipped(&self, path: PathBuf) -> usize {
        self.skipped.lock().expect("results lock poisoned").push(path);
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn counts(&self) -> SeverityCounts {
        SeverityCounts {
            major: self.major.lock().expect("results lock poisoned").len(),
            minor: self.minor.lock().expect("results lock poisoned").len(),
            clean: self.clean.lock().expect("results lock poisoned").len(),
            skipped: self.skipped.lock().expect("results lock poisoned").len(),
        }
    }

    /// Consistent view for the report writer. Only meaningful after the
    /// scheduler has fully drained; this type makes no read-during-write
    /// promises.
    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            total: self.total,
            major: self.major.lock().expect("results lock poisoned").clone(),
            minor: self.minor.lock().expect("results lock poisoned").clone(),
            clean: self.clean.lock().expect("results lock poisoned").clone(),
            skipped: self.skipped.lock().expect("results lock poisoned").clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanSnapshot {
    pub total: usize,
    pub major: Vec<FileOutcome>,
    pub minor: Vec<FileOutcome>,
    pub clean: Vec<FileOutcome>,
    pub skipped: Vec<PathBuf>,
}
