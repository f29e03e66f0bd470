use super::results::{FileOutcome, ScanSnapshot};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REPORT_DIR_NAME: &str = "BorkScans";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Unable to create report directory {path}. {error:?}")]
    CreateDirFailed {
        path: String,
        error: std::io::Error,
    },
    #[error("Unable to write report to {path}. {error:?}")]
    WriteFailed {
        path: String,
        error: std::io::Error,
    },
}

/// Writes the final snapshot as `BorkScans/BorkScan_<timestamp>.txt` under
/// the working directory. A failed write surfaces as an error; the snapshot
/// itself stays with the caller.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            output_dir: working_dir.join(REPORT_DIR_NAME),
        }
    }

    pub fn write(&self, snapshot: &ScanSnapshot) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|error| {
            ReportError::CreateDirFailed {
                path: self.output_dir.display().to_string(),
                error,
            }
        })?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let report_path = self.output_dir.join(format!("BorkScan_{}.txt", timestamp));

        std::fs::write(&report_path, render(snapshot)).map_err(|error| {
            ReportError::WriteFailed {
                path: report_path.display().to_string(),
                error,
            }
        })?;

        Ok(report_path)
    }
}

/// Sections always render in the same order so reports diff cleanly between
/// runs. Skipped files appear only when a cancelled run produced them.
pub fn render(snapshot: &ScanSnapshot) -> String {
    let mut out = String::new();

    out.push_str("=== MAJOR ERRORS ===\n");
    render_outcomes(&mut out, &snapshot.major);

    out.push_str("=== MINOR ERRORS ===\n");
    render_outcomes(&mut out, &snapshot.minor);

    out.push_str("=== CLEAN FILES ===\n");
    for outcome in sorted_by_path(&snapshot.clean) {
        out.push_str(&format!("{}\n", outcome.path.display()));
    }

    if !snapshot.skipped.is_empty() {
        out.push_str("=== SKIPPED ===\n");
        for path in snapshot.skipped.iter().sorted() {
            out.push_str(&format!("{}\n", path.display()));
        }
    }

    out
}

fn render_outcomes(out: &mut String, outcomes: &[FileOutcome]) {
    for outcome in sorted_by_path(outcomes) {
        out.push_str(&format!("File: {}\n", outcome.path.display()));
        out.push_str("Error(s):\n");
        for chunk in outcome.diagnostic.split(';') {
            let trimmed = chunk.trim();
            if !trimmed.is_empty() {
                out.push_str(&format!("  - {}\n", trimmed));
            }
        }
        out.push('\n');
    }
}

fn sorted_by_path(outcomes: &[FileOutcome]) -> Vec<&FileOutcome> {
    outcomes.iter().sorted_by_key(|o| &o.path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::classify::Severity;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn snapshot() -> ScanSnapshot {
        ScanSnapshot {
            total: 3,
            major: vec![FileOutcome::new(
                PathBuf::from("/media/bad.mp4"),
                "moov atom not found; invalid data".to_string(),
                Severity::Major,
            )],
            minor: vec![FileOutcome::new(
                PathBuf::from("/media/odd.mkv"),
                "unexpected atom".to_string(),
                Severity::Minor,
            )],
            clean: vec![FileOutcome::clean(PathBuf::from("/media/good.avi"))],
            skipped: vec![],
        }
    }

    #[test]
    fn test_sections_render_in_fixed_order() {
        let body = render(&snapshot());

        let major_at = body.find("=== MAJOR ERRORS ===").unwrap();
        let minor_at = body.find("=== MINOR ERRORS ===").unwrap();
        let clean_at = body.find("=== CLEAN FILES ===").unwrap();
        assert!(major_at < minor_at);
        assert!(minor_at < clean_at);
        assert!(!body.contains("=== SKIPPED ==="));
    }

    #[test]
    fn test_diagnostics_split_into_bullets() {
        let body = render(&snapshot());

        assert!(body.contains("File: /media/bad.mp4"));
        assert!(body.contains("  - moov atom not found\n"));
        assert!(body.contains("  - invalid data\n"));
        assert!(body.contains("/media/good.avi\n"));
    }

    #[test]
    fn test_empty_snapshot_keeps_all_sections() {
        let body = render(&ScanSnapshot::default());

        assert_eq!(
            "=== MAJOR ERRORS ===\n=== MINOR ERRORS ===\n=== CLEAN FILES ===\n",
            body
        );
    }

    #[test]
    fn test_skipped_section_present_after_cancellation() {
        let mut cancelled = snapshot();
        cancelled.skipped = vec![PathBuf::from("/media/later.mp4")];

        let body = render(&cancelled);
        assert!(body.contains("=== SKIPPED ===\n/media/later.mp4\n"));
    }

    #[test]
    fn test_write_creates_timestamped_file() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path());

        let path = writer.write(&snapshot()).unwrap();

        assert!(path.starts_with(dir.path().join(REPORT_DIR_NAME)));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("BorkScan_"));
        assert!(name.ends_with(".txt"));

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("=== MAJOR ERRORS ==="));
    }

    #[test]
    fn test_write_failure_is_surfaced() {
        let dir = TempDir::new().unwrap();
        // occupy the report directory name with a file
        std::fs::write(dir.path().join(REPORT_DIR_NAME), "in the way").unwrap();

        let writer = ReportWriter::new(dir.path());
        let result = writer.write(&snapshot());

        assert!(matches!(result, Err(ReportError::CreateDirFailed { .. })));
    }
}
