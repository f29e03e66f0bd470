use std::path::Path;
use strum::Display;
use tracing::debug;

pub const MAJOR_PATTERN_FILE: &str = "MajorErrorPatterns.txt";
pub const MINOR_PATTERN_FILE: &str = "MinorErrorPatterns.txt";

#[derive(Display, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    Major,
    Minor,
    Clean,
}

/// Ordered, lowercase substrings used to grade diagnostic text.
/// Loaded once during run setup and shared read-only by every worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternSet {
    major: Vec<String>,
    minor: Vec<String>,
}

impl PatternSet {
    pub fn new(major: Vec<String>, minor: Vec<String>) -> Self {
        Self {
            major: normalize(major),
            minor: normalize(minor),
        }
    }

    /// Reads `MajorErrorPatterns.txt` and `MinorErrorPatterns.txt` from `dir`.
    /// A missing file leaves that tier empty, pushing classification toward
    /// the minor fallback.
    pub fn load(dir: &Path) -> Self {
        Self {
            major: read_patterns(&dir.join(MAJOR_PATTERN_FILE)),
            minor: read_patterns(&dir.join(MINOR_PATTERN_FILE)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.major.is_empty() && self.minor.is_empty()
    }
}

fn normalize(patterns: Vec<String>) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

fn read_patterns(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => normalize(text.lines().map(|l| l.to_string()).collect()),
        Err(_) => {
            debug!("No pattern file at {}", path.display());
            Vec::new()
        }
    }
}

/// Grades one file's diagnostic text. Rules apply in order:
/// empty text is clean, any major pattern wins over any minor pattern,
/// and nonempty text matching nothing falls back to minor so an
/// unexplained diagnostic is never silently discarded.
pub fn classify(diagnostic: &str, patterns: &PatternSet) -> Severity {
    if diagnostic.is_empty() {
        return Severity::Clean;
    }

    let lowered = diagnostic.to_lowercase();
    if patterns.major.iter().any(|p| lowered.contains(p)) {
        return Severity::Major;
    }
    if patterns.minor.iter().any(|p| lowered.contains(p)) {
        return Severity::Minor;
    }

    Severity::Minor
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn patterns() -> PatternSet {
        PatternSet::new(
            vec!["moov".to_string(), "header missing".to_string()],
            vec!["invalid data".to_string()],
        )
    }

    #[test]
    fn test_empty_diagnostic_is_clean() {
        assert_eq!(Severity::Clean, classify("", &patterns()));
    }

    #[test]
    fn test_major_pattern_matches() {
        assert_eq!(
            Severity::Major,
            classify("moov atom not found", &patterns())
        );
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert_eq!(
            Severity::Major,
            classify("MOOV ATOM NOT FOUND", &patterns())
        );
    }

    #[test]
    fn test_major_wins_over_minor_on_overlap() {
        assert_eq!(
            Severity::Major,
            classify("invalid data; moov atom not found", &patterns())
        );
    }

    #[test]
    fn test_minor_pattern_matches() {
        assert_eq!(
            Severity::Minor,
            classify("invalid data found when processing input", &patterns())
        );
    }

    #[test]
    fn test_unmatched_nonempty_falls_back_to_minor() {
        assert_eq!(
            Severity::Minor,
            classify("unexpected atom type", &patterns())
        );
    }

    #[test]
    fn test_empty_pattern_set_still_flags_diagnostics() {
        assert_eq!(
            Severity::Minor,
            classify("anything at all", &PatternSet::default())
        );
    }

    #[test]
    fn test_load_skips_blank_lines_and_lowercases() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(MAJOR_PATTERN_FILE),
            "MOOV\n\n  Header Missing  \n",
        )
        .unwrap();

        let loaded = PatternSet::load(dir.path());
        assert_eq!(
            PatternSet::new(
                vec!["moov".to_string(), "header missing".to_string()],
                vec![]
            ),
            loaded
        );
    }

    #[test]
    fn test_load_with_no_files_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(PatternSet::load(dir.path()).is_empty());
    }
}
