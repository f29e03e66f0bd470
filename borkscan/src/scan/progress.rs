use super::results::{ScanResults, SeverityCounts};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// One full redraw worth of state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressFrame {
    pub processed: usize,
    pub total: usize,
    pub counts: SeverityCounts,
    pub slots: Vec<Option<PathBuf>>,
}

/// Where frames get drawn. Production uses the terminal; tests record.
pub trait ProgressSink: Send + Sync {
    fn draw(&self, frame: &ProgressFrame);
    fn clear(&self);
}

pub struct IndicatifSink {
    multi: MultiProgress,
    overall: ProgressBar,
    slots: Vec<ProgressBar>,
}

impl IndicatifSink {
    pub fn new(total: usize, slot_count: usize) -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let overall = multi.add(ProgressBar::new(total as u64));
        overall.set_style(
            ProgressStyle::with_template("[{bar:30.cyan}] {percent:>3}% | {msg}")
                .unwrap()
                .progress_chars("##-"),
        );

        let mut slots = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            let slot = multi.add(ProgressBar::no_length());
            slot.set_style(ProgressStyle::with_template("{prefix} {wide_msg}").unwrap());
            slot.set_prefix(format!("worker {}:", i + 1));
            slots.push(slot);
        }

        Self {
            multi,
            overall,
            slots,
        }
    }
}

impl ProgressSink for IndicatifSink {
    fn draw(&self, frame: &ProgressFrame) {
        self.overall.set_position(frame.processed as u64);
        self.overall.set_message(format!(
            "{} | {} | {}",
            format!("Major: {}", frame.counts.major).red(),
            format!("Minor: {}", frame.counts.minor).yellow(),
            format!("Clean: {}", frame.counts.clean).green(),
        ));

        for (bar, slot) in self.slots.iter().zip(frame.slots.iter()) {
            match slot {
                Some(path) => bar.set_message(file_name(path)),
                None => bar.set_message(""),
            }
        }
    }

    fn clear(&self) {
        self.multi.clear().ok();
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Plain-mode fallback, one log line per redraw.
#[derive(Default)]
pub struct PlainSink;

impl ProgressSink for PlainSink {
    fn draw(&self, frame: &ProgressFrame) {
        info!(target: "progress",
            "{}/{} processed | Major: {} | Minor: {} | Clean: {}",
            frame.processed, frame.total,
            frame.counts.major, frame.counts.minor, frame.counts.clean,
        );
    }

    fn clear(&self) {}
}

/// Captures frames instead of drawing them, for asserting on throttle and
/// slot behavior without a terminal.
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<ProgressFrame>>,
    cleared: Mutex<bool>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<ProgressFrame> {
        self.frames.lock().expect("sink lock poisoned").clone()
    }

    pub fn was_cleared(&self) -> bool {
        *self.cleared.lock().expect("sink lock poisoned")
    }
}

impl ProgressSink for RecordingSink {
    fn draw(&self, frame: &ProgressFrame) {
        self.frames
            .lock()
            .expect("sink lock poisoned")
            .push(frame.clone());
    }

    fn clear(&self) {
        *self.cleared.lock().expect("sink lock poisoned") = true;
    }
}

#[derive(Debug)]
struct DisplayState {
    slots: Vec<Option<PathBuf>>,
    last_draw: Option<Instant>,
}

/// Throttled live display. The slot table and the redraw path share one
/// mutex, so a worker's busy/idle mark and the frame that shows it are never
/// observed half-updated.
pub struct ProgressRenderer {
    sink: std::sync::Arc<dyn ProgressSink>,
    state: Mutex<DisplayState>,
    interval: Duration,
}

impl ProgressRenderer {
    pub fn new(
        sink: std::sync::Arc<dyn ProgressSink>,
        slot_count: usize,
        interval: Duration,
    ) -> Self {
        Self {
            sink,
            state: Mutex::new(DisplayState {
                slots: vec![None; slot_count],
                last_draw: None,
            }),
            interval,
        }
    }

    /// Marks the first free slot busy with `path`. `None` when every slot is
    /// taken, which a correctly sized outer pool never produces.
    pub fn claim_slot(&self, path: &Path) -> Option<usize> {
        let mut state = self.state.lock().expect("display lock poisoned");
        let index = state.slots.iter().position(|slot| slot.is_none())?;
        state.slots[index] = Some(path.to_path_buf());
        Some(index)
    }

    pub fn release_slot(&self, slot: Option<usize>) {
        if let Some(index) = slot {
            let mut state = self.state.lock().expect("display lock poisoned");
            state.slots[index] = None;
        }
    }

    /// Redraws at most once per interval, except the final update which
    /// always draws so the closing frame is accurate.
    pub fn update(&self, results: &ScanResults, is_final: bool) {
        let mut state = self.state.lock().expect("display lock poisoned");

        let due = match state.last_draw {
            None => true,
            Some(at) => at.elapsed() >= self.interval,
        };
        if !due && !is_final {
            return;
        }

        let frame = ProgressFrame {
            processed: results.processed(),
            total: results.total(),
            counts: results.counts(),
            slots: state.slots.clone(),
        };
        self.sink.draw(&frame);
        state.last_draw = Some(Instant::now());
    }

    /// Clears the live region so the summary lines land on a clean screen.
    pub fn finish(&self) {
        let _state = self.state.lock().expect("display lock poisoned");
        self.sink.clear();
    }
}
