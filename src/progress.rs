//! Progress reporting for scan operations
//!
//! `ProgressReporter` keeps the current scan position for display and can
//! optionally mirror it to stderr as JSON lines for external callers.

use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::models::ScanSummary;

/// Current scan position, as shown by a progress indicator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Whether a scan is in progress
    pub active: bool,
    /// Name of the file being loaded
    pub current_file: String,
    /// Files processed before the current one
    pub processed: u64,
    /// Files counted by the first pass
    pub total: u64,
}

impl ProgressSnapshot {
    /// Fraction of the loading pass completed, in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64).min(1.0)
    }
}

/// Start message sent when scan begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Scan root paths
    pub roots: Vec<String>,
}

impl StartMessage {
    pub fn new(seq: u64, ts: u64, roots: Vec<String>) -> Self {
        Self {
            msg_type: "start",
            seq,
            ts,
            roots,
        }
    }
}

/// Progress message sent during the loading pass
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Current file name
    #[serde(rename = "f")]
    pub file: String,
    /// Files processed
    #[serde(rename = "n")]
    pub processed: u64,
    /// Files counted by the first pass
    #[serde(rename = "t")]
    pub total: u64,
}

impl ProgressMessage {
    pub fn new(seq: u64, ts: u64, file: String, processed: u64, total: u64) -> Self {
        Self {
            msg_type: "p",
            seq,
            ts,
            file,
            processed,
            total,
        }
    }
}

/// Done message sent when scan completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Total number of files loaded
    #[serde(rename = "tf")]
    pub total_files: u64,
    /// Number of new records
    #[serde(rename = "nf")]
    pub new_files: u64,
    /// Number of records removed from the store
    #[serde(rename = "rf")]
    pub removed_files: u64,
    /// Number of errors encountered
    #[serde(rename = "ec")]
    pub error_count: usize,
    /// Total scan duration in milliseconds
    pub ms: u64,
}

impl DoneMessage {
    pub fn from_summary(seq: u64, ts: u64, summary: &ScanSummary) -> Self {
        Self {
            msg_type: "done",
            seq,
            ts,
            total_files: summary.loaded_files,
            new_files: summary.new_files,
            removed_files: summary.removed_files,
            error_count: summary.error_count(),
            ms: summary.duration_ms,
        }
    }
}

/// Tracks scan progress for display
pub struct ProgressReporter {
    state: Mutex<ProgressSnapshot>,
    /// Whether JSON lines are written to stderr
    emit: bool,
    /// Reporting interval in milliseconds
    interval_ms: u64,
    /// Last time a progress line was written
    last_report: Mutex<Option<Instant>>,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Start time of the reporter
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a reporter that only tracks state
    pub fn new() -> Self {
        Self::with_output(false, 0)
    }

    /// Create a reporter that also writes throttled JSON lines to stderr
    pub fn with_output(emit: bool, interval_ms: u64) -> Self {
        Self {
            state: Mutex::new(ProgressSnapshot::default()),
            emit,
            interval_ms,
            last_report: Mutex::new(None),
            seq: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Mark a scan as started
    pub fn begin(&self, roots: &[PathBuf]) {
        *self.state.lock() = ProgressSnapshot {
            active: true,
            ..Default::default()
        };
        *self.last_report.lock() = None;

        if self.emit {
            let roots = roots
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            self.output_to_stderr(&StartMessage::new(
                self.next_seq(),
                self.current_timestamp(),
                roots,
            ));
        }
    }

    /// Record the file currently being loaded
    pub fn update(&self, current_file: &str, processed: u64, total: u64) {
        {
            let mut state = self.state.lock();
            state.current_file.clear();
            state.current_file.push_str(current_file);
            state.processed = processed;
            state.total = total;
        }

        if self.should_report() {
            self.output_to_stderr(&ProgressMessage::new(
                self.next_seq(),
                self.current_timestamp(),
                current_file.to_string(),
                processed,
                total,
            ));
            *self.last_report.lock() = Some(Instant::now());
        }
    }

    /// Clear the progress state once a scan is over
    pub fn end(&self, summary: &ScanSummary) {
        *self.state.lock() = ProgressSnapshot::default();

        if self.emit {
            self.output_to_stderr(&DoneMessage::from_summary(
                self.next_seq(),
                self.current_timestamp(),
                summary,
            ));
        }
    }

    /// Copy of the current progress state
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().clone()
    }

    /// Whether a scan is currently reporting progress
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Check if enough time has passed since the last progress line
    fn should_report(&self) -> bool {
        if !self.emit {
            return false;
        }
        match *self.last_report.lock() {
            None => true,
            Some(last) => last.elapsed().as_millis() as u64 >= self.interval_ms,
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
            std::io::stderr().flush().ok();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
