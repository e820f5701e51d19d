//! Process-wide classification counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Counters for one run of the agent.
#[derive(Debug)]
pub struct ClassificationStats {
    /// Identifier for this run
    run_id: Uuid,
    /// Raw lines pulled from the source
    lines_read: AtomicU64,
    /// Lines accepted as readings
    readings_accepted: AtomicU64,
    /// Data lines rejected by the parser
    parse_errors: AtomicU64,
    /// Windows that resolved to a label (sentinels included)
    classifications: AtomicU64,
    /// Labels appended to the classification log
    labels_logged: AtomicU64,
    /// Failed log appends
    log_failures: AtomicU64,
    /// Windows resolved to a neutral sentinel (`idle` by default)
    idle: AtomicU64,
    /// Windows resolved to an alert sentinel (`anomaly` by default)
    anomalies: AtomicU64,
    /// Process start time
    session_start: DateTime<Utc>,
}

impl ClassificationStats {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            lines_read: AtomicU64::new(0),
            readings_accepted: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            classifications: AtomicU64::new(0),
            labels_logged: AtomicU64::new(0),
            log_failures: AtomicU64::new(0),
            idle: AtomicU64::new(0),
            anomalies: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_line_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reading_accepted(&self) {
        self.readings_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a resolved window and return the new total.
    pub fn record_classification(&self) -> u64 {
        self.classifications.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_label_logged(&self) {
        self.labels_logged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_log_failure(&self) {
        self.log_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle(&self) {
        self.idle.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_anomaly(&self) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    /// Total resolved windows so far.
    pub fn classifications(&self) -> u64 {
        self.classifications.load(Ordering::Relaxed)
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            run_id: self.run_id,
            lines_read: self.lines_read.load(Ordering::Relaxed),
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            classifications: self.classifications.load(Ordering::Relaxed),
            labels_logged: self.labels_logged.load(Ordering::Relaxed),
            log_failures: self.log_failures.load(Ordering::Relaxed),
            idle: self.idle.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        self.snapshot().summary()
    }

    /// Write the current snapshot as JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot()).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl Default for ClassificationStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub run_id: Uuid,
    pub lines_read: u64,
    pub readings_accepted: u64,
    pub parse_errors: u64,
    pub classifications: u64,
    pub labels_logged: u64,
    pub log_failures: u64,
    pub idle: u64,
    pub anomalies: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl StatsSnapshot {
    /// Load a snapshot previously written by [`ClassificationStats::save`].
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    pub fn summary(&self) -> String {
        format!(
            "Session Statistics:\n\
             - Lines read: {}\n\
             - Readings accepted: {}\n\
             - Parse errors: {}\n\
             - Classifications: {} ({} idle, {} anomaly)\n\
             - Labels logged: {}\n\
             - Log write failures: {}\n\
             - Session duration: {} seconds",
            self.lines_read,
            self.readings_accepted,
            self.parse_errors,
            self.classifications,
            self.idle,
            self.anomalies,
            self.labels_logged,
            self.log_failures,
            self.session_duration_secs
        )
    }
}

/// Thread-safe shared stats.
pub type SharedStats = Arc<ClassificationStats>;

/// Create a new shared stats handle.
pub fn create_shared_stats() -> SharedStats {
    Arc::new(ClassificationStats::new())
}
