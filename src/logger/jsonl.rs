//! JSONL logger: append-only line-delimited JSON for the scan activity trail.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written with a single `write_all` to prevent interleaved partial lines
//! when the file is being tailed by another process.
//!
//! Degradation chain:
//! 1. Primary file path
//! 2. stderr with `[ISN-JSONL]` prefix
//! 3. Silent discard (a cron run must never crash for logging failures)

#![allow(missing_docs)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Log event types matching the scan activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ScanStart,
    ScanComplete,
    SnapshotWritten,
    NotificationSent,
    Error,
}

/// A single JSONL log entry — all fields optional except `ts`, `event`,
/// `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: EventType,
    /// Severity level.
    pub severity: Severity,
    /// Number of configured scan roots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<usize>,
    /// Checksum results aggregated this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_seen: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_count: Option<usize>,
    /// Whether the scan ran to completion (false after cancellation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
    /// Duration of the scan in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Whether the action succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// ISN error code if the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Snapshot file involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<String>,
    /// Stable hash of the effective configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            severity,
            roots: None,
            files_seen: None,
            new_files: None,
            changed_files: None,
            missing_files: None,
            error_count: None,
            complete: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            snapshot_path: None,
            config_hash: None,
            details: None,
        }
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Writing to the primary path.
    Normal,
    /// Primary failed; writing to stderr. Sticky for the rest of the run.
    Stderr,
}

/// Append-only JSONL writer.
pub struct JsonlWriter {
    path: PathBuf,
    state: WriterState,
}

impl JsonlWriter {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: WriterState::Normal,
        }
    }

    /// Append one entry. Never fails: on primary-path trouble the writer
    /// degrades to stderr for the rest of the run.
    pub fn write(&mut self, entry: &LogEntry) {
        let Ok(json) = serde_json::to_string(entry) else {
            return;
        };

        if self.state == WriterState::Normal {
            match self.append_primary(&json) {
                Ok(()) => return,
                Err(err) => {
                    eprintln!(
                        "[ISN-JSONL] log file {} unwritable ({err}); falling back to stderr",
                        self.path.display()
                    );
                    self.state = WriterState::Stderr;
                }
            }
        }

        eprintln!("[ISN-JSONL] {json}");
    }

    fn append_primary(&self, json: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // One write_all per line so tailing readers never see a torn record.
        file.write_all(format!("{json}\n").as_bytes())
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
