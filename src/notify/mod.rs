//! Multi-channel delivery of scan findings: file, journal, and webhook.
//!
//! Dispatches structured notifications through configured channels with
//! min-level filtering. Each channel is fire-and-forget — notification
//! failures are logged but never fail the run. Empty reports are never
//! delivered anywhere.

#![allow(missing_docs)]

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use serde::{Deserialize, Serialize};

// ──────────────────── notification level ────────────────────

/// Severity level for notification filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ──────────────────── notification events ────────────────────

/// A structured notification event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    /// Outcome of a scan that found something worth reporting.
    Findings {
        new_files: Vec<String>,
        changed_files: Vec<String>,
        missing_files: Vec<String>,
        error_count: usize,
    },
    /// A run that failed outright (snapshot unwritable, config broken).
    ScanFailed { code: String, message: String },
}

impl ScanEvent {
    /// The severity level of this event (for min-level filtering).
    ///
    /// Changed or missing files on a deployment tree are the alarm case;
    /// brand-new files are notable; read errors alone are informational.
    #[must_use]
    pub fn level(&self) -> NotificationLevel {
        match self {
            Self::Findings {
                changed_files,
                missing_files,
                new_files,
                ..
            } => {
                if !changed_files.is_empty() || !missing_files.is_empty() {
                    NotificationLevel::Critical
                } else if !new_files.is_empty() {
                    NotificationLevel::Warning
                } else {
                    NotificationLevel::Info
                }
            }
            Self::ScanFailed { .. } => NotificationLevel::Critical,
        }
    }

    /// Whether there is anything to deliver at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Findings {
                new_files,
                changed_files,
                missing_files,
                error_count,
            } => {
                new_files.is_empty()
                    && changed_files.is_empty()
                    && missing_files.is_empty()
                    && *error_count == 0
            }
            Self::ScanFailed { .. } => false,
        }
    }

    /// Short human-readable summary line.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Findings {
                new_files,
                changed_files,
                missing_files,
                error_count,
            } => {
                let mut parts = Vec::new();
                if !changed_files.is_empty() {
                    parts.push(format!("{} changed", changed_files.len()));
                }
                if !new_files.is_empty() {
                    parts.push(format!("{} new", new_files.len()));
                }
                if !missing_files.is_empty() {
                    parts.push(format!("{} missing", missing_files.len()));
                }
                let files = if parts.is_empty() {
                    "no file changes".to_string()
                } else {
                    format!("{} files", parts.join(", "))
                };
                if *error_count > 0 {
                    format!("{files}, {error_count} scan errors")
                } else {
                    files
                }
            }
            Self::ScanFailed { code, message } => format!("[{code}] {message}"),
        }
    }
}

// ──────────────────── configuration ────────────────────

/// Top-level notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Master switch for all notifications.
    pub enabled: bool,
    /// Which channel names to activate.
    pub channels: Vec<String>,
    pub webhook: WebhookConfig,
    pub file: FileConfig,
    pub journal: JournalConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: vec!["journal".to_string(), "file".to_string()],
            webhook: WebhookConfig::default(),
            file: FileConfig::default(),
            journal: JournalConfig::default(),
        }
    }
}

/// Webhook notification settings (HTTP POST via curl — the chat-bridge
/// successor of the original Slack delivery).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    pub min_level: NotificationLevel,
    /// Template with `${SUMMARY}`, `${LEVEL}`, `${NEW}`, `${CHANGED}`,
    /// `${MISSING}` placeholders.
    pub template: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            min_level: NotificationLevel::Warning,
            template: r#"{"text": "isentry: ${SUMMARY}"}"#.to_string(),
        }
    }
}

/// File notification settings (append-only JSONL).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub path: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        Self {
            path: home
                .join(".local")
                .join("share")
                .join("isentry")
                .join("notifications.jsonl"),
        }
    }
}

/// Journal notification settings (stderr, picked up by systemd/cron mail).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JournalConfig {
    pub min_level: NotificationLevel,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            min_level: NotificationLevel::Warning,
        }
    }
}

// ──────────────────── JSONL record ────────────────────

/// A single notification record written to the JSONL file.
#[derive(Debug, Serialize)]
struct NotificationRecord {
    ts: String,
    level: NotificationLevel,
    summary: String,
    #[serde(flatten)]
    event: ScanEvent,
}

// ──────────────────── notification channels ────────────────────

/// A notification channel that can dispatch events.
trait Channel: Send + Sync {
    fn name(&self) -> &'static str;
    fn send(&self, event: &ScanEvent);
}

// ──── File (append-only JSONL) ────

struct FileChannel {
    path: PathBuf,
}

impl FileChannel {
    fn new(config: &FileConfig) -> Self {
        Self {
            path: config.path.clone(),
        }
    }
}

impl Channel for FileChannel {
    fn name(&self) -> &'static str {
        "file"
    }

    fn send(&self, event: &ScanEvent) {
        let record = NotificationRecord {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            level: event.level(),
            summary: event.summary(),
            event: event.clone(),
        };

        let Ok(json) = serde_json::to_string(&record) else {
            return;
        };

        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        let file = {
            let mut opts = OpenOptions::new();
            opts.create(true).append(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                opts.mode(0o600);
            }
            opts.open(&self.path)
        };

        if let Ok(mut f) = file {
            let _ = writeln!(f, "{json}");
        }
    }
}

// ──── Journal (stderr) ────

struct JournalChannel {
    min_level: NotificationLevel,
}

impl JournalChannel {
    const fn new(config: &JournalConfig) -> Self {
        Self {
            min_level: config.min_level,
        }
    }
}

impl Channel for JournalChannel {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn send(&self, event: &ScanEvent) {
        if event.level() < self.min_level {
            return;
        }

        let priority = match event.level() {
            NotificationLevel::Critical => "CRIT",
            NotificationLevel::Warning => "WARNING",
            NotificationLevel::Info => "INFO",
        };

        eprintln!("[ISN-NOTIFY] [{priority}] {}", event.summary());
    }
}

// ──── Webhook (HTTP POST via curl) ────

struct WebhookChannel {
    url: String,
    min_level: NotificationLevel,
    template: String,
}

impl WebhookChannel {
    fn new(config: &WebhookConfig) -> Self {
        Self {
            url: config.url.clone(),
            min_level: config.min_level,
            template: config.template.clone(),
        }
    }

    fn render_body(&self, event: &ScanEvent) -> String {
        let summary = event.summary();
        let level = event.level().to_string();

        let (new, changed, missing) = match event {
            ScanEvent::Findings {
                new_files,
                changed_files,
                missing_files,
                ..
            } => (
                new_files.len().to_string(),
                changed_files.len().to_string(),
                missing_files.len().to_string(),
            ),
            ScanEvent::ScanFailed { .. } => {
                ("0".to_string(), "0".to_string(), "0".to_string())
            }
        };

        // JSON-escape values to prevent injection in webhook payloads.
        let esc = |s: &str| {
            s.replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n")
        };

        self.template
            .replace("${SUMMARY}", &esc(&summary))
            .replace("${LEVEL}", &esc(&level))
            .replace("${NEW}", &esc(&new))
            .replace("${CHANGED}", &esc(&changed))
            .replace("${MISSING}", &esc(&missing))
    }
}

impl Channel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn send(&self, event: &ScanEvent) {
        if event.level() < self.min_level {
            return;
        }

        if self.url.is_empty() {
            return;
        }

        let body = self.render_body(event);

        // Fire-and-forget via curl. Timeout of 5 seconds to avoid blocking.
        let _ = Command::new("curl")
            .arg("--silent")
            .arg("--max-time")
            .arg("5")
            .arg("--header")
            .arg("Content-Type: application/json")
            .arg("--data")
            .arg(&body)
            .arg(&self.url)
            .spawn();
    }
}

// ──────────────────── notification manager ────────────────────

/// Coordinates dispatching scan events to all enabled channels.
///
/// Each channel's `send()` is fire-and-forget (spawns curl for the webhook,
/// appends for file, writes to stderr for journal). Channel failures never
/// propagate into the scan's exit status.
pub struct NotificationManager {
    channels: Vec<Box<dyn Channel>>,
    enabled: bool,
    last_send: Option<Instant>,
}

impl NotificationManager {
    /// Build a manager from configuration.
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let mut channels: Vec<Box<dyn Channel>> = Vec::new();

        for channel_name in &config.channels {
            match channel_name.as_str() {
                "file" => {
                    channels.push(Box::new(FileChannel::new(&config.file)));
                }
                "journal" => {
                    channels.push(Box::new(JournalChannel::new(&config.journal)));
                }
                "webhook" if config.webhook.enabled => {
                    channels.push(Box::new(WebhookChannel::new(&config.webhook)));
                }
                _ => {
                    // Unknown or disabled channel name — skip silently.
                }
            }
        }

        Self {
            channels,
            enabled: true,
            last_send: None,
        }
    }

    /// Create a disabled (no-op) manager.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            channels: Vec::new(),
            enabled: false,
            last_send: None,
        }
    }

    /// Dispatch an event to all enabled channels. Empty events are dropped
    /// before reaching any channel.
    pub fn notify(&mut self, event: &ScanEvent) {
        if !self.enabled || event.is_empty() {
            return;
        }

        self.last_send = Some(Instant::now());

        for channel in &self.channels {
            channel.send(event);
        }
    }

    /// Number of active channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Whether the manager is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// List the names of active channels.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }
}

// ──────────────────── tests ────────────────────
