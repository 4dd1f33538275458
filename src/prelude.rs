//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use integrity_sentry::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SentryError};

// Scanner
pub use crate::scanner::aggregate::ScanReport;
pub use crate::scanner::digest::{ChecksumAlgorithm, ChecksumOutcome, ChunkedSha256};
pub use crate::scanner::walker::ScanError;
pub use crate::scanner::{CancelToken, ScanEngine, ScanOptions};

// Snapshot
pub use crate::snapshot::{Snapshot, load as load_snapshot, store as store_snapshot};

// Notifications & logging
pub use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
pub use crate::notify::{NotificationManager, ScanEvent};
