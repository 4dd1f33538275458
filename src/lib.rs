#![forbid(unsafe_code)]

//! Integrity Sentry (isentry) — cron-driven file-integrity scanner for
//! deployment trees.
//!
//! One run walks the configured roots, checksums every regular file through a
//! bounded worker pool, diffs the result against the previously persisted
//! snapshot, and reports new / changed / missing files through the activity
//! log and notification channels.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use integrity_sentry::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use integrity_sentry::core::config::Config;
//! use integrity_sentry::scanner::{ScanEngine, ScanOptions};
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod notify;
pub mod scanner;
pub mod snapshot;
