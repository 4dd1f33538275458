//! Append-only JSONL activity logging with graceful degradation.

pub mod jsonl;

pub use jsonl::{EventType, JsonlWriter, LogEntry, Severity};
