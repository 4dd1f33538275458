//! ISN-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SentryError>;

/// Top-level error type for integrity_sentry.
///
/// Per-file walk and read failures are deliberately NOT represented here —
/// they accumulate in the scan report and never abort a scan. Only
/// configuration, snapshot, and startup failures are fatal.
#[derive(Debug, Error)]
pub enum SentryError {
    #[error("[ISN-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ISN-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ISN-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ISN-2001] snapshot read failure for {path}: {details}")]
    SnapshotRead { path: PathBuf, details: String },

    #[error("[ISN-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ISN-2201] snapshot persistence failure for {path}: {details}")]
    SnapshotPersist { path: PathBuf, details: String },

    #[error("[ISN-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ISN-3002] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[ISN-3100] scan startup failure: {details}")]
    ScanStartup { details: String },
}

impl SentryError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ISN-1001",
            Self::MissingConfig { .. } => "ISN-1002",
            Self::ConfigParse { .. } => "ISN-1003",
            Self::SnapshotRead { .. } => "ISN-2001",
            Self::Serialization { .. } => "ISN-2101",
            Self::SnapshotPersist { .. } => "ISN-2201",
            Self::Io { .. } => "ISN-3001",
            Self::ChannelClosed { .. } => "ISN-3002",
            Self::ScanStartup { .. } => "ISN-3100",
        }
    }

    /// Whether retrying the run might resolve the failure.
    ///
    /// Snapshot persistence counts as retryable: the scan itself succeeded and
    /// the next cron cycle may find the target writable again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::SnapshotRead { .. }
                | Self::SnapshotPersist { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SentryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SentryError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> Vec<SentryError> {
        vec![
            SentryError::InvalidConfig {
                details: String::new(),
            },
            SentryError::MissingConfig {
                path: PathBuf::new(),
            },
            SentryError::ConfigParse {
                context: "",
                details: String::new(),
            },
            SentryError::SnapshotRead {
                path: PathBuf::new(),
                details: String::new(),
            },
            SentryError::Serialization {
                context: "",
                details: String::new(),
            },
            SentryError::SnapshotPersist {
                path: PathBuf::new(),
                details: String::new(),
            },
            SentryError::Io {
                path: PathBuf::new(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "test"),
            },
            SentryError::ChannelClosed { component: "" },
            SentryError::ScanStartup {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_errors();
        let codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_isn_prefix() {
        for err in &all_errors() {
            assert!(
                err.code().starts_with("ISN-"),
                "code {} must start with ISN-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = SentryError::InvalidConfig {
            details: "bad value".to_string(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("ISN-1001"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("bad value"),
            "display should contain details: {msg}"
        );
    }

    #[test]
    fn retryable_errors_are_correct() {
        // Retryable.
        assert!(
            SentryError::Io {
                path: PathBuf::new(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "test"),
            }
            .is_retryable()
        );
        assert!(SentryError::ChannelClosed { component: "test" }.is_retryable());
        assert!(
            SentryError::SnapshotRead {
                path: PathBuf::new(),
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            SentryError::SnapshotPersist {
                path: PathBuf::new(),
                details: String::new()
            }
            .is_retryable()
        );

        // Not retryable.
        assert!(
            !SentryError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !SentryError::MissingConfig {
                path: PathBuf::new()
            }
            .is_retryable()
        );
        assert!(
            !SentryError::ScanStartup {
                details: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = SentryError::io(
            "/tmp/snapshot.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "ISN-3001");
        assert!(err.to_string().contains("/tmp/snapshot.json"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: SentryError = json_err.into();
        assert_eq!(err.code(), "ISN-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: SentryError = toml_err.into();
        assert_eq!(err.code(), "ISN-1003");
    }
}
