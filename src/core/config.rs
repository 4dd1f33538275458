//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SentryError};
use crate::core::paths::resolve_absolute_path;
use crate::notify::NotificationConfig;

/// Full isentry configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub scan: ScanConfig,
    pub snapshot: SnapshotConfig,
    pub log: LogConfig,
    pub notifications: NotificationConfig,
    /// Where this config was loaded from (set by `load`, not serialized).
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// Scan roots, ignore rules, and engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory trees to walk. A root may itself be a symlink; it is
    /// resolved once before the walk begins.
    pub roots: Vec<PathBuf>,
    /// Full paths excluded from traversal and reporting. Exact string match
    /// against the configured (pre-resolution) root prefix, not glob.
    pub ignored: Vec<String>,
    /// Worker-pool size. 0 means one worker per available processor.
    pub parallelism: usize,
    /// Read granularity for the streaming digest, in bytes.
    pub chunk_size: usize,
}

/// Where the prior snapshot is read from and the new one written to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SnapshotConfig {
    pub path: PathBuf,
}

/// JSONL activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            ignored: Vec::new(),
            parallelism: 0,
            chunk_size: 8192,
        }
    }
}

fn data_dir() -> PathBuf {
    let home_dir = env::var_os("HOME").map_or_else(
        || {
            eprintln!("[ISN-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    );
    home_dir.join(".local").join("share").join("isentry")
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("snapshot.json"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jsonl_path: data_dir().join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[ISN-CONFIG] WARNING: HOME not set, falling back to /tmp for config path"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        home_dir.join(".config").join("isentry").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default
    /// path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SentryError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(SentryError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, so the value is stable across
    /// processes and Rust releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(|key| env::var(key).ok())
    }

    /// Override application with a pluggable lookup, so tests don't have to
    /// mutate process-global environment state.
    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        set_usize(
            &mut lookup,
            "ISN_SCAN_PARALLELISM",
            &mut self.scan.parallelism,
        )?;
        set_usize(
            &mut lookup,
            "ISN_SCAN_CHUNK_SIZE",
            &mut self.scan.chunk_size,
        )?;
        set_path(&mut lookup, "ISN_SNAPSHOT_PATH", &mut self.snapshot.path);
        set_bool(&mut lookup, "ISN_LOG_ENABLED", &mut self.log.enabled)?;
        set_path(&mut lookup, "ISN_LOG_PATH", &mut self.log.jsonl_path);
        set_bool(
            &mut lookup,
            "ISN_NOTIFICATIONS_ENABLED",
            &mut self.notifications.enabled,
        )?;
        Ok(())
    }

    /// Make snapshot and log paths absolute.
    ///
    /// Scan roots are deliberately left as configured: the walker resolves
    /// them at scan time, and ignore entries match the configured form of the
    /// root, not its canonical target.
    fn normalize_paths(&mut self) {
        self.snapshot.path = resolve_absolute_path(&self.snapshot.path);
        self.log.jsonl_path = resolve_absolute_path(&self.log.jsonl_path);
    }

    fn validate(&self) -> Result<()> {
        if self.scan.chunk_size == 0 {
            return Err(SentryError::InvalidConfig {
                details: "scan.chunk_size must be greater than zero".to_string(),
            });
        }
        if self.snapshot.path.as_os_str().is_empty() {
            return Err(SentryError::InvalidConfig {
                details: "snapshot.path must not be empty".to_string(),
            });
        }
        if self.scan.ignored.iter().any(String::is_empty) {
            return Err(SentryError::InvalidConfig {
                details: "scan.ignored entries must not be empty strings".to_string(),
            });
        }
        Ok(())
    }
}

fn set_usize<F>(lookup: &mut F, key: &'static str, target: &mut usize) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|_| SentryError::InvalidConfig {
            details: format!("{key} must be an unsigned integer, got {raw:?}"),
        })?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &mut F, key: &'static str, target: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(SentryError::InvalidConfig {
                    details: format!("{key} must be a boolean, got {raw:?}"),
                });
            }
        };
    }
    Ok(())
}

fn set_path<F>(lookup: &mut F, key: &'static str, target: &mut PathBuf)
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key)
        && !raw.is_empty()
    {
        *target = PathBuf::from(raw);
    }
}
