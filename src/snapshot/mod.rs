//! Persisted checksum snapshots.
//!
//! The snapshot is a flat path→checksum mapping serialized as pretty JSON
//! over a sorted map, so consecutive snapshots are human-diffable. Writes go
//! through a sibling temp file plus atomic rename: a crash mid-write leaves
//! the previous snapshot intact, and silent loss would otherwise make every
//! subsequent run re-report all files as changed.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::core::errors::{Result, SentryError};

/// Mapping of file path to last-known checksum.
pub type Snapshot = BTreeMap<String, String>;

/// Read the prior snapshot.
///
/// An absent file is a first run and yields an empty snapshot; an unreadable
/// or unparsable file is fatal, because scanning against a half-read prior
/// would mis-classify the entire tree.
pub fn load(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Ok(Snapshot::new());
    }

    let raw = fs::read_to_string(path).map_err(|err| SentryError::SnapshotRead {
        path: path.to_path_buf(),
        details: err.to_string(),
    })?;

    serde_json::from_str(&raw).map_err(|err| SentryError::SnapshotRead {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// Persist the new snapshot atomically.
pub fn store(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let persist_err = |details: String| SentryError::SnapshotPersist {
        path: path.to_path_buf(),
        details,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| persist_err(err.to_string()))?;
    }

    let body =
        serde_json::to_string_pretty(snapshot).map_err(|err| persist_err(err.to_string()))?;

    let tmp_path = path.with_extension("tmp");
    let mut tmp = File::create(&tmp_path).map_err(|err| persist_err(err.to_string()))?;
    tmp.write_all(body.as_bytes())
        .and_then(|()| tmp.write_all(b"\n"))
        .and_then(|()| tmp.sync_all())
        .map_err(|err| persist_err(err.to_string()))?;
    drop(tmp);

    fs::rename(&tmp_path, path).map_err(|err| persist_err(err.to_string()))
}
