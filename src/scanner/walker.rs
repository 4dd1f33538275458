//! Recursive tree walker: the producer side of the scan pipeline.
//!
//! One root is fully walked before the next begins; checksumming proceeds
//! concurrently as descriptors are queued. The walker is the only component
//! that touches ignore rules and symlink policy.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::core::paths::resolve_symlink_root;
use crate::scanner::CancelToken;
use crate::scanner::pool::WorkUnit;

/// One regular file discovered by the walker.
///
/// Created at visit time, consumed exactly once by a worker, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Absolute physical path (post root-resolution), unique within a scan.
    pub path: PathBuf,
    /// Byte length at stat time.
    pub size: u64,
    /// Unix permission/type bits; 0 on non-Unix platforms.
    pub mode: u32,
    /// Last-modification timestamp. Captured for the record; checksums are
    /// authoritative for change detection.
    pub modified: SystemTime,
}

/// A non-fatal per-path failure accumulated during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub path: String,
    pub reason: String,
}

/// Depth-first walker over the configured roots.
///
/// Policy per visited entry:
/// - stat/read failure: record an error, continue with siblings.
/// - full path matches an ignore entry: skip the entire subtree.
/// - symlink: skip without following (only roots are ever dereferenced).
/// - directory: recurse, emitting nothing for the directory itself.
/// - regular file: emit a descriptor onto the work queue (blocking send,
///   which is the pipeline's backpressure).
/// - anything else (fifo, socket, device): skip.
///
/// Ignore entries are exact full-path strings expressed against the
/// configured (pre-resolution) root, so a deploy that repoints the root
/// symlink does not invalidate the ignore list.
pub struct TreeWalker {
    ignored: HashSet<String>,
    cancel: CancelToken,
    errors: Vec<ScanError>,
}

impl TreeWalker {
    #[must_use]
    pub fn new(ignored: &[String], cancel: CancelToken) -> Self {
        Self {
            ignored: ignored.iter().cloned().collect(),
            cancel,
            errors: Vec::new(),
        }
    }

    /// Walk one root, sending a descriptor per regular file into `work_tx`.
    ///
    /// A root that cannot be resolved or read records a walk error and is
    /// skipped; remaining roots are unaffected.
    pub fn walk_root(&mut self, root: &Path, work_tx: &Sender<WorkUnit>) {
        if self.cancel.is_cancelled() {
            return;
        }

        let logical = root.to_path_buf();
        if self.ignored.contains(logical.to_string_lossy().as_ref()) {
            return;
        }

        match resolve_symlink_root(root) {
            Ok((physical, _)) => {
                self.walk_dir(&physical, &logical, work_tx);
            }
            Err(err) => self.record(root, &err),
        }
    }

    /// Consume the walker, yielding accumulated walk errors.
    #[must_use]
    pub fn into_errors(self) -> Vec<ScanError> {
        self.errors
    }

    /// Returns `false` when the walk must stop entirely (cancellation or a
    /// closed work queue), `true` to continue with siblings.
    fn walk_dir(&mut self, physical: &Path, logical: &Path, work_tx: &Sender<WorkUnit>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let entries = match fs::read_dir(physical) {
            Ok(entries) => entries,
            Err(err) => {
                self.record(physical, &err);
                return true;
            }
        };

        for entry_result in entries {
            if self.cancel.is_cancelled() {
                return false;
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    self.record(physical, &err);
                    continue;
                }
            };

            let child = entry.path();
            let logical_child = logical.join(entry.file_name());
            if self
                .ignored
                .contains(logical_child.to_string_lossy().as_ref())
            {
                continue;
            }

            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(err) => {
                    self.record(&child, &err);
                    continue;
                }
            };

            if file_type.is_symlink() {
                continue;
            }

            if file_type.is_dir() {
                if !self.walk_dir(&child, &logical_child, work_tx) {
                    return false;
                }
                continue;
            }

            if !file_type.is_file() {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    self.record(&child, &err);
                    continue;
                }
            };

            let descriptor = FileDescriptor {
                path: child,
                size: meta.len(),
                mode: mode_bits(&meta),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            };

            if work_tx.send(WorkUnit::File(descriptor)).is_err() {
                return false;
            }
        }

        true
    }

    fn record(&mut self, path: &Path, err: &std::io::Error) {
        self.errors.push(ScanError {
            path: path.display().to_string(),
            reason: err.to_string(),
        });
    }
}

fn mode_bits(meta: &fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        meta.mode()
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        0
    }
}
