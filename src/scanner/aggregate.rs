//! Single-consumer aggregation of checksum results.
//!
//! One aggregator exclusively owns the snapshot under construction and the
//! change lists, so no locking is needed anywhere in the pipeline. It stops
//! only when the result channel disconnects — the explicit drain signal that
//! replaces any fixed-count or timed wait.

#![allow(missing_docs)]

use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::scanner::digest::ChecksumOutcome;
use crate::scanner::pool::ChecksumResult;
use crate::scanner::walker::ScanError;
use crate::snapshot::Snapshot;

/// Final output of one scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    /// The newly built path→checksum mapping.
    pub snapshot: Snapshot,
    /// Paths absent from the prior snapshot. Sorted.
    pub new_files: Vec<String>,
    /// Paths present in both snapshots with differing checksums. Sorted.
    pub changed_files: Vec<String>,
    /// Prior paths not revisited by a complete scan. Sorted; empty for
    /// cancelled scans (unvisited entries are carried forward instead).
    pub missing_files: Vec<String>,
    /// Walk errors followed by per-file read errors. Never fatal.
    pub errors: Vec<ScanError>,
    /// Number of checksum results aggregated.
    pub files_seen: u64,
    /// False when the scan was cancelled before every root finished.
    pub complete: bool,
}

impl ScanReport {
    /// Whether there is anything worth reporting downstream. Notification
    /// delivery is skipped entirely when this is false.
    #[must_use]
    pub fn has_findings(&self) -> bool {
        !self.new_files.is_empty()
            || !self.changed_files.is_empty()
            || !self.missing_files.is_empty()
            || !self.errors.is_empty()
    }
}

/// Serial consumer that merges results into the new snapshot and classifies
/// each against the prior one.
pub struct Aggregator {
    prior: Arc<Snapshot>,
    next: Snapshot,
    new_files: Vec<String>,
    changed_files: Vec<String>,
    errors: Vec<ScanError>,
    files_seen: u64,
}

impl Aggregator {
    #[must_use]
    pub fn new(prior: Arc<Snapshot>) -> Self {
        Self {
            prior,
            next: Snapshot::new(),
            new_files: Vec::new(),
            changed_files: Vec::new(),
            errors: Vec::new(),
            files_seen: 0,
        }
    }

    /// Drain the result channel until it disconnects.
    ///
    /// Disconnect happens only after every worker has exited and the engine
    /// has dropped its own sender clone, so every result in flight is
    /// absorbed before this returns. No counts, no timeouts.
    #[must_use]
    pub fn run(mut self, results: &Receiver<ChecksumResult>) -> Self {
        while let Ok(result) = results.recv() {
            self.absorb(result);
        }
        self
    }

    /// Merge one result: classify against the prior snapshot, then write the
    /// new entry unconditionally. Paths from a single walk are structurally
    /// unique, so each path is written at most once per scan.
    pub fn absorb(&mut self, result: ChecksumResult) {
        let path = result.path.display().to_string();

        if let ChecksumOutcome::Unreadable(reason) = &result.outcome {
            self.errors.push(ScanError {
                path: path.clone(),
                reason: reason.clone(),
            });
        }

        let stored = result.outcome.stored_value();
        match self.prior.get(&path) {
            None => self.new_files.push(path.clone()),
            Some(previous) if *previous != stored => self.changed_files.push(path.clone()),
            Some(_) => {}
        }

        self.next.insert(path, stored);
        self.files_seen += 1;
    }

    /// Finalize into a report.
    ///
    /// A complete scan diffs prior keys that were never revisited into
    /// `missing_files` and drops them from the snapshot. An incomplete
    /// (cancelled) scan instead carries unvisited prior entries forward
    /// unchanged, so cancellation can never fabricate deletions.
    #[must_use]
    pub fn finish(self, complete: bool, walk_errors: Vec<ScanError>) -> ScanReport {
        let Self {
            prior,
            mut next,
            mut new_files,
            mut changed_files,
            errors: read_errors,
            files_seen,
        } = self;

        let mut missing_files = Vec::new();
        if complete {
            // BTreeMap iteration keeps this sorted.
            for path in prior.keys() {
                if !next.contains_key(path) {
                    missing_files.push(path.clone());
                }
            }
        } else {
            for (path, checksum) in prior.iter() {
                next.entry(path.clone()).or_insert_with(|| checksum.clone());
            }
        }

        // Arrival order is non-deterministic across runs; sort so equal scans
        // produce equal reports.
        new_files.sort();
        changed_files.sort();

        let mut errors = walk_errors;
        errors.extend(read_errors);

        ScanReport {
            snapshot: next,
            new_files,
            changed_files,
            missing_files,
            errors,
            files_seen,
            complete,
        }
    }
}
