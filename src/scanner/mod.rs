//! Concurrent scan-and-diff engine.
//!
//! Wiring: walker → work queue → worker pool → result queue → aggregator.
//! Both queues are bounded, so a slow aggregator stalls workers and a slow
//! pool stalls the walker — end-to-end backpressure with no unbounded
//! buffering.
//!
//! Shutdown ordering is the engine's one correctness-critical contract:
//! walk every root to completion, send exactly one sentinel per worker,
//! join the pool, drop the last result sender, then join the aggregator.
//! Finalizing any earlier loses in-flight results; sending sentinels any
//! earlier kills workers while descriptors are still queued.

pub mod aggregate;
pub mod digest;
pub mod pool;
pub mod walker;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel as channel;

use crate::core::config::ScanConfig;
use crate::core::errors::{Result, SentryError};
use crate::scanner::aggregate::{Aggregator, ScanReport};
use crate::scanner::digest::{ChecksumAlgorithm, ChunkedSha256};
use crate::scanner::pool::{WorkUnit, WorkerPool, effective_parallelism};
use crate::scanner::walker::TreeWalker;
use crate::snapshot::Snapshot;

/// Depth of the walker→workers queue.
const WORK_QUEUE_DEPTH: usize = 1024;

/// Depth of the workers→aggregator queue.
const RESULT_QUEUE_DEPTH: usize = 1024;

/// Cooperative cancellation signal shared between the engine and its caller.
///
/// Raising it stops the walker from enqueueing further descriptors; work
/// already in flight drains through the normal shutdown sequence and the
/// scan returns a partial report tagged incomplete.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, un-raised token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// The underlying flag, in the shape signal handlers want.
    #[must_use]
    pub fn as_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// What to scan and how hard to push.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Directory trees to walk, in order.
    pub roots: Vec<PathBuf>,
    /// Exact full-path ignore entries (pre-resolution root form).
    pub ignored: Vec<String>,
    /// Worker count; 0 resolves to the available processor count.
    pub parallelism: usize,
}

impl ScanOptions {
    #[must_use]
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            roots: config.roots.clone(),
            ignored: config.ignored.clone(),
            parallelism: config.parallelism,
        }
    }
}

/// One configured scan, runnable against a prior snapshot.
pub struct ScanEngine {
    options: ScanOptions,
    algorithm: Arc<dyn ChecksumAlgorithm>,
    cancel: CancelToken,
}

impl ScanEngine {
    /// Engine with the default chunked SHA-256 digest.
    #[must_use]
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            algorithm: Arc::new(ChunkedSha256::new()),
            cancel: CancelToken::new(),
        }
    }

    /// Swap the digest strategy.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Arc<dyn ChecksumAlgorithm>) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Token the caller can use (e.g. from a signal handler) to stop the
    /// scan early.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the full scan against `prior` and return the report.
    ///
    /// The calling thread drives the walker; checksum workers and the
    /// aggregator run on their own threads and are always joined before this
    /// returns, cancelled or not.
    pub fn run(&self, prior: Snapshot) -> Result<ScanReport> {
        if self.options.roots.is_empty() {
            return Err(SentryError::ScanStartup {
                details: "no scan roots configured".to_string(),
            });
        }

        let worker_count = effective_parallelism(self.options.parallelism);
        let (work_tx, work_rx) = channel::bounded::<WorkUnit>(WORK_QUEUE_DEPTH);
        let (result_tx, result_rx) = channel::bounded(RESULT_QUEUE_DEPTH);

        let pool = WorkerPool::spawn(worker_count, &work_rx, &result_tx, &self.algorithm);
        drop(work_rx);

        let aggregator = Aggregator::new(Arc::new(prior));
        let aggregator_handle = thread::spawn(move || aggregator.run(&result_rx));

        // 1. Walk every root to completion, one after another.
        let mut tree_walker = TreeWalker::new(&self.options.ignored, self.cancel.clone());
        for root in &self.options.roots {
            tree_walker.walk_root(root, &work_tx);
        }

        // 2. One sentinel per worker — no more descriptors will be produced.
        for _ in 0..pool.size() {
            if work_tx.send(WorkUnit::Shutdown).is_err() {
                break;
            }
        }
        drop(work_tx);

        // 3. Every worker acknowledges termination.
        pool.join();

        // 4. Workers dropped their result senders on exit; dropping ours
        //    disconnects the channel — the aggregator's drain signal.
        drop(result_tx);

        // 5. Only now finalize.
        let aggregator = aggregator_handle
            .join()
            .map_err(|_| SentryError::ChannelClosed {
                component: "aggregator",
            })?;

        let complete = !self.cancel.is_cancelled();
        Ok(aggregator.finish(complete, tree_walker.into_errors()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn engine_for(root: &std::path::Path, parallelism: usize) -> ScanEngine {
        ScanEngine::new(ScanOptions {
            roots: vec![root.to_path_buf()],
            ignored: Vec::new(),
            parallelism,
        })
    }

    #[test]
    fn empty_roots_is_a_startup_error() {
        let engine = ScanEngine::new(ScanOptions::default());
        let err = engine.run(Snapshot::new()).unwrap_err();
        assert_eq!(err.code(), "ISN-3100");
    }

    #[test]
    fn first_run_reports_everything_as_new() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"alpha").unwrap();
        fs::write(tmp.path().join("b.txt"), b"beta").unwrap();

        let report = engine_for(tmp.path(), 2).run(Snapshot::new()).unwrap();
        assert!(report.complete);
        assert_eq!(report.new_files.len(), 2);
        assert!(report.changed_files.is_empty());
        assert_eq!(report.snapshot.len(), 2);
    }

    #[test]
    fn second_run_with_no_changes_is_quiet() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"alpha").unwrap();

        let engine = engine_for(tmp.path(), 2);
        let first = engine.run(Snapshot::new()).unwrap();
        let second = engine.run(first.snapshot.clone()).unwrap();

        assert!(!second.has_findings());
        assert_eq!(second.snapshot, first.snapshot);
    }

    #[test]
    fn content_change_is_detected_with_fresh_digest() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, b"before").unwrap();

        let engine = engine_for(tmp.path(), 2);
        let first = engine.run(Snapshot::new()).unwrap();

        fs::write(&file, b"after").unwrap();
        let second = engine.run(first.snapshot.clone()).unwrap();

        // Snapshot keys carry the canonical (resolved-root) form.
        let key = fs::canonicalize(&file).unwrap().display().to_string();
        assert_eq!(second.changed_files, vec![key.clone()]);
        assert_ne!(second.snapshot.get(&key), first.snapshot.get(&key));
    }

    #[test]
    fn worker_count_does_not_change_the_outcome() {
        let tmp = TempDir::new().unwrap();
        for i in 0..25 {
            fs::write(tmp.path().join(format!("f{i}.dat")), format!("data-{i}")).unwrap();
        }
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("nested"), b"nested").unwrap();

        let solo = engine_for(tmp.path(), 1).run(Snapshot::new()).unwrap();
        let wide = engine_for(tmp.path(), 16).run(Snapshot::new()).unwrap();

        assert_eq!(solo.snapshot, wide.snapshot);
        assert_eq!(solo.new_files, wide.new_files);
        assert_eq!(solo.changed_files, wide.changed_files);
        assert_eq!(solo.missing_files, wide.missing_files);
    }

    #[test]
    fn deleted_file_is_reported_missing() {
        let tmp = TempDir::new().unwrap();
        let doomed = tmp.path().join("doomed.txt");
        fs::write(&doomed, b"soon gone").unwrap();
        fs::write(tmp.path().join("stays.txt"), b"here").unwrap();

        let engine = engine_for(tmp.path(), 2);
        let first = engine.run(Snapshot::new()).unwrap();

        let key = fs::canonicalize(&doomed).unwrap().display().to_string();
        fs::remove_file(&doomed).unwrap();
        let second = engine.run(first.snapshot).unwrap();

        assert_eq!(second.missing_files, vec![key.clone()]);
        assert!(!second.snapshot.contains_key(&key));
    }

    #[test]
    fn pre_cancelled_scan_returns_incomplete_report() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"alpha").unwrap();

        let prior: Snapshot = [("/elsewhere/old.txt".to_string(), "h1".to_string())]
            .into_iter()
            .collect();

        let engine = engine_for(tmp.path(), 2);
        engine.cancel_token().cancel();
        let report = engine.run(prior).unwrap();

        assert!(!report.complete);
        assert!(report.missing_files.is_empty());
        // Prior entries are carried forward untouched.
        assert_eq!(report.snapshot.get("/elsewhere/old.txt").unwrap(), "h1");
    }

    #[test]
    fn walk_errors_surface_in_the_report() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ok.txt"), b"fine").unwrap();

        let engine = ScanEngine::new(ScanOptions {
            roots: vec![PathBuf::from("/definitely/does/not/exist"), tmp.path().to_path_buf()],
            ignored: Vec::new(),
            parallelism: 2,
        });
        let report = engine.run(Snapshot::new()).unwrap();

        assert!(report.complete);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.new_files.len(), 1);
    }
}
