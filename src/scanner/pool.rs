//! Fixed-size checksum worker pool with sentinel shutdown.
//!
//! Workers are symmetric and interchangeable: each descriptor is delivered to
//! exactly one worker, and each worker exits only after receiving its own
//! shutdown sentinel. Every worker owns a clone of the result sender and
//! drops it on exit — the aggregator's end-of-stream signal is the channel
//! disconnecting once the last worker (and the engine) let go.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::scanner::digest::{ChecksumAlgorithm, ChecksumOutcome};
use crate::scanner::walker::FileDescriptor;

/// Message on the work queue: a file to checksum, or a shutdown sentinel.
#[derive(Debug, Clone)]
pub enum WorkUnit {
    File(FileDescriptor),
    /// "No more work" marker. The coordinator sends exactly one per worker,
    /// only after every root has been fully walked.
    Shutdown,
}

/// Output of a worker for one descriptor; consumed exactly once by the
/// aggregator.
#[derive(Debug, Clone)]
pub struct ChecksumResult {
    pub path: PathBuf,
    pub outcome: ChecksumOutcome,
}

/// Resolve a configured parallelism value: 0 means one worker per available
/// processor.
#[must_use]
pub fn effective_parallelism(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }
}

/// Handle to a spawned set of checksum workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers pulling from `work_rx` and emitting onto
    /// `result_tx`. Each worker gets its own clone of the sender.
    #[must_use]
    pub fn spawn(
        count: usize,
        work_rx: &Receiver<WorkUnit>,
        result_tx: &Sender<ChecksumResult>,
        algorithm: &Arc<dyn ChecksumAlgorithm>,
    ) -> Self {
        let handles = (0..count.max(1))
            .map(|_| {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let algorithm = Arc::clone(algorithm);
                thread::spawn(move || worker_loop(&work_rx, &result_tx, algorithm.as_ref()))
            })
            .collect();
        Self { handles }
    }

    /// Number of workers in the pool — also the number of sentinels the
    /// coordinator must send.
    #[must_use]
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Block until every worker has terminated.
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    work_rx: &Receiver<WorkUnit>,
    result_tx: &Sender<ChecksumResult>,
    algorithm: &dyn ChecksumAlgorithm,
) {
    while let Ok(unit) = work_rx.recv() {
        let descriptor = match unit {
            WorkUnit::Shutdown => break,
            WorkUnit::File(descriptor) => descriptor,
        };

        let outcome = match algorithm.checksum_file(&descriptor.path, descriptor.size) {
            Ok(digest) => ChecksumOutcome::Hashed(digest),
            Err(err) => ChecksumOutcome::Unreadable(err.to_string()),
        };

        let result = ChecksumResult {
            path: descriptor.path,
            outcome,
        };
        if result_tx.send(result).is_err() {
            break;
        }
    }
    // result_tx clone dropped here: this worker's share of the drain signal.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::digest::ChunkedSha256;
    use crossbeam_channel as channel;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn descriptor_for(path: PathBuf, size: u64) -> FileDescriptor {
        FileDescriptor {
            path,
            size,
            mode: 0o644,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    fn algorithm() -> Arc<dyn ChecksumAlgorithm> {
        Arc::new(ChunkedSha256::new())
    }

    #[test]
    fn effective_parallelism_resolves_zero() {
        assert!(effective_parallelism(0) >= 1);
        assert_eq!(effective_parallelism(3), 3);
    }

    #[test]
    fn workers_checksum_and_exit_on_sentinel() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("data.bin");
        fs::write(&file, b"hello").unwrap();

        let (work_tx, work_rx) = channel::bounded(8);
        let (result_tx, result_rx) = channel::bounded(8);
        let pool = WorkerPool::spawn(2, &work_rx, &result_tx, &algorithm());
        drop(result_tx);

        work_tx
            .send(WorkUnit::File(descriptor_for(file.clone(), 5)))
            .unwrap();
        for _ in 0..pool.size() {
            work_tx.send(WorkUnit::Shutdown).unwrap();
        }
        pool.join();

        let results: Vec<ChecksumResult> = result_rx.iter().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, file);
        assert!(results[0].outcome.is_hashed());
    }

    #[test]
    fn unreadable_file_becomes_tagged_outcome() {
        let (work_tx, work_rx) = channel::bounded(8);
        let (result_tx, result_rx) = channel::bounded(8);
        let pool = WorkerPool::spawn(1, &work_rx, &result_tx, &algorithm());
        drop(result_tx);

        let ghost = PathBuf::from("/definitely/not/present");
        work_tx
            .send(WorkUnit::File(descriptor_for(ghost.clone(), 10)))
            .unwrap();
        work_tx.send(WorkUnit::Shutdown).unwrap();
        pool.join();

        let results: Vec<ChecksumResult> = result_rx.iter().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, ghost);
        assert!(!results[0].outcome.is_hashed());
    }

    #[test]
    fn every_descriptor_is_processed_exactly_once() {
        let tmp = TempDir::new().unwrap();
        let mut expected = Vec::new();
        for i in 0..40 {
            let path = tmp.path().join(format!("f{i}"));
            fs::write(&path, format!("content-{i}")).unwrap();
            expected.push(path);
        }

        let (work_tx, work_rx) = channel::bounded(4);
        let (result_tx, result_rx) = channel::bounded(4);
        let pool = WorkerPool::spawn(4, &work_rx, &result_tx, &algorithm());
        drop(result_tx);

        let collector = std::thread::spawn(move || result_rx.iter().collect::<Vec<_>>());

        for path in &expected {
            let size = fs::metadata(path).unwrap().len();
            work_tx
                .send(WorkUnit::File(descriptor_for(path.clone(), size)))
                .unwrap();
        }
        for _ in 0..pool.size() {
            work_tx.send(WorkUnit::Shutdown).unwrap();
        }
        pool.join();

        let results = collector.join().unwrap();
        assert_eq!(results.len(), expected.len());

        let mut seen: Vec<PathBuf> = results.into_iter().map(|r| r.path).collect();
        seen.sort();
        let mut expected_sorted = expected;
        expected_sorted.sort();
        assert_eq!(seen, expected_sorted);
    }

    #[test]
    fn zero_worker_request_still_spawns_one() {
        let (_work_tx, work_rx) = channel::bounded::<WorkUnit>(1);
        let (result_tx, _result_rx) = channel::bounded(1);
        let pool = WorkerPool::spawn(0, &work_rx, &result_tx, &algorithm());
        assert_eq!(pool.size(), 1);
        drop(_work_tx);
        pool.join();
    }
}
