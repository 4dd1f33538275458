//! Streaming content digests with a pluggable algorithm seam.
//!
//! The engine never hashes directly — it holds an `Arc<dyn ChecksumAlgorithm>`
//! so the digest can be swapped without touching walker, pool, or aggregator
//! logic. The default is a chunked SHA-256 that bounds memory at one chunk
//! buffer regardless of file size.

#![allow(missing_docs)]

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Read granularity used when no explicit chunk size is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// A content-digest strategy.
///
/// Implementations must be deterministic under stable content: the same
/// bytes always yield the same digest string.
pub trait ChecksumAlgorithm: Send + Sync {
    /// Short identifier recorded in logs.
    fn name(&self) -> &'static str;

    /// Digest the file at `path`, reading at most `size` bytes.
    ///
    /// `size` is the length captured at stat time; hashing stops there even
    /// if the file has grown since, and stops early at EOF if it shrank.
    fn checksum_file(&self, path: &Path, size: u64) -> io::Result<String>;
}

/// What a worker produced for one file.
///
/// A tagged variant rather than an error string smuggled into the checksum
/// field, so downstream logic can never mistake a failure for a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumOutcome {
    /// Lowercase hex digest of the file content.
    Hashed(String),
    /// The file could not be opened or read; carries the failure reason.
    Unreadable(String),
}

impl ChecksumOutcome {
    /// The string persisted into the snapshot for this outcome.
    ///
    /// Unreadable files store a `unreadable:` sentinel that can never equal a
    /// hex digest, so they keep reporting as changed until the read succeeds.
    #[must_use]
    pub fn stored_value(&self) -> String {
        match self {
            Self::Hashed(digest) => digest.clone(),
            Self::Unreadable(reason) => format!("unreadable:{reason}"),
        }
    }

    #[must_use]
    pub const fn is_hashed(&self) -> bool {
        matches!(self, Self::Hashed(_))
    }
}

impl fmt::Display for ChecksumOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hashed(digest) => write!(f, "{digest}"),
            Self::Unreadable(reason) => write!(f, "unreadable:{reason}"),
        }
    }
}

/// Chunked streaming SHA-256.
#[derive(Debug, Clone)]
pub struct ChunkedSha256 {
    chunk_size: usize,
}

impl ChunkedSha256 {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use a custom read granularity. A zero chunk size is clamped to one
    /// byte; config validation rejects it earlier.
    #[must_use]
    pub const fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: if chunk_size == 0 { 1 } else { chunk_size },
        }
    }
}

impl Default for ChunkedSha256 {
    fn default() -> Self {
        Self::new()
    }
}

impl ChecksumAlgorithm for ChunkedSha256 {
    fn name(&self) -> &'static str {
        "sha256-chunked"
    }

    fn checksum_file(&self, path: &Path, size: u64) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut remaining = size;

        // A zero-length file performs zero reads and falls straight through
        // to the canonical empty-input digest.
        while remaining > 0 {
            let want = usize::try_from(remaining.min(self.chunk_size as u64))
                .unwrap_or(self.chunk_size);
            let read = file.read(&mut buf[..want])?;
            if read == 0 {
                // File shrank between stat and read; digest what we got.
                break;
            }
            hasher.update(&buf[..read]);
            remaining -= read as u64;
        }

        Ok(to_hex(&hasher.finalize()))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
