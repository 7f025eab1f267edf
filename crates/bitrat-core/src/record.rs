//! Records flowing through the pipeline.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::FileError;

/// One discovered regular file.
///
/// Created by a walker, filled in by the hashing stage (size, processing
/// time) and never mutated once it has been handed further downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path as discovered, stable identity within one run.
    pub path: PathBuf,

    /// Size in bytes: the stat size at discovery, then the bytes actually read.
    pub size: u64,

    /// Last modification time, if the platform reported one.
    pub mod_time: Option<SystemTime>,

    /// Time spent hashing the contents.
    pub proc_time: Duration,

    /// Set when the file could not be opened, read or inspected.
    pub error: Option<FileError>,
}

impl FileRecord {
    /// Create a record for a path with no metadata yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: 0,
            mod_time: None,
            proc_time: Duration::ZERO,
            error: None,
        }
    }

    /// Create a record from metadata gathered during traversal.
    pub fn with_metadata(path: impl Into<PathBuf>, metadata: &std::fs::Metadata) -> Self {
        Self {
            path: path.into(),
            size: metadata.len(),
            mod_time: metadata.modified().ok(),
            proc_time: Duration::ZERO,
            error: None,
        }
    }

    /// Record a failure. Clears the size, which is only meaningful on success.
    pub fn fail(&mut self, error: FileError) {
        self.size = 0;
        self.error = Some(error);
    }

    /// Check whether processing this file failed.
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Byte-wise key used for deterministic ordering.
    pub fn sort_key(&self) -> &[u8] {
        self.path.as_os_str().as_encoded_bytes()
    }
}

/// Outcome of comparing a live digest against a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum DiffStatus {
    /// No live digest: the file was unreadable.
    #[strum(serialize = "!")]
    Unreadable,
    /// No stored digest to compare against.
    #[strum(serialize = "+")]
    New,
    /// Live and stored digests match.
    #[strum(serialize = "=")]
    Unchanged,
    /// Live and stored digests differ.
    #[strum(serialize = "~")]
    Changed,
    /// The digests cannot be compared.
    #[strum(serialize = "?")]
    Indeterminate,
}

/// A file record paired with its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestRecord {
    /// The file this digest belongs to.
    pub file: FileRecord,

    /// Digest bytes. `None` means "not computed" or "not present" and is
    /// distinct from an empty digest.
    pub digest: Option<Vec<u8>>,

    /// Name reported by the engine that produced (or would have produced) it.
    pub algorithm: CompactString,

    /// Comparison result, for stages that diff against a stored digest.
    pub status: Option<DiffStatus>,
}

impl DigestRecord {
    /// Create a record with a computed digest.
    pub fn new(file: FileRecord, digest: Vec<u8>, algorithm: impl Into<CompactString>) -> Self {
        Self {
            file,
            digest: Some(digest),
            algorithm: algorithm.into(),
            status: None,
        }
    }

    /// Create a record whose digest is absent.
    pub fn absent(file: FileRecord, algorithm: impl Into<CompactString>) -> Self {
        Self {
            file,
            digest: None,
            algorithm: algorithm.into(),
            status: None,
        }
    }

    /// Attach a diff status.
    pub fn with_status(mut self, status: DiffStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Digest as lowercase hex, empty when absent.
    pub fn hex(&self) -> String {
        self.digest.as_deref().map(hex::encode).unwrap_or_default()
    }
}

/// A per-worker stage turning discovered files into digest records.
///
/// Each worker of the hashing stage owns exactly one processor, so
/// implementations may keep mutable running state between files.
pub trait Processor: Send {
    /// Process one file.
    fn process(&mut self, file: FileRecord) -> DigestRecord;
}

impl<P: Processor + ?Sized> Processor for Box<P> {
    fn process(&mut self, file: FileRecord) -> DigestRecord {
        (**self).process(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FileErrorKind;

    #[test]
    fn test_fail_clears_size() {
        let mut file = FileRecord::new("a.txt");
        file.size = 42;
        file.fail(FileError::new(FileErrorKind::Read, "boom"));
        assert!(file.is_err());
        assert_eq!(file.size, 0);
    }

    #[test]
    fn test_absent_is_not_empty() {
        let absent = DigestRecord::absent(FileRecord::new("a"), "sha256");
        let empty = DigestRecord::new(FileRecord::new("a"), Vec::new(), "sha256");
        assert_ne!(absent.digest, empty.digest);
        assert_eq!(absent.hex(), "");
        assert_eq!(empty.hex(), "");
    }

    #[test]
    fn test_diff_status_symbols() {
        assert_eq!(DiffStatus::Unreadable.to_string(), "!");
        assert_eq!(DiffStatus::New.to_string(), "+");
        assert_eq!(DiffStatus::Unchanged.to_string(), "=");
        assert_eq!(DiffStatus::Changed.to_string(), "~");
        assert_eq!(DiffStatus::Indeterminate.to_string(), "?");
        assert_eq!("~".parse::<DiffStatus>().unwrap(), DiffStatus::Changed);
    }
}
