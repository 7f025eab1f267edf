//! Progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use bitrat_core::DigestRecord;

/// Records between two progress updates.
pub const PROGRESS_INTERVAL: u64 = 256;

/// Progress snapshot published by the output stage.
#[derive(Debug, Clone)]
pub struct HashProgress {
    /// Records output so far.
    pub files: u64,
    /// Bytes hashed so far.
    pub bytes: u64,
    /// Records carrying a per-file error.
    pub errors: u64,
    /// Path of the most recent record.
    pub current_path: PathBuf,
    /// Time since the run started.
    pub elapsed: Duration,
    /// Set on the final snapshot of a run.
    pub done: bool,
}

impl HashProgress {
    /// Calculate rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate rate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Output-side tracker that publishes a snapshot every
/// [`PROGRESS_INTERVAL`] records.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    tx: broadcast::Sender<HashProgress>,
    start: Instant,
    files: u64,
    bytes: u64,
    errors: u64,
    current_path: PathBuf,
}

impl ProgressTracker {
    pub(crate) fn new(tx: broadcast::Sender<HashProgress>, start: Instant) -> Self {
        Self {
            tx,
            start,
            files: 0,
            bytes: 0,
            errors: 0,
            current_path: PathBuf::new(),
        }
    }

    pub(crate) fn observe(&mut self, record: &DigestRecord) {
        self.files += 1;
        self.bytes += record.file.size;
        if record.file.is_err() {
            self.errors += 1;
        }
        self.current_path.clone_from(&record.file.path);
        if self.files % PROGRESS_INTERVAL == 0 {
            self.publish(false);
        }
    }

    pub(crate) fn finish(&self) {
        self.publish(true);
    }

    fn publish(&self, done: bool) {
        // No subscribers is fine
        let _ = self.tx.send(HashProgress {
            files: self.files,
            bytes: self.bytes,
            errors: self.errors,
            current_path: self.current_path.clone(),
            elapsed: self.start.elapsed(),
            done,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitrat_core::FileRecord;

    #[test]
    fn test_publishes_on_interval_and_finish() {
        let (tx, mut rx) = broadcast::channel(16);
        let mut tracker = ProgressTracker::new(tx, Instant::now());

        for i in 0..PROGRESS_INTERVAL * 2 + 1 {
            let mut file = FileRecord::new(format!("f{i}"));
            file.size = 1;
            tracker.observe(&DigestRecord::new(file, vec![], "t"));
        }
        tracker.finish();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.files, PROGRESS_INTERVAL);
        assert_eq!(first.current_path, PathBuf::from("f255"));
        assert!(!first.done);

        let second = rx.try_recv().unwrap();
        assert_eq!(second.files, PROGRESS_INTERVAL * 2);

        let last = rx.try_recv().unwrap();
        assert_eq!(last.files, PROGRESS_INTERVAL * 2 + 1);
        assert_eq!(last.bytes, PROGRESS_INTERVAL * 2 + 1);
        assert_eq!(last.current_path, PathBuf::from(format!("f{}", PROGRESS_INTERVAL * 2)));
        assert!(last.done);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rates() {
        let progress = HashProgress {
            files: 10,
            bytes: 1000,
            errors: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::from_secs(2),
            done: true,
        };
        assert_eq!(progress.files_per_second(), 5.0);
        assert_eq!(progress.bytes_per_second(), 500.0);
    }
}
