//! Run statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::record::DigestRecord;

/// Totals accumulated by the output stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Number of records seen.
    pub files: u64,
    /// Total bytes hashed.
    pub bytes: u64,
    /// Number of records carrying a per-file error.
    pub errors: u64,
    /// Sum of per-file hashing time across all workers.
    pub cpu_time: Duration,
    /// Wall time from pipeline start to end of output.
    pub elapsed: Duration,
    /// Number of hashing workers.
    pub workers: usize,
}

impl RunStats {
    /// Create empty stats for a run with the given worker count.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Fold one record into the totals.
    pub fn record(&mut self, record: &DigestRecord) {
        self.files += 1;
        self.bytes += record.file.size;
        self.cpu_time += record.file.proc_time;
        if record.file.is_err() {
            self.errors += 1;
        }
    }

    /// Throughput in decimal megabytes per second of wall time.
    pub fn megabytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs / 1_000_000.0
        } else {
            0.0
        }
    }
}
