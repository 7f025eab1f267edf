//! Ordering stage.

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use bitrat_core::{DigestRecord, OrderingMode};

/// Relay records from `input` to `output` under the given discipline.
pub fn run_ordering(mode: OrderingMode, input: Receiver<DigestRecord>, output: Sender<DigestRecord>) {
    match mode {
        OrderingMode::Fifo => fifo(input, output),
        OrderingMode::ByPath => by_path(input, output),
    }
}

/// Forward each record as it arrives.
pub fn fifo(input: Receiver<DigestRecord>, output: Sender<DigestRecord>) {
    for record in input.iter() {
        if output.send(record).is_err() {
            debug!("Output queue closed, stopping relay");
            return;
        }
    }
}

/// Buffer every record until `input` closes, then emit them sorted by path.
pub fn by_path(input: Receiver<DigestRecord>, output: Sender<DigestRecord>) {
    let mut records: Vec<DigestRecord> = input.iter().collect();
    sort_by_path(&mut records);
    debug!(records = records.len(), "Sorted records");

    for record in records {
        if output.send(record).is_err() {
            debug!("Output queue closed, stopping sorted emit");
            return;
        }
    }
}

/// Stable byte-wise sort by path.
pub fn sort_by_path(records: &mut [DigestRecord]) {
    records.sort_by(|a, b| a.file.sort_key().cmp(b.file.sort_key()));
}
