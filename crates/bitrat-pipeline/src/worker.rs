//! Hashing stage worker loop.

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use bitrat_core::{DigestRecord, FileRecord, Processor};

/// Process files until the input queue is closed and drained.
///
/// Returns early if the output queue has no receivers left. Returns the
/// number of records forwarded.
pub fn run_worker<P: Processor>(
    id: usize,
    mut processor: P,
    input: Receiver<FileRecord>,
    output: Sender<DigestRecord>,
) -> u64 {
    let mut forwarded = 0;
    for file in input.iter() {
        if output.send(processor.process(file)).is_err() {
            debug!(worker = id, "Digest queue closed, stopping worker");
            break;
        }
        forwarded += 1;
    }
    debug!(worker = id, forwarded, "Worker finished");
    forwarded
}
