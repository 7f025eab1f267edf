//! Pipeline orchestrator.
//!
//! ```text
//!  walker-0 ─┐           ┌─ hasher-0 ─┐
//!            ├─ files ──┼─ hasher-1 ─┼─ digests ── order ── ordered ── output
//!  walker-1 ─┘           └─ hasher-N ─┘
//! ```
//!
//! Every link is a bounded crossbeam queue. A queue closes when the last
//! thread holding a sender for it exits, and the consumers drain whatever
//! is still buffered before they exit in turn. Joining the stages in
//! pipeline order therefore shuts the whole graph down without losing a
//! record.

use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, bounded};
use tokio::sync::broadcast;
use tracing::debug;

use bitrat_core::{DigestRecord, FileRecord, PipelineConfig, Processor, RunStats, TraversalPolicy};
use bitrat_scan::{WalkSummary, walker_for};

use crate::error::PipelineError;
use crate::order::run_ordering;
use crate::output::Renderer;
use crate::progress::{HashProgress, ProgressTracker};
use crate::worker::run_worker;

/// Outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Totals accumulated by the output stage.
    pub stats: RunStats,
    /// Traversal totals across all roots.
    pub walk: WalkSummary,
}

/// Wires traversal, hashing, ordering and output together.
pub struct Pipeline {
    config: PipelineConfig,
    policy: TraversalPolicy,
    progress_tx: broadcast::Sender<HashProgress>,
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(config: PipelineConfig, policy: TraversalPolicy) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config,
            policy,
            progress_tx,
        }
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<HashProgress> {
        self.progress_tx.subscribe()
    }

    /// Run to completion over `roots`.
    ///
    /// Each hashing worker gets its own clone of `processor`. Fails before
    /// starting any stage if the traversal policy is invalid.
    pub fn run<P>(
        &self,
        roots: &[PathBuf],
        processor: P,
        renderer: Box<dyn Renderer>,
    ) -> Result<RunReport, PipelineError>
    where
        P: Processor + Clone,
    {
        let walker = walker_for(self.config.strategy, &self.policy)?;
        let workers = self.config.workers;
        let with_stats = self.config.stats;
        let start = Instant::now();

        debug!(
            roots = roots.len(),
            workers,
            strategy = %self.config.strategy,
            ordering = %self.config.ordering,
            "Starting pipeline"
        );

        let (file_tx, file_rx) = bounded::<FileRecord>(self.config.readahead);
        let (digest_tx, digest_rx) = bounded::<DigestRecord>(self.config.writeahead);
        let (ordered_tx, ordered_rx) = bounded::<DigestRecord>(self.config.order_capacity);

        thread::scope(|scope| {
            let tracker = ProgressTracker::new(self.progress_tx.clone(), start);
            let output = thread::Builder::new()
                .name("output".to_string())
                .spawn_scoped(scope, move || {
                    output_stage(renderer, ordered_rx, tracker, workers, with_stats, start)
                })
                .map_err(|source| PipelineError::Spawn {
                    stage: "output",
                    source,
                })?;

            let ordering = self.config.ordering;
            let order = thread::Builder::new()
                .name("order".to_string())
                .spawn_scoped(scope, move || run_ordering(ordering, digest_rx, ordered_tx))
                .map_err(|source| PipelineError::Spawn {
                    stage: "order",
                    source,
                })?;

            let mut hashers = Vec::with_capacity(workers);
            for id in 0..workers {
                let processor = processor.clone();
                let input = file_rx.clone();
                let output = digest_tx.clone();
                let handle = thread::Builder::new()
                    .name(format!("hasher-{id}"))
                    .spawn_scoped(scope, move || run_worker(id, processor, input, output))
                    .map_err(|source| PipelineError::Spawn {
                        stage: "hashing",
                        source,
                    })?;
                hashers.push(handle);
            }
            drop(file_rx);
            drop(digest_tx);

            let mut walkers = Vec::with_capacity(roots.len());
            for (id, root) in roots.iter().enumerate() {
                let walker = &walker;
                let output = file_tx.clone();
                let handle = thread::Builder::new()
                    .name(format!("walker-{id}"))
                    .spawn_scoped(scope, move || walker.walk(root, &output))
                    .map_err(|source| PipelineError::Spawn {
                        stage: "traversal",
                        source,
                    })?;
                walkers.push(handle);
            }
            drop(file_tx);

            // Producers first, then each downstream stage in turn.
            let mut walk = WalkSummary::default();
            for handle in walkers {
                let summary = handle
                    .join()
                    .map_err(|_| PipelineError::StagePanicked { stage: "traversal" })?;
                walk = walk.merge(summary);
            }
            debug!(dirs = walk.dirs, files = walk.files, errors = walk.errors, "Traversal finished");

            let mut hashed = 0;
            for handle in hashers {
                hashed += handle
                    .join()
                    .map_err(|_| PipelineError::StagePanicked { stage: "hashing" })?;
            }
            debug!(hashed, "Hashing finished");

            order
                .join()
                .map_err(|_| PipelineError::StagePanicked { stage: "order" })?;

            let stats = output
                .join()
                .map_err(|_| PipelineError::StagePanicked { stage: "output" })??;

            Ok(RunReport { stats, walk })
        })
    }
}

fn output_stage(
    mut renderer: Box<dyn Renderer>,
    input: Receiver<DigestRecord>,
    mut tracker: ProgressTracker,
    workers: usize,
    with_stats: bool,
    start: Instant,
) -> Result<RunStats, PipelineError> {
    let mut stats = RunStats::new(workers);
    for record in input.iter() {
        stats.record(&record);
        tracker.observe(&record);
        renderer.render(&record)?;
    }
    stats.elapsed = start.elapsed();
    tracker.finish();
    renderer.finish(with_stats.then_some(&stats))?;
    Ok(stats)
}
