//! Concurrent hashing pipeline for bitrat.
//!
//! # Overview
//!
//! A [`Pipeline`] connects four stages with bounded queues:
//!
//! - **Traversal**: one walker thread per root (see `bitrat-scan`)
//! - **Hashing**: a fixed pool of workers, each owning its own
//!   [`Processor`](bitrat_core::Processor)
//! - **Ordering**: FIFO relay or buffer-and-sort by path
//! - **Output**: a [`Renderer`] producing text lines or a structured
//!   [`RecordSet`]
//!
//! Full queues block their producers, so memory stays bounded however large
//! the tree is (except for the sort-by-path discipline, which has to hold
//! every record).
//!
//! # Example
//!
//! ```rust,no_run
//! use bitrat_core::{PipelineConfig, TraversalPolicy};
//! use bitrat_hash::DigestEngine;
//! use bitrat_pipeline::{Destination, Output, Pipeline, Template};
//!
//! let engine = DigestEngine::new("sha256", b"").unwrap();
//! let output = Output::Text {
//!     template: Template::default(),
//!     destination: Destination::Stdout,
//! };
//! let renderer = output.into_renderer(engine.name()).unwrap();
//!
//! let pipeline = Pipeline::new(PipelineConfig::default(), TraversalPolicy::default());
//! let report = pipeline.run(&[".".into()], engine, renderer).unwrap();
//! eprintln!("{} files", report.stats.files);
//! ```

mod error;
mod order;
mod output;
mod pipeline;
mod progress;
mod record_set;
mod worker;

pub use error::PipelineError;
pub use order::{by_path, fifo, run_ordering, sort_by_path};
pub use output::{
    DEFAULT_TEMPLATE, Destination, Discard, Output, Renderer, STATUS_TEMPLATE,
    StructuredRenderer, Template, TextRenderer,
};
pub use pipeline::{Pipeline, RunReport};
pub use progress::{HashProgress, PROGRESS_INTERVAL};
pub use record_set::{Encoding, HashData, RecordSet};
pub use worker::run_worker;
