//! Core types and traits for bitrat.
//!
//! This crate provides the records that flow between pipeline stages, the
//! run configuration, the error taxonomy and the [`Processor`] trait that
//! hashing-stage workers implement.

mod config;
mod error;
mod record;
mod stats;

pub use config::{
    OrderingMode, PipelineConfig, PipelineConfigBuilder, TraversalPolicy,
    TraversalPolicyBuilder, VCS_DIRS, WalkStrategy, default_workers,
};
pub use error::{ConfigError, FileError, FileErrorKind};
pub use record::{DiffStatus, DigestRecord, FileRecord, Processor};
pub use stats::RunStats;
