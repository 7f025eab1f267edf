//! Traversal capability and strategy selection.

use std::path::Path;

use crossbeam_channel::Sender;

use bitrat_core::{ConfigError, FileRecord, TraversalPolicy, WalkStrategy};

use crate::bounded::BoundedWalker;
use crate::sequential::SequentialWalker;

/// Counts reported by a finished walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Directories listed.
    pub dirs: u64,
    /// Files emitted.
    pub files: u64,
    /// Entries skipped because of a traversal or stat error.
    pub errors: u64,
}

impl WalkSummary {
    /// Combine the summaries of several roots.
    pub fn merge(self, other: Self) -> Self {
        Self {
            dirs: self.dirs + other.dirs,
            files: self.files + other.files,
            errors: self.errors + other.errors,
        }
    }
}

/// Walks a root and emits every matching regular file.
///
/// A walk returns once all of its descendants have been visited. Errors on
/// individual entries are logged and skipped. If every receiver of
/// `output` has gone away the walk stops early.
pub trait Walker: Send + Sync {
    /// Walk `root`, sending a record per matching file.
    fn walk(&self, root: &Path, output: &Sender<FileRecord>) -> WalkSummary;
}

/// Build the walker for a strategy.
pub fn walker_for(
    strategy: WalkStrategy,
    policy: &TraversalPolicy,
) -> Result<Box<dyn Walker>, ConfigError> {
    Ok(match strategy {
        WalkStrategy::Sequential => Box::new(SequentialWalker::new(policy)?),
        WalkStrategy::Bounded => Box::new(BoundedWalker::new(policy)?),
    })
}
