//! Single-threaded depth-first walker.

use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::Sender;
use jwalk::{Parallelism, WalkDir};
use tracing::{debug, warn};

use bitrat_core::{ConfigError, FileRecord, TraversalPolicy};

use crate::filter::EntryFilter;
use crate::walker::{WalkSummary, Walker};

/// Depth-first walker on the calling thread.
///
/// Children are read in name order, so discovery order is stable across
/// runs. Directories that must not be descended keep their entry but lose
/// their `read_children_path`, which stops jwalk from reading them.
#[derive(Debug, Clone)]
pub struct SequentialWalker {
    filter: Arc<EntryFilter>,
}

impl SequentialWalker {
    /// Create a walker for a policy.
    pub fn new(policy: &TraversalPolicy) -> Result<Self, ConfigError> {
        Ok(Self {
            filter: Arc::new(EntryFilter::new(policy)?),
        })
    }
}

impl Walker for SequentialWalker {
    fn walk(&self, root: &Path, output: &Sender<FileRecord>) -> WalkSummary {
        let filter = Arc::clone(&self.filter);
        let walk = WalkDir::new(root)
            .parallelism(Parallelism::Serial)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .process_read_dir(move |depth, _dir, _state, children| {
                // depth is None only for the list holding the root itself
                if depth.is_none() {
                    return;
                }
                for entry in children.iter_mut().flatten() {
                    if entry.file_type().is_dir()
                        && !filter.descend(&entry.file_name().to_string_lossy())
                    {
                        entry.read_children_path = None;
                    }
                }
            });

        let mut summary = WalkSummary::default();

        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        path = ?err.path(),
                        error = %err,
                        "Traversal error, skipping entry"
                    );
                    summary.errors += 1;
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                if entry.read_children_path.is_some() {
                    summary.dirs += 1;
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            if !self.filter.accept_file(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Cannot stat file, skipping");
                    summary.errors += 1;
                    continue;
                }
            };

            if output.send(FileRecord::with_metadata(path, &metadata)).is_err() {
                debug!(root = %root.display(), "File queue closed, stopping walk");
                break;
            }
            summary.files += 1;
        }

        summary
    }
}
