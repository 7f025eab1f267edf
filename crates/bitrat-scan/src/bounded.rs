//! Directory-parallel walker with a cap on open directory handles.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::{debug, warn};

use bitrat_core::{ConfigError, FileRecord, TraversalPolicy};

use crate::filter::EntryFilter;
use crate::walker::{WalkSummary, Walker};

/// Walker spawning one rayon task per directory.
///
/// Every task takes a slot from a counting semaphore sized to the policy's
/// concurrency before opening its directory and keeps it until it has
/// emitted its files and spawned its subdirectories. Tasks waiting for a
/// slot sit in the pool's queue; no thread is created per directory. The
/// enclosing `rayon::scope` is the completion counter: `walk` returns only
/// once every spawned task has finished.
#[derive(Debug, Clone)]
pub struct BoundedWalker {
    filter: EntryFilter,
    concurrency: usize,
}

impl BoundedWalker {
    /// Create a walker for a policy.
    pub fn new(policy: &TraversalPolicy) -> Result<Self, ConfigError> {
        if policy.concurrency == 0 {
            return Err(ConfigError::invalid("traversal concurrency must be at least 1"));
        }
        Ok(Self {
            filter: EntryFilter::new(policy)?,
            concurrency: policy.concurrency,
        })
    }
}

impl Walker for BoundedWalker {
    fn walk(&self, root: &Path, output: &Sender<FileRecord>) -> WalkSummary {
        let state = self.run(root, output);
        debug!(
            root = %root.display(),
            peak_listings = state.peak.load(Ordering::Relaxed),
            "Bounded walk finished"
        );
        state.summary()
    }
}

impl BoundedWalker {
    fn run<'a>(&'a self, root: &Path, output: &'a Sender<FileRecord>) -> WalkState<'a> {
        let state = WalkState {
            filter: &self.filter,
            slots: DirSlots::new(self.concurrency),
            output,
            closed: AtomicBool::new(false),
            dirs: AtomicU64::new(0),
            files: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            peak: AtomicUsize::new(0),
        };

        match fs::metadata(root) {
            Ok(metadata) if metadata.is_dir() => {
                rayon::scope(|scope| state.visit(scope, root.to_path_buf()));
            }
            Ok(metadata) if metadata.is_file() => {
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if state.filter.accept_file(&name) {
                    state.emit(root.to_path_buf(), &metadata);
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(path = %root.display(), error = %err, "Cannot read root, skipping");
                state.errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        state
    }
}

/// Shared state of one walk, borrowed by every task in its scope.
struct WalkState<'a> {
    filter: &'a EntryFilter,
    slots: DirSlots,
    output: &'a Sender<FileRecord>,
    closed: AtomicBool,
    dirs: AtomicU64,
    files: AtomicU64,
    errors: AtomicU64,
    /// Most directories held open at once.
    peak: AtomicUsize,
}

impl<'a> WalkState<'a> {
    fn visit<'s>(&'s self, scope: &rayon::Scope<'s>, dir: PathBuf) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }

        let _slot = self.slots.acquire();
        self.peak.fetch_max(self.slots.in_use(), Ordering::Relaxed);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "Cannot list directory, skipping");
                self.errors.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        self.dirs.fetch_add(1, Ordering::Relaxed);

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "Traversal error, skipping entry");
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "Cannot stat entry, skipping");
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if file_type.is_dir() {
                if self.filter.descend(&name) {
                    let path = entry.path();
                    scope.spawn(move |scope| self.visit(scope, path));
                }
            } else if file_type.is_file() && self.filter.accept_file(&name) {
                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(err) => {
                        warn!(path = %entry.path().display(), error = %err, "Cannot stat file, skipping");
                        self.errors.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                };
                if !self.emit(entry.path(), &metadata) {
                    return;
                }
            }
        }
    }

    /// Send one record. Returns false once the queue has been closed.
    fn emit(&self, path: PathBuf, metadata: &fs::Metadata) -> bool {
        if self.output.send(FileRecord::with_metadata(path, metadata)).is_err() {
            if !self.closed.swap(true, Ordering::Relaxed) {
                debug!("File queue closed, stopping walk");
            }
            return false;
        }
        self.files.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn summary(&self) -> WalkSummary {
        WalkSummary {
            dirs: self.dirs.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Counting semaphore over a bounded channel of tokens.
///
/// Acquiring pushes a token and blocks while `capacity` tokens are out;
/// dropping the guard takes one back.
struct DirSlots {
    tokens: Sender<()>,
    returns: Receiver<()>,
}

impl DirSlots {
    fn new(capacity: usize) -> Self {
        let (tokens, returns) = bounded(capacity);
        Self { tokens, returns }
    }

    fn acquire(&self) -> SlotGuard<'_> {
        // Both ends live in self, so the channel never disconnects.
        let _ = self.tokens.send(());
        SlotGuard { slots: self }
    }

    fn in_use(&self) -> usize {
        self.tokens.len()
    }
}

struct SlotGuard<'a> {
    slots: &'a DirSlots,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let _ = self.slots.returns.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn wide_tree(dirs: usize, files_per_dir: usize) -> TempDir {
        let temp = TempDir::new().unwrap();
        for d in 0..dirs {
            let dir = temp.path().join(format!("d{d}"));
            fs::create_dir(&dir).unwrap();
            fs::create_dir(dir.join("nested")).unwrap();
            for f in 0..files_per_dir {
                fs::write(dir.join(format!("f{f}.bin")), [d as u8, f as u8]).unwrap();
            }
            fs::write(dir.join("nested/leaf.bin"), "leaf").unwrap();
        }
        temp
    }

    #[test]
    fn test_slots_count() {
        let slots = DirSlots::new(2);
        assert_eq!(slots.in_use(), 0);
        let a = slots.acquire();
        let b = slots.acquire();
        assert_eq!(slots.in_use(), 2);
        drop(a);
        assert_eq!(slots.in_use(), 1);
        drop(b);
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn test_acquire_blocks_when_full() {
        let slots = DirSlots::new(2);
        let first = slots.acquire();
        let _second = slots.acquire();
        let acquired = AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                let _third = slots.acquire();
                acquired.store(true, Ordering::SeqCst);
            });
            std::thread::sleep(std::time::Duration::from_millis(100));
            assert!(!acquired.load(Ordering::SeqCst));
            drop(first);
        });
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_open_directories_stay_within_concurrency() {
        let temp = wide_tree(64, 2);
        let policy = TraversalPolicy::builder()
            .recurse(true)
            .concurrency(2usize)
            .build()
            .unwrap();
        let walker = BoundedWalker::new(&policy).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let state = walker.run(temp.path(), &tx);
        let peak = state.peak.load(Ordering::Relaxed);
        let summary = state.summary();
        drop(state);
        drop(tx);

        assert!((1..=2).contains(&peak), "peak {peak}");
        assert_eq!(summary.dirs, 1 + 64 * 2);
        assert_eq!(rx.iter().count(), 64 * 3);
    }

    #[test]
    fn test_single_slot_wide_tree_completes() {
        let temp = wide_tree(16, 4);
        let policy = TraversalPolicy::builder()
            .recurse(true)
            .concurrency(1usize)
            .build()
            .unwrap();
        let walker = BoundedWalker::new(&policy).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let summary = walker.walk(temp.path(), &tx);
        drop(tx);

        let paths: BTreeSet<_> = rx.iter().map(|r| r.path).collect();
        assert_eq!(paths.len(), 16 * 5);
        assert_eq!(summary.files, 80);
        // root + 16 dirs + 16 nested
        assert_eq!(summary.dirs, 33);
    }

    #[test]
    fn test_root_file_is_emitted() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("only.txt");
        fs::write(&file, "x").unwrap();

        let walker = BoundedWalker::new(&TraversalPolicy::default()).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        walker.walk(&file, &tx);
        drop(tx);

        let records: Vec<_> = rx.iter().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, file);
    }

    #[test]
    fn test_stops_when_queue_closed() {
        let temp = wide_tree(4, 4);
        let policy = TraversalPolicy::builder().recurse(true).build().unwrap();
        let walker = BoundedWalker::new(&policy).unwrap();

        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        let summary = walker.walk(temp.path(), &tx);
        assert_eq!(summary.files, 0);
    }
}
