//! Directory traversal engines for bitrat.
//!
//! # Overview
//!
//! `bitrat-scan` turns a root path and a [`TraversalPolicy`] into a stream of
//! [`FileRecord`]s pushed onto a bounded crossbeam queue. Two strategies
//! implement the same [`Walker`] capability:
//!
//! - [`SequentialWalker`]: depth-first on the calling thread via jwalk, in
//!   name order
//! - [`BoundedWalker`]: one rayon task per directory, with a cap on the
//!   number of directories listed at once
//!
//! Both apply the same [`EntryFilter`], return once every descendant has
//! been visited, and block on the queue when downstream is saturated.
//!
//! # Example
//!
//! ```rust,no_run
//! use bitrat_scan::{TraversalPolicy, WalkStrategy, walker_for};
//!
//! let policy = TraversalPolicy::builder().recurse(true).build().unwrap();
//! let walker = walker_for(WalkStrategy::Bounded, &policy).unwrap();
//!
//! let (tx, rx) = crossbeam_channel::bounded(128);
//! std::thread::spawn(move || walker.walk("/data".as_ref(), &tx));
//! for record in rx {
//!     println!("{}", record.path.display());
//! }
//! ```

mod bounded;
mod filter;
mod sequential;
mod walker;

pub use bounded::BoundedWalker;
pub use filter::EntryFilter;
pub use sequential::SequentialWalker;
pub use walker::{WalkSummary, Walker, walker_for};

// Re-export core types for convenience
pub use bitrat_core::{ConfigError, FileRecord, TraversalPolicy, WalkStrategy};
