//! Digest storage in extended attributes, and bitrot detection.
//!
//! A digest is stored per file under `<prefix>.<algorithm>` as a small
//! postcard-encoded [`AttrRecord`]. Later runs recompute the digest and
//! [`diff`] it against the stored one:
//!
//! - `!` the file could not be read
//! - `+` nothing stored yet
//! - `=` unchanged
//! - `~` changed
//! - `?` not comparable
//!
//! The stages in this crate implement [`bitrat_core::Processor`] and slot
//! into the pipeline in place of a plain digest engine.

mod error;
mod record;
mod stages;
mod store;

pub use error::AttrError;
pub use record::{AttrRecord, attr_name, diff};
pub use stages::{AttrReader, AttrRemover, AttrTarget, AttrVerifier, AttrWriter};
pub use store::{AttributeStore, MemoryStore, XattrStore};

/// Default attribute name prefix. Linux only permits unprivileged
/// attributes in the `user` namespace.
#[cfg(target_os = "linux")]
pub const DEFAULT_PREFIX: &str = "user.bitrat";

/// Default attribute name prefix.
#[cfg(not(target_os = "linux"))]
pub const DEFAULT_PREFIX: &str = "bitrat";
