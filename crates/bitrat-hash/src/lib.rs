//! Digest engines for bitrat.
//!
//! Algorithms are looked up by name in a static registry and bound to a
//! [`DigestEngine`], which streams files (or any reader) through them:
//!
//! ```rust,no_run
//! use bitrat_hash::DigestEngine;
//!
//! let mut engine = DigestEngine::new("sha256", b"").unwrap();
//! let digest = engine.hash_stream(std::io::stdin()).unwrap();
//! ```
//!
//! A non-empty key turns every algorithm with a keyed mode into a MAC:
//! BLAKE2 and BLAKE3 key natively, everything else is wrapped in HMAC.

mod engine;
mod registry;

pub use engine::{DigestEngine, KeyedNaming};
pub use registry::{Algorithm, RunningHash, list_algorithms, lookup};
