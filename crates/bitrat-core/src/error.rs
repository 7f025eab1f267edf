//! Error types for hashing runs.
//!
//! Two families live here. [`ConfigError`] is fatal and aborts a run before
//! its stages start. [`FileError`] is the
//! per-file, recoverable kind: it is attached to a record as data and the
//! record keeps flowing downstream.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal configuration errors detected before any stage is started.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Algorithm name not present in the registry.
    #[error("unsupported hash algorithm: {name}")]
    UnknownAlgorithm { name: String },

    /// A key was supplied for an algorithm with no keyed mode.
    #[error("HMAC unsupported for {algorithm}")]
    KeyUnsupported { algorithm: String },

    /// The key cannot be used with the selected algorithm.
    #[error("invalid key for {algorithm}: {reason}")]
    InvalidKey { algorithm: String, reason: String },

    /// Glob or exclude pattern failed to compile.
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Print template references an unknown placeholder or is malformed.
    #[error("invalid print format {template:?}: {message}")]
    InvalidTemplate { template: String, message: String },

    /// Output destination could not be opened for writing.
    #[error("error opening output file {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other invalid configuration value.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Create a generic invalid-configuration error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Kind of per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileErrorKind {
    /// Permission was denied.
    PermissionDenied,
    /// File vanished between discovery and processing.
    NotFound,
    /// Error opening or reading the file contents.
    Read,
    /// Error reading, writing or decoding the stored attribute.
    Attribute,
}

/// Recoverable failure attached to a single file's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// Kind of failure.
    pub kind: FileErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl FileError {
    /// Create a new file error.
    pub fn new(kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an I/O error raised while opening or reading a file.
    pub fn from_io(error: &std::io::Error) -> Self {
        let kind = match error.kind() {
            std::io::ErrorKind::PermissionDenied => FileErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => FileErrorKind::NotFound,
            _ => FileErrorKind::Read,
        };
        Self::new(kind, error.to_string())
    }

    /// Create an attribute error.
    pub fn attribute(message: impl Into<String>) -> Self {
        Self::new(FileErrorKind::Attribute, message)
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
