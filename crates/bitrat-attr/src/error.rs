//! Attribute store errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to an attribute store.
///
/// An attribute that does not exist is not an error: stores report it as
/// `Ok(None)`.
#[derive(Debug, Error)]
pub enum AttrError {
    /// The underlying get/set/remove call failed.
    #[error("attribute {name} on {path}: {source}")]
    Io {
        path: PathBuf,
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored value could not be decoded.
    #[error("malformed attribute {name} on {path}: {message}")]
    Malformed {
        path: PathBuf,
        name: String,
        message: String,
    },

    /// A record could not be encoded for storage.
    #[error("cannot encode attribute record: {0}")]
    Encode(#[from] postcard::Error),

    /// Extended attributes are not available on this platform.
    #[error("extended attributes are not supported on this platform")]
    Unsupported,
}

impl AttrError {
    /// Create an I/O error with path and attribute context.
    pub fn io(path: impl Into<PathBuf>, name: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            name: name.to_string(),
            source,
        }
    }
}
