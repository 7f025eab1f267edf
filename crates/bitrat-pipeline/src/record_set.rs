//! Structured result set.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use bitrat_core::{DigestRecord, RunStats};

use crate::error::PipelineError;

/// Encoding of a structured result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// Compact binary (postcard).
    #[default]
    Binary,
    /// Pretty-printed JSON.
    Json,
}

/// Per-path digest metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashData {
    /// Digest bytes, absent when the file could not be read.
    pub digest: Option<Vec<u8>>,
    /// Bytes hashed.
    pub size: u64,
    /// Modification time at discovery.
    pub mod_time: Option<SystemTime>,
}

/// All results of a run, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Reported algorithm name.
    pub algorithm: String,
    /// Results by path.
    pub entries: BTreeMap<String, HashData>,
    /// Run totals, when statistics were enabled.
    pub statistics: Option<RunStats>,
}

impl RecordSet {
    /// Create an empty set for an algorithm.
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            ..Self::default()
        }
    }

    /// Add a record. A later record for the same path replaces an earlier one.
    pub fn insert(&mut self, record: &DigestRecord) {
        self.entries.insert(
            record.path().to_string_lossy().into_owned(),
            HashData {
                digest: record.digest.clone(),
                size: record.file.size,
                mod_time: record.file.mod_time,
            },
        );
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the whole set.
    pub fn encode(&self, encoding: Encoding) -> Result<Vec<u8>, PipelineError> {
        Ok(match encoding {
            Encoding::Binary => postcard::to_allocvec(self)?,
            Encoding::Json => serde_json::to_vec_pretty(self)?,
        })
    }

    /// Read back a binary-encoded set.
    pub fn decode(bytes: &[u8]) -> Result<Self, PipelineError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}
