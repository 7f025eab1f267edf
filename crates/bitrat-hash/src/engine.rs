//! Digest engine: one running hash bound to an algorithm name.

use std::fs::File;
use std::io::{self, Read};
use std::time::Instant;

use compact_str::{CompactString, format_compact};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use bitrat_core::{ConfigError, DigestRecord, FileError, FileRecord, Processor};

use crate::registry::{Algorithm, RunningHash, lookup};

/// Read buffer size for streaming file contents.
const BUFFER_SIZE: usize = 64 * 1024;

/// Reported name of algorithms that are keyed even without a key.
///
/// Algorithms that are not inherently keyed are always reported as
/// `hmac-<name>` when the key is non-empty and as `<name>` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum KeyedNaming {
    /// `hmac-<name>` when the key is non-empty.
    #[default]
    Prefixed,
    /// Always `<name>`.
    Unprefixed,
}

/// A keyed or unkeyed digest primitive with its reported name.
///
/// An engine is stateful and must not be shared between workers. Clone it
/// to get an independent instance for another worker.
pub struct DigestEngine {
    name: CompactString,
    algorithm: &'static Algorithm,
    hash: Box<dyn RunningHash>,
    buffer: Vec<u8>,
}

impl DigestEngine {
    /// Create an engine. An empty key means unkeyed.
    pub fn new(algorithm: &str, key: &[u8]) -> Result<Self, ConfigError> {
        Self::with_naming(algorithm, key, KeyedNaming::default())
    }

    /// Create an engine with an explicit naming policy for inherently keyed
    /// algorithms.
    pub fn with_naming(
        algorithm: &str,
        key: &[u8],
        naming: KeyedNaming,
    ) -> Result<Self, ConfigError> {
        let entry = lookup(algorithm).ok_or_else(|| ConfigError::UnknownAlgorithm {
            name: algorithm.to_string(),
        })?;

        if !key.is_empty() && !entry.supports_key() {
            return Err(ConfigError::KeyUnsupported {
                algorithm: algorithm.to_string(),
            });
        }

        let hash = entry
            .instantiate(key)
            .map_err(|reason| ConfigError::InvalidKey {
                algorithm: algorithm.to_string(),
                reason,
            })?;

        let prefixed = match (key.is_empty(), entry.is_inherently_keyed(), naming) {
            (true, _, _) => false,
            (false, true, KeyedNaming::Unprefixed) => false,
            (false, _, _) => true,
        };
        let name = if prefixed {
            format_compact!("hmac-{}", entry.name)
        } else {
            CompactString::new(entry.name)
        };

        Ok(Self {
            name,
            algorithm: entry,
            hash,
            buffer: vec![0; BUFFER_SIZE],
        })
    }

    /// Reported algorithm name, e.g. `sha256` or `hmac-sha256`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry entry backing this engine.
    pub fn algorithm(&self) -> &'static Algorithm {
        self.algorithm
    }

    /// Hash a file's contents.
    ///
    /// Open and read failures are recorded on the returned record, whose
    /// digest is then absent. On success the record's size is the number of
    /// bytes read and its processing time is set. The engine is reset either
    /// way.
    pub fn hash_file(&mut self, mut file: FileRecord) -> DigestRecord {
        let mut handle = match File::open(&file.path) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(path = %file.path.display(), error = %err, "Cannot open file");
                file.fail(FileError::from_io(&err));
                return DigestRecord::absent(file, self.name.clone());
            }
        };

        let start = Instant::now();
        match self.consume(&mut handle) {
            Ok(size) => {
                let digest = self.hash.finish_reset();
                file.size = size;
                file.proc_time = start.elapsed();
                DigestRecord::new(file, digest, self.name.clone())
            }
            Err(err) => {
                warn!(path = %file.path.display(), error = %err, "Cannot read file");
                self.hash.finish_reset();
                file.fail(FileError::from_io(&err));
                DigestRecord::absent(file, self.name.clone())
            }
        }
    }

    /// Hash an arbitrary byte stream.
    pub fn hash_stream<R: Read>(&mut self, mut reader: R) -> io::Result<Vec<u8>> {
        match self.consume(&mut reader) {
            Ok(_) => Ok(self.hash.finish_reset()),
            Err(err) => {
                self.hash.finish_reset();
                Err(err)
            }
        }
    }

    fn consume<R: Read>(&mut self, reader: &mut R) -> io::Result<u64> {
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut self.buffer) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            self.hash.update(&self.buffer[..n]);
            total += n as u64;
        }
    }
}

impl Clone for DigestEngine {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            algorithm: self.algorithm,
            hash: self.hash.box_clone(),
            buffer: vec![0; BUFFER_SIZE],
        }
    }
}

impl std::fmt::Debug for DigestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestEngine")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Processor for DigestEngine {
    fn process(&mut self, file: FileRecord) -> DigestRecord {
        self.hash_file(file)
    }
}
