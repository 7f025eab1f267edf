//! Hashing-stage processors that read, compare, write or remove stored
//! digests.
//!
//! Each processor is cloned once per worker. Clones share the store but own
//! their digest engine.

use std::sync::Arc;

use compact_str::CompactString;
use tracing::{debug, warn};

use bitrat_core::{DiffStatus, DigestRecord, FileError, FileRecord, Processor};
use bitrat_hash::DigestEngine;

use crate::record::{AttrRecord, attr_name, diff};
use crate::store::AttributeStore;

/// Where a processor stores digests and under which name.
#[derive(Clone)]
pub struct AttrTarget {
    store: Arc<dyn AttributeStore>,
    name: String,
    algorithm: CompactString,
}

impl AttrTarget {
    /// Target `<prefix>.<algorithm>` in `store`.
    pub fn new(store: Arc<dyn AttributeStore>, prefix: &str, algorithm: &str) -> Self {
        Self {
            store,
            name: attr_name(prefix, algorithm),
            algorithm: CompactString::new(algorithm),
        }
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the stored record for a file, if any.
    fn load(&self, file: &FileRecord) -> Result<Option<AttrRecord>, FileError> {
        let bytes = self
            .store
            .get(&file.path, &self.name)
            .map_err(|e| FileError::attribute(e.to_string()))?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let record = AttrRecord::decode(&file.path, &self.name, &bytes)
            .map_err(|e| FileError::attribute(e.to_string()))?;
        if record.algorithm != self.algorithm {
            return Err(FileError::attribute(format!(
                "attribute {} holds a {} digest",
                self.name, record.algorithm
            )));
        }
        Ok(Some(record))
    }
}

impl std::fmt::Debug for AttrTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttrTarget")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn fail(mut file: FileRecord, error: FileError, algorithm: &str) -> DigestRecord {
    warn!(path = %file.path.display(), error = %error, "Attribute failure");
    file.fail(error);
    DigestRecord::absent(file, algorithm)
}

/// Emits the stored digest instead of a freshly computed one.
#[derive(Debug, Clone)]
pub struct AttrReader {
    target: AttrTarget,
}

impl AttrReader {
    /// Create a reader.
    pub fn new(target: AttrTarget) -> Self {
        Self { target }
    }
}

impl Processor for AttrReader {
    fn process(&mut self, file: FileRecord) -> DigestRecord {
        let algorithm = self.target.algorithm.clone();
        match self.target.load(&file) {
            Ok(Some(stored)) => DigestRecord::new(file, stored.digest, algorithm),
            Ok(None) => DigestRecord::absent(file, algorithm),
            Err(err) => fail(file, err, &algorithm),
        }
    }
}

/// Hashes a file and classifies the result against the stored digest.
#[derive(Debug, Clone)]
pub struct AttrVerifier {
    engine: DigestEngine,
    target: AttrTarget,
}

impl AttrVerifier {
    /// Create a verifier. The target should be named after the engine.
    pub fn new(engine: DigestEngine, target: AttrTarget) -> Self {
        Self { engine, target }
    }
}

impl Processor for AttrVerifier {
    fn process(&mut self, file: FileRecord) -> DigestRecord {
        let live = self.engine.hash_file(file);
        if live.digest.is_none() {
            return live.with_status(DiffStatus::Unreadable);
        }
        let status = match self.target.load(&live.file) {
            Ok(stored) => diff(
                live.digest.as_deref(),
                stored.as_ref().map(|s| s.digest.as_slice()),
            ),
            Err(err) => {
                warn!(path = %live.path().display(), error = %err, "Cannot read stored digest");
                DiffStatus::Indeterminate
            }
        };
        live.with_status(status)
    }
}

/// Hashes a file, classifies it against the stored digest, and stores the
/// new digest unless it is unchanged. A stored value that cannot be read
/// back classifies as `?` and is overwritten.
#[derive(Debug, Clone)]
pub struct AttrWriter {
    engine: DigestEngine,
    target: AttrTarget,
}

impl AttrWriter {
    /// Create a writer. The target should be named after the engine.
    pub fn new(engine: DigestEngine, target: AttrTarget) -> Self {
        Self { engine, target }
    }
}

impl Processor for AttrWriter {
    fn process(&mut self, file: FileRecord) -> DigestRecord {
        let live = self.engine.hash_file(file);
        let Some(record) = AttrRecord::from_digest(&live) else {
            return live.with_status(DiffStatus::Unreadable);
        };

        let status = match self.target.load(&live.file) {
            Ok(previous) => diff(
                Some(&record.digest),
                previous.as_ref().map(|p| p.digest.as_slice()),
            ),
            Err(err) => {
                warn!(path = %live.path().display(), error = %err, "Overwriting unreadable stored digest");
                DiffStatus::Indeterminate
            }
        };
        if status == DiffStatus::Unchanged {
            return live.with_status(status);
        }

        let stored = record.encode().and_then(|bytes| {
            self.target
                .store
                .set(&live.file.path, &self.target.name, &bytes)
        });
        match stored {
            Ok(()) => live.with_status(status),
            Err(err) => {
                let algorithm = live.algorithm.clone();
                fail(live.file, FileError::attribute(err.to_string()), &algorithm)
                    .with_status(DiffStatus::Unreadable)
            }
        }
    }
}

/// Removes the stored digest where present.
#[derive(Debug, Clone)]
pub struct AttrRemover {
    target: AttrTarget,
}

impl AttrRemover {
    /// Create a remover.
    pub fn new(target: AttrTarget) -> Self {
        Self { target }
    }
}

impl Processor for AttrRemover {
    fn process(&mut self, file: FileRecord) -> DigestRecord {
        let algorithm = self.target.algorithm.clone();
        let present = match self.target.store.get(&file.path, &self.target.name) {
            Ok(value) => value.is_some(),
            Err(err) => return fail(file, FileError::attribute(err.to_string()), &algorithm),
        };
        if !present {
            return DigestRecord::absent(file, algorithm);
        }
        match self.target.store.remove(&file.path, &self.target.name) {
            Ok(()) => {
                debug!(path = %file.path.display(), name = %self.target.name, "Removed attribute");
                DigestRecord::absent(file, algorithm)
            }
            Err(err) => fail(file, FileError::attribute(err.to_string()), &algorithm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<MemoryStore>, AttrTarget, DigestEngine) {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "hello").unwrap();
        let store = Arc::new(MemoryStore::new());
        let engine = DigestEngine::new("sha256", b"").unwrap();
        let target = AttrTarget::new(store.clone(), "user.bitrat", engine.name());
        (temp, store, target, engine)
    }

    #[test]
    fn test_reader_absent_and_present() {
        let (temp, _store, target, engine) = setup();
        let path = temp.path().join("a.txt");
        let mut reader = AttrReader::new(target.clone());

        let first = reader.process(FileRecord::new(&path));
        assert!(first.digest.is_none());
        assert!(!first.file.is_err());

        AttrWriter::new(engine, target).process(FileRecord::new(&path));
        let second = reader.process(FileRecord::new(&path));
        assert_eq!(
            second.hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_writer_skips_unchanged() {
        let (temp, store, target, engine) = setup();
        let path = temp.path().join("a.txt");
        let mut writer = AttrWriter::new(engine, target);

        assert_eq!(
            writer.process(FileRecord::new(&path)).status,
            Some(DiffStatus::New)
        );
        assert_eq!(store.len(), 1);
        assert_eq!(
            writer.process(FileRecord::new(&path)).status,
            Some(DiffStatus::Unchanged)
        );
    }

    #[test]
    fn test_unreadable_file() {
        let (temp, _store, target, engine) = setup();
        let mut verifier = AttrVerifier::new(engine, target);
        let result = verifier.process(FileRecord::new(temp.path().join("missing")));
        assert_eq!(result.status, Some(DiffStatus::Unreadable));
        assert!(result.digest.is_none());
    }

    #[test]
    fn test_remover() {
        let (temp, store, target, engine) = setup();
        let path = temp.path().join("a.txt");
        let mut remover = AttrRemover::new(target.clone());

        // nothing stored: not an error
        assert!(!remover.process(FileRecord::new(&path)).file.is_err());

        AttrWriter::new(engine, target).process(FileRecord::new(&path));
        assert_eq!(store.len(), 1);
        assert!(!remover.process(FileRecord::new(&path)).file.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_writer_and_verifier_agree_on_malformed_value() {
        let (temp, store, target, engine) = setup();
        let path = temp.path().join("a.txt");
        store.set(&path, target.name(), &[0xff]).unwrap();

        let mut verifier = AttrVerifier::new(engine.clone(), target.clone());
        let checked = verifier.process(FileRecord::new(&path));
        assert_eq!(checked.status, Some(DiffStatus::Indeterminate));

        let mut writer = AttrWriter::new(engine, target);
        let written = writer.process(FileRecord::new(&path));
        assert_eq!(written.status, Some(DiffStatus::Indeterminate));
        assert!(!written.file.is_err());

        // the overwritten value now reads back cleanly
        assert_eq!(
            verifier.process(FileRecord::new(&path)).status,
            Some(DiffStatus::Unchanged)
        );
    }

    #[test]
    fn test_truncated_value_is_changed() {
        let (temp, store, target, engine) = setup();
        let path = temp.path().join("a.txt");
        let mut writer = AttrWriter::new(engine.clone(), target.clone());
        writer.process(FileRecord::new(&path));

        let bytes = store.get(&path, target.name()).unwrap().unwrap();
        let mut record = AttrRecord::decode(&path, target.name(), &bytes).unwrap();
        record.digest.truncate(8);
        store.set(&path, target.name(), &record.encode().unwrap()).unwrap();

        let mut verifier = AttrVerifier::new(engine, target);
        let result = verifier.process(FileRecord::new(&path));
        assert_eq!(result.status, Some(DiffStatus::Changed));
        assert_eq!(result.status.map(|s| s.to_string()).as_deref(), Some("~"));
    }

    #[test]
    fn test_foreign_algorithm_is_attribute_error() {
        let (temp, store, target, _engine) = setup();
        let path = temp.path().join("a.txt");
        let foreign = AttrRecord {
            algorithm: "md5".into(),
            digest: vec![0; 16],
            size: 5,
            mod_time: None,
        };
        store
            .set(&path, target.name(), &foreign.encode().unwrap())
            .unwrap();

        let result = AttrReader::new(target).process(FileRecord::new(&path));
        assert_eq!(
            result.file.error.map(|e| e.kind),
            Some(bitrat_core::FileErrorKind::Attribute)
        );
    }
}
