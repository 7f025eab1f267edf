//! Attribute store backends.

use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::error::AttrError;

/// Named metadata values bound to file paths.
///
/// Absence is `Ok(None)` and distinct from a zero-length value.
pub trait AttributeStore: Send + Sync {
    /// Fetch a value.
    fn get(&self, path: &Path, name: &str) -> Result<Option<Vec<u8>>, AttrError>;

    /// Create or overwrite a value.
    fn set(&self, path: &Path, name: &str, value: &[u8]) -> Result<(), AttrError>;

    /// Delete a value.
    fn remove(&self, path: &Path, name: &str) -> Result<(), AttrError>;
}

/// Extended file attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct XattrStore;

impl XattrStore {
    /// Create a store backed by the file system.
    pub fn new() -> Self {
        Self
    }

    /// Check whether the platform has extended attributes at all.
    pub fn is_supported() -> bool {
        #[cfg(unix)]
        {
            xattr::SUPPORTED_PLATFORM
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

#[cfg(unix)]
impl AttributeStore for XattrStore {
    fn get(&self, path: &Path, name: &str) -> Result<Option<Vec<u8>>, AttrError> {
        xattr::get(path, name).map_err(|e| AttrError::io(path, name, e))
    }

    fn set(&self, path: &Path, name: &str, value: &[u8]) -> Result<(), AttrError> {
        xattr::set(path, name, value).map_err(|e| AttrError::io(path, name, e))
    }

    fn remove(&self, path: &Path, name: &str) -> Result<(), AttrError> {
        xattr::remove(path, name).map_err(|e| AttrError::io(path, name, e))
    }
}

#[cfg(not(unix))]
impl AttributeStore for XattrStore {
    fn get(&self, _path: &Path, _name: &str) -> Result<Option<Vec<u8>>, AttrError> {
        Err(AttrError::Unsupported)
    }

    fn set(&self, _path: &Path, _name: &str, _value: &[u8]) -> Result<(), AttrError> {
        Err(AttrError::Unsupported)
    }

    fn remove(&self, _path: &Path, _name: &str) -> Result<(), AttrError> {
        Err(AttrError::Unsupported)
    }
}

/// In-process store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<(PathBuf, String), Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl AttributeStore for MemoryStore {
    fn get(&self, path: &Path, name: &str) -> Result<Option<Vec<u8>>, AttrError> {
        Ok(self
            .values
            .get(&(path.to_path_buf(), name.to_string()))
            .map(|v| v.value().clone()))
    }

    fn set(&self, path: &Path, name: &str, value: &[u8]) -> Result<(), AttrError> {
        self.values
            .insert((path.to_path_buf(), name.to_string()), value.to_vec());
        Ok(())
    }

    fn remove(&self, path: &Path, name: &str) -> Result<(), AttrError> {
        match self.values.remove(&(path.to_path_buf(), name.to_string())) {
            Some(_) => Ok(()),
            None => Err(AttrError::io(
                path,
                name,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such attribute"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_absent_vs_empty() {
        let store = MemoryStore::new();
        let path = Path::new("/tmp/file");

        assert_eq!(store.get(path, "user.a").unwrap(), None);
        store.set(path, "user.a", b"").unwrap();
        assert_eq!(store.get(path, "user.a").unwrap(), Some(Vec::new()));
        assert_eq!(store.len(), 1);

        store.remove(path, "user.a").unwrap();
        assert!(store.is_empty());
        assert!(store.remove(path, "user.a").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_xattr_round_trip_when_supported() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("file");
        std::fs::write(&path, "x").unwrap();

        let store = XattrStore::new();
        let name = "user.bitrat.test";
        if store.set(&path, name, b"value").is_err() {
            // tmpfs without user xattrs, or an unsupported platform
            return;
        }
        assert_eq!(store.get(&path, name).unwrap(), Some(b"value".to_vec()));
        store.remove(&path, name).unwrap();
        assert_eq!(store.get(&path, name).unwrap(), None);
    }
}
