//! Stored attribute record and digest comparison.

use std::path::Path;
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use bitrat_core::{DiffStatus, DigestRecord};

use crate::error::AttrError;

/// Attribute name for a prefix and a reported algorithm name.
pub fn attr_name(prefix: &str, algorithm: &str) -> String {
    format!("{prefix}.{algorithm}")
}

/// Value stored against a file: the digest plus enough context to
/// interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrRecord {
    /// Reported algorithm name that produced the digest.
    pub algorithm: CompactString,
    /// Digest bytes.
    pub digest: Vec<u8>,
    /// File size when the digest was taken.
    pub size: u64,
    /// Modification time when the digest was taken.
    pub mod_time: Option<SystemTime>,
}

impl AttrRecord {
    /// Build a record from a computed digest. Returns `None` if the digest
    /// is absent.
    pub fn from_digest(record: &DigestRecord) -> Option<Self> {
        Some(Self {
            algorithm: record.algorithm.clone(),
            digest: record.digest.clone()?,
            size: record.file.size,
            mod_time: record.file.mod_time,
        })
    }

    /// Encode for storage.
    pub fn encode(&self) -> Result<Vec<u8>, AttrError> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Decode a stored value read from `name` on `path`.
    pub fn decode(path: &Path, name: &str, bytes: &[u8]) -> Result<Self, AttrError> {
        postcard::from_bytes(bytes).map_err(|e| AttrError::Malformed {
            path: path.to_path_buf(),
            name: name.to_string(),
            message: e.to_string(),
        })
    }
}

/// Classify a live digest against a stored one.
///
/// | live    | stored  | result |
/// |---------|---------|--------|
/// | absent  | any     | `!`    |
/// | present | absent  | `+`    |
/// | equal   | equal   | `=`    |
/// | present | differs | `~`    |
///
/// A stored digest of a different length is a changed digest. Equality is
/// checked in constant time.
pub fn diff(live: Option<&[u8]>, stored: Option<&[u8]>) -> DiffStatus {
    match (live, stored) {
        (None, _) => DiffStatus::Unreadable,
        (Some(_), None) => DiffStatus::New,
        (Some(live), Some(stored)) => {
            if bool::from(live.ct_eq(stored)) {
                DiffStatus::Unchanged
            } else {
                DiffStatus::Changed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitrat_core::FileRecord;

    #[test]
    fn test_diff_table() {
        let live = [1u8, 2, 3, 4];
        let other = [1u8, 2, 3, 5];

        assert_eq!(diff(None, Some(&live)), DiffStatus::Unreadable);
        assert_eq!(diff(None, None), DiffStatus::Unreadable);
        assert_eq!(diff(Some(&live), None), DiffStatus::New);
        assert_eq!(diff(Some(&live), Some(&live)), DiffStatus::Unchanged);
        assert_eq!(diff(Some(&live), Some(&other)), DiffStatus::Changed);
        assert_eq!(diff(Some(&live), Some(&live[..2])), DiffStatus::Changed);
        assert_eq!(diff(Some(&live[..2]), Some(&live)), DiffStatus::Changed);
        assert_eq!(diff(Some(&live), Some(&live[..2])).to_string(), "~");
    }

    #[test]
    fn test_empty_stored_is_present() {
        assert_eq!(diff(Some(&[]), Some(&[])), DiffStatus::Unchanged);
        assert_eq!(diff(Some(&[1]), Some(&[])), DiffStatus::Changed);
    }

    #[test]
    fn test_attr_name() {
        assert_eq!(attr_name("user.bitrat", "hmac-sha256"), "user.bitrat.hmac-sha256");
    }

    #[test]
    fn test_record_encoding() {
        let mut file = FileRecord::new("a.txt");
        file.size = 5;
        file.mod_time = Some(SystemTime::UNIX_EPOCH);
        let digest = DigestRecord::new(file, vec![0xde, 0xad], "sha256");

        let record = AttrRecord::from_digest(&digest).unwrap();
        let bytes = record.encode().unwrap();
        let decoded = AttrRecord::decode(Path::new("a.txt"), "n", &bytes).unwrap();
        assert_eq!(decoded, record);

        let absent = DigestRecord::absent(FileRecord::new("b"), "sha256");
        assert!(AttrRecord::from_digest(&absent).is_none());
    }

    #[test]
    fn test_decode_garbage() {
        let err = AttrRecord::decode(Path::new("a"), "n", &[0xff]).unwrap_err();
        assert!(matches!(err, AttrError::Malformed { .. }));
    }
}
