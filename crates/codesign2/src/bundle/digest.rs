//! Content digests for bundle resources.
//!
//! Resource entries carry the 160-bit SHA-1 digest that existing
//! `CodeResources` verifiers expect. Files are mapped into memory and hashed
//! in a single pass.

use crate::{Error, Result};
use memmap2::Mmap;
use sha1::{Digest as _, Sha1};
use std::fs::File;
use std::path::Path;

/// Length in bytes of a resource digest.
pub const DIGEST_LEN: usize = 20;

/// SHA-1 digest of a file's full content.
pub type Digest = [u8; DIGEST_LEN];

/// Hash a byte slice.
pub fn hash_data(data: &[u8]) -> Digest {
    let mut hasher = Sha1::new();
    hasher.update(data);
    let result = hasher.finalize();

    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&result);
    digest
}

/// Hash the entire content of the file at `path`.
///
/// Any failure to open, stat, or map the file is reported as
/// [`Error::HashFailed`].
pub fn hash_file(path: &Path) -> Result<Digest> {
    let hash_failed = |source| Error::HashFailed {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(hash_failed)?;
    let len = file.metadata().map_err(hash_failed)?.len();

    // Zero-length files cannot be mapped.
    if len == 0 {
        return Ok(hash_data(&[]));
    }

    // SAFETY: the mapping is read-only and dropped before returning. A
    // concurrent writer truncating the file is outside what we support.
    let mmap = unsafe { Mmap::map(&file) }.map_err(hash_failed)?;
    Ok(hash_data(&mmap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_hash_data_known_value() {
        // SHA-1("abc")
        let expected: Digest = [
            0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
            0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
        ];
        assert_eq!(hash_data(b"abc"), expected);
    }

    #[test]
    fn test_hash_file_matches_hash_data() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"same content").unwrap();
        fs::write(&b, b"same content").unwrap();

        let digest_a = hash_file(&a).unwrap();
        assert_eq!(digest_a, hash_file(&b).unwrap());
        assert_eq!(digest_a, hash_data(b"same content"));
        assert_eq!(digest_a, hash_file(&a).unwrap());
    }

    #[test]
    fn test_single_byte_change_changes_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("res");
        fs::write(&path, b"resource-0").unwrap();
        let before = hash_file(&path).unwrap();
        fs::write(&path, b"resource-1").unwrap();
        assert_ne!(before, hash_file(&path).unwrap());
    }

    #[test]
    fn test_hash_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();
        // SHA-1 of the empty string
        assert_eq!(
            hash_file(&path).unwrap()[..4],
            [0xda, 0x39, 0xa3, 0xee]
        );
    }

    #[test]
    fn test_hash_missing_file_fails() {
        let dir = tempdir().unwrap();
        let err = hash_file(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::HashFailed { .. }));
    }
}
