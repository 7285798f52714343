//! Filesystem-backed blob store.
//!
//! Uploaded files live under a configured root directory and are addressed
//! by opaque relative keys of the form `<uuid>/<sanitized-file-name>`.
//! Document rows carry the key in `file_path`; nothing outside this module
//! interprets it.

use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug)]
pub enum StorageError {
    /// No blob exists under the given key.
    NotFound(String),
    Io(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(key) => write!(f, "file not found in storage: {}", key),
            StorageError::Io(e) => write!(f, "storage I/O error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Store raw bytes under a fresh opaque key and return the key.
    pub fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let key = format!("{}/{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let path = self.resolve(&key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        std::fs::write(&path, bytes).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(key)
    }

    /// Read the blob stored under `key`.
    pub fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    /// Delete the blob stored under `key`. Missing blobs are not an error:
    /// deletion cascades from document removal and must not block it.
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::Io(e.to_string())),
        }
        // Remove the per-document directory if it is now empty.
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir(parent);
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Keep file names safe to use as a path segment: strip separators and
/// anything that could escape the store root.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches('.').trim();
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());

        let key = store.put("guidelines.txt", b"hello grants").unwrap();
        assert!(key.ends_with("/guidelines.txt"));

        let bytes = store.get(&key).unwrap();
        assert_eq!(bytes, b"hello grants");
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());

        let err = store.get("nope/missing.txt").unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_delete_removes_blob() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());

        let key = store.put("a.txt", b"x").unwrap();
        store.delete(&key).unwrap();
        assert!(matches!(
            store.get(&key).unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());
        store.delete("ghost/file.bin").unwrap();
    }

    #[test]
    fn test_file_names_are_sanitized() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());

        let key = store.put("../../etc/passwd", b"x").unwrap();
        // Separators are neutralized, so the name stays a single segment
        // under the per-document directory.
        assert_eq!(key.matches('/').count(), 1);
        assert!(store.get(&key).is_ok());
    }
}
