//! Directory-backed artifact store.
//!
//! # File Layout
//!
//! Artifacts are stored flat within the store directory:
//! ```text
//! {directory}/{sha256(key)}.png
//! ```
//!
//! Hashing the key keeps untrusted key text out of filesystem paths and
//! yields names that stay stable across restarts. Writes go through a
//! temporary file and a rename so a crash never leaves a truncated artifact
//! under its final name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{ArtifactStore, StoreError};
use crate::key::RenderKey;

/// Extension of stored artifacts.
pub const ARTIFACT_EXTENSION: &str = "png";

/// Extension of in-progress writes.
const TEMP_EXTENSION: &str = "tmp";

/// Artifact store backed by a local directory.
#[derive(Debug, Clone)]
pub struct DiskStore {
    directory: PathBuf,
}

impl DiskStore {
    /// Creates a store rooted at `directory`.
    ///
    /// Nothing touches the filesystem until [`ArtifactStore::init`].
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get the file path for a key.
    fn key_path(&self, key: &RenderKey) -> PathBuf {
        self.directory
            .join(format!("{}.{}", key.digest(), ARTIFACT_EXTENSION))
    }
}

impl ArtifactStore for DiskStore {
    async fn init(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        info!(dir = %self.directory.display(), "Artifact store ready");
        Ok(())
    }

    async fn exists(&self, key: &RenderKey) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.key_path(key)).await?)
    }

    async fn read(&self, key: &RenderKey) -> Result<Vec<u8>, StoreError> {
        match tokio::fs::read(self.key_path(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.clone())),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn write(&self, key: &RenderKey, data: &[u8]) -> Result<(), StoreError> {
        let path = self.key_path(key);
        let temp_path = path.with_extension(TEMP_EXTENSION);

        tokio::fs::write(&temp_path, data).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Io(e));
        }

        debug!(key = %key, bytes = data.len(), path = %path.display(), "Artifact persisted");
        Ok(())
    }
}

/// Result of clearing a store directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClearResult {
    pub files_deleted: u64,
    pub bytes_freed: u64,
}

/// Counts stored artifacts and their total size.
///
/// A missing directory counts as empty.
pub fn disk_store_stats(directory: &Path) -> std::io::Result<(u64, u64)> {
    let mut files = 0u64;
    let mut bytes = 0u64;

    for (_, size) in artifact_files(directory)? {
        files += 1;
        bytes += size;
    }

    Ok((files, bytes))
}

/// Deletes every stored artifact (and stray temp files).
pub fn clear_disk_store(directory: &Path) -> std::io::Result<ClearResult> {
    let mut result = ClearResult::default();

    for (path, size) in artifact_files(directory)? {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                result.files_deleted += 1;
                result.bytes_freed += size;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Failed to delete artifact");
            }
        }
    }

    Ok(result)
}

fn artifact_files(directory: &Path) -> std::io::Result<Vec<(PathBuf, u64)>> {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let is_ours = path
            .extension()
            .is_some_and(|ext| ext == ARTIFACT_EXTENSION || ext == TEMP_EXTENSION);
        if !is_ours {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            if metadata.is_file() {
                files.push((path, metadata.len()));
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (TempDir, DiskStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskStore::new(temp_dir.path().join("artifacts"));
        store.init().await.unwrap();
        (temp_dir, store)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (_temp_dir, store) = create_test_store().await;
        let key = RenderKey::new("ABCD1234");

        assert!(!store.exists(&key).await.unwrap());
        store.write(&key, &[1, 2, 3]).await.unwrap();

        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.read(&key).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_temp_dir, store) = create_test_store().await;

        let err = store.read(&RenderKey::new("missing")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (_temp_dir, store) = create_test_store().await;
        store.write(&RenderKey::new("k"), &[9]).await.unwrap();

        store.init().await.unwrap();

        assert_eq!(store.read(&RenderKey::new("k")).await.unwrap(), vec![9]);
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let (_temp_dir, store) = create_test_store().await;
        store.write(&RenderKey::new("k"), &[1, 2, 3]).await.unwrap();

        let temps: Vec<_> = std::fs::read_dir(store.directory())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();

        assert!(temps.is_empty());
    }

    #[tokio::test]
    async fn test_write_fails_without_init() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskStore::new(temp_dir.path().join("never-created"));

        let err = store.write(&RenderKey::new("k"), &[1]).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[tokio::test]
    async fn test_survives_new_instance() {
        let (_temp_dir, store) = create_test_store().await;
        store.write(&RenderKey::new("k"), &[4, 5]).await.unwrap();

        let reopened = DiskStore::new(store.directory().to_path_buf());
        reopened.init().await.unwrap();

        assert_eq!(reopened.read(&RenderKey::new("k")).await.unwrap(), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let (_temp_dir, store) = create_test_store().await;
        store.write(&RenderKey::new("a"), &[0u8; 10]).await.unwrap();
        store.write(&RenderKey::new("b"), &[0u8; 5]).await.unwrap();
        std::fs::write(store.directory().join("notes.txt"), "keep").unwrap();

        assert_eq!(disk_store_stats(store.directory()).unwrap(), (2, 15));

        let result = clear_disk_store(store.directory()).unwrap();
        assert_eq!(result.files_deleted, 2);
        assert_eq!(result.bytes_freed, 15);
        assert_eq!(disk_store_stats(store.directory()).unwrap(), (0, 0));
        assert!(store.directory().join("notes.txt").exists());
    }

    #[test]
    fn test_stats_on_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        assert_eq!(disk_store_stats(&missing).unwrap(), (0, 0));
        assert_eq!(clear_disk_store(&missing).unwrap(), ClearResult::default());
    }
}
