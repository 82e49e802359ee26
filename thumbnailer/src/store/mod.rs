//! Persistent artifact store.
//!
//! Durable key → PNG bytes mapping. An artifact is written once, on the first
//! successful render of a key, and is never updated: its presence alone proves
//! the key has been rendered. The store does not enforce write-once itself;
//! the orchestrator's discipline does, and last-write-wins is acceptable if
//! that is ever violated.

mod disk;
mod memory;

pub use disk::{clear_disk_store, disk_store_stats, ClearResult, DiskStore, ARTIFACT_EXTENSION};
pub use memory::MemoryStore;

use std::future::Future;

use thiserror::Error;

use crate::key::RenderKey;

/// Errors from artifact store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No artifact exists for the key.
    #[error("no artifact stored for key {0}")]
    NotFound(RenderKey),

    /// The underlying medium failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable storage for rendered thumbnails.
///
/// `init` must be called once before first use; it is idempotent.
pub trait ArtifactStore: Send + Sync + 'static {
    /// Prepares the backing location.
    fn init(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Checks whether an artifact exists for the key.
    fn exists(&self, key: &RenderKey) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Reads an artifact. Fails with [`StoreError::NotFound`] if absent.
    fn read(&self, key: &RenderKey) -> impl Future<Output = Result<Vec<u8>, StoreError>> + Send;

    /// Writes an artifact.
    fn write(
        &self,
        key: &RenderKey,
        data: &[u8],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Store selected at runtime: on disk, or in memory when persistence is
/// disabled.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Disk(DiskStore),
    Memory(MemoryStore),
}

impl ArtifactStore for StoreBackend {
    async fn init(&self) -> Result<(), StoreError> {
        match self {
            Self::Disk(store) => store.init().await,
            Self::Memory(store) => store.init().await,
        }
    }

    async fn exists(&self, key: &RenderKey) -> Result<bool, StoreError> {
        match self {
            Self::Disk(store) => store.exists(key).await,
            Self::Memory(store) => store.exists(key).await,
        }
    }

    async fn read(&self, key: &RenderKey) -> Result<Vec<u8>, StoreError> {
        match self {
            Self::Disk(store) => store.read(key).await,
            Self::Memory(store) => store.read(key).await,
        }
    }

    async fn write(&self, key: &RenderKey, data: &[u8]) -> Result<(), StoreError> {
        match self {
            Self::Disk(store) => store.write(key, data).await,
            Self::Memory(store) => store.write(key, data).await,
        }
    }
}
