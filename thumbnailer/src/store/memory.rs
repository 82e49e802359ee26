//! In-process artifact store.
//!
//! Keeps artifacts in a `DashMap`. Nothing survives the process, so this is
//! for tests and for running the server with persistence disabled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::{ArtifactStore, StoreError};
use crate::key::RenderKey;

/// Artifact store held in memory.
///
/// Clones share the same map, which lets tests build a second orchestrator
/// over the "same" store to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    artifacts: Arc<DashMap<RenderKey, Arc<Vec<u8>>>>,
    writes: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Total number of `write` calls observed.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl ArtifactStore for MemoryStore {
    async fn init(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn exists(&self, key: &RenderKey) -> Result<bool, StoreError> {
        Ok(self.artifacts.contains_key(key))
    }

    async fn read(&self, key: &RenderKey) -> Result<Vec<u8>, StoreError> {
        self.artifacts
            .get(key)
            .map(|entry| entry.value().to_vec())
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn write(&self, key: &RenderKey, data: &[u8]) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.artifacts.insert(key.clone(), Arc::new(data.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let key = RenderKey::new("k");

        assert!(!store.exists(&key).await.unwrap());
        store.write(&key, &[1, 2]).await.unwrap();

        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.read(&key).await.unwrap(), vec![1, 2]);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_artifacts() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.write(&RenderKey::new("k"), &[7]).await.unwrap();

        assert_eq!(other.len(), 1);
        assert!(matches!(
            other.read(&RenderKey::new("missing")).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
