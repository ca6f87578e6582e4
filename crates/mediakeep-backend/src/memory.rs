//! In-memory blob backend for testing and development.
//!
//! [`MemoryBackend`] holds blobs in a `DashMap`, so concurrent operations on
//! distinct keys never block each other. The API matches what the
//! filesystem-backed version exposes so the layers above do not need to
//! change.

use async_trait::async_trait;
use dashmap::DashMap;

use mediakeep_types::Result;

use crate::BlobBackend;

/// In-memory blob backend backed by a concurrent hash map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBackend {
    /// Create a new, empty backend.
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
        }
    }

    /// Return the number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Return `true` if the backend holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).map(|v| v.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .blobs
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(key))
    }
}
