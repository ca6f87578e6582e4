//! Durable blob backends for the mediakeep storage engine.
//!
//! The engine talks to storage through the [`BlobBackend`] trait: a flat
//! keyed blob space with put/get/delete/list. Keys look like paths
//! (`records/{id}`, `chunks/{id}/{index}`) and list prefixes are always
//! directory-aligned, so the filesystem backend can map keys straight to
//! files.
//!
//! Two implementations are provided: [`MemoryBackend`] for tests and
//! development, and [`LocalFsBackend`] for real on-device persistence.

pub mod failpoint;
pub mod localfs;
pub mod memory;

use async_trait::async_trait;
use mediakeep_types::Result;

/// Abstract keyed blob storage.
///
/// Individual operations are atomic per key: a `get` concurrent with a `put`
/// of the same key sees either the old value, the new value, or absence —
/// never a torn write. There is no multi-key transaction; callers order
/// their writes so that the last key written is the commit point.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store a blob under `key`, replacing any existing value.
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Fetch the blob stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the blob stored under `key`, reporting whether it existed.
    /// Removing an absent key is a no-op, not an error. Under concurrent
    /// deletes of the same key, exactly one caller observes `true`.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// List all keys under a directory-aligned prefix (ending in `/`),
    /// sorted ascending.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Whether a blob exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

pub use failpoint::FailingBackend;
pub use localfs::LocalFsBackend;
pub use memory::MemoryBackend;
