//! Chunk codec: splits a binary payload into an ordered sequence of
//! bounded-size chunks with a recoverable manifest, and reassembles chunks
//! back into the original payload, detecting gaps.
//!
//! The chunk size is fixed per codec instance so that no single backend
//! write exceeds platform record-size limits. Splitting is deterministic:
//! the same payload and chunk size always produce the same manifest.

pub mod manifest;

pub use manifest::ChunkManifest;

use mediakeep_backend::BlobBackend;
use mediakeep_types::{MediaId, Result, StoreError};

/// Default maximum chunk size (256 KiB).
pub const DEFAULT_CHUNK_SIZE: u32 = 256 * 1024;

/// Splits payloads into chunks and reassembles them through a blob backend.
#[derive(Debug, Clone, Copy)]
pub struct ChunkCodec {
    chunk_size: u32,
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkCodec {
    /// Create a codec with the given fixed chunk size (bytes, must be > 0).
    pub fn new(chunk_size: u32) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self { chunk_size }
    }

    /// The fixed chunk size of this codec.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Split `payload` into chunk slices and build the matching manifest.
    ///
    /// Never fails for a non-empty payload. The last chunk may be shorter
    /// than the chunk size; all others are exactly `chunk_size` bytes.
    pub fn split<'a>(&self, id: MediaId, payload: &'a [u8]) -> (ChunkManifest, Vec<&'a [u8]>) {
        let pieces: Vec<&[u8]> = payload.chunks(self.chunk_size as usize).collect();
        let manifest = ChunkManifest {
            total_chunks: pieces.len() as u32,
            chunk_size: self.chunk_size,
            total_bytes: payload.len() as u64,
            chunks: (0..pieces.len() as u32)
                .map(|index| ChunkManifest::chunk_key(id, index))
                .collect(),
        };
        (manifest, pieces)
    }

    /// Split `payload` and persist every chunk to the backend.
    ///
    /// Chunks are written in order; on the first failed write the error is
    /// returned as-is and the caller is responsible for rolling back any
    /// chunks already written (see `RecordStore::put`).
    pub async fn write_chunks(
        &self,
        backend: &dyn BlobBackend,
        id: MediaId,
        payload: &[u8],
    ) -> Result<ChunkManifest> {
        let (manifest, pieces) = self.split(id, payload);
        for (key, piece) in manifest.chunks.iter().zip(pieces) {
            backend.put(key, piece).await?;
        }
        tracing::debug!(
            id = %id,
            chunks = manifest.total_chunks,
            bytes = manifest.total_bytes,
            "wrote chunked payload"
        );
        Ok(manifest)
    }

    /// Reassemble the payload described by `manifest`.
    ///
    /// Fails with [`StoreError::IncompleteManifest`] if any chunk is absent
    /// and with [`StoreError::SizeMismatch`] if the reassembled size
    /// disagrees with the manifest's recorded total.
    pub async fn reassemble(
        &self,
        backend: &dyn BlobBackend,
        id: MediaId,
        manifest: &ChunkManifest,
    ) -> Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(manifest.total_bytes as usize);
        let mut missing = Vec::new();

        for (index, key) in manifest.chunks.iter().enumerate() {
            match backend.get(key).await? {
                Some(chunk) => payload.extend_from_slice(&chunk),
                None => missing.push(index as u32),
            }
        }

        if !missing.is_empty() {
            return Err(StoreError::IncompleteManifest {
                id,
                missing,
                total: manifest.total_chunks,
            });
        }
        if payload.len() as u64 != manifest.total_bytes {
            return Err(StoreError::SizeMismatch {
                id,
                expected: manifest.total_bytes,
                actual: payload.len() as u64,
            });
        }
        Ok(payload)
    }

    /// Report which chunk indices of `manifest` are absent, ascending.
    ///
    /// Read-only; used by the integrity scanner.
    pub async fn missing_chunks(
        &self,
        backend: &dyn BlobBackend,
        manifest: &ChunkManifest,
    ) -> Result<Vec<u32>> {
        let mut missing = Vec::new();
        for (index, key) in manifest.chunks.iter().enumerate() {
            if !backend.exists(key).await? {
                missing.push(index as u32);
            }
        }
        Ok(missing)
    }

    /// Delete every chunk named by `manifest`. Absent chunks are skipped, so
    /// the call is idempotent and safe on partially written manifests.
    pub async fn delete_chunks(
        &self,
        backend: &dyn BlobBackend,
        manifest: &ChunkManifest,
    ) -> Result<()> {
        for key in &manifest.chunks {
            backend.delete(key).await?;
        }
        Ok(())
    }
}
