//! Chunk manifest: the recoverable description of a split payload.

use serde::{Deserialize, Serialize};

use mediakeep_types::MediaId;

/// Ordered description of how a payload was split into chunks.
///
/// Invariant: `chunks.len() == total_chunks`, and each key resolves to
/// exactly one stored chunk blob of at most `chunk_size` bytes (the last
/// chunk may be shorter). A manifest with any missing chunk is "broken" and
/// must never be surfaced to consumers as retrievable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// Number of chunks the payload was split into (>= 1).
    pub total_chunks: u32,
    /// The fixed chunk size used by the split (bytes).
    pub chunk_size: u32,
    /// Total payload size in bytes.
    pub total_bytes: u64,
    /// Backend keys of the chunks, in payload order.
    pub chunks: Vec<String>,
}

impl ChunkManifest {
    /// Backend key for chunk `index` of media `id`.
    ///
    /// Indices are zero-padded so a prefix listing of `chunks/{id}/` returns
    /// keys in payload order.
    pub fn chunk_key(id: MediaId, index: u32) -> String {
        format!("chunks/{}/{:05}", id, index)
    }

    /// Prefix under which all chunks of media `id` live.
    pub fn chunk_prefix(id: MediaId) -> String {
        format!("chunks/{}/", id)
    }

    /// Whether the declared chunk count matches the key list.
    pub fn is_consistent(&self) -> bool {
        self.chunks.len() == self.total_chunks as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_key_ordering() {
        let id = MediaId::generate();
        let k0 = ChunkManifest::chunk_key(id, 0);
        let k9 = ChunkManifest::chunk_key(id, 9);
        let k10 = ChunkManifest::chunk_key(id, 10);
        // Lexicographic order matches numeric order thanks to zero padding.
        assert!(k0 < k9);
        assert!(k9 < k10);
        assert!(k0.starts_with(&ChunkManifest::chunk_prefix(id)));
    }

    #[test]
    fn test_manifest_serde_roundtrip() {
        let id = MediaId::generate();
        let manifest = ChunkManifest {
            total_chunks: 2,
            chunk_size: 4,
            total_bytes: 7,
            chunks: vec![
                ChunkManifest::chunk_key(id, 0),
                ChunkManifest::chunk_key(id, 1),
            ],
        };
        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: ChunkManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
        assert!(parsed.is_consistent());
    }

    #[test]
    fn test_inconsistent_manifest() {
        let manifest = ChunkManifest {
            total_chunks: 3,
            chunk_size: 4,
            total_bytes: 12,
            chunks: vec!["chunks/x/00000".into()],
        };
        assert!(!manifest.is_consistent());
    }
}
