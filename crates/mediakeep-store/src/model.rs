//! Record model: the persisted header describing one media item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use mediakeep_chunk::ChunkManifest;
use mediakeep_types::{MediaId, MediaType};

/// Where a record's payload bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadRef {
    /// Payload stored whole at `blobs/{id}`.
    Inline,
    /// Payload split into chunks described by the manifest.
    Chunked(ChunkManifest),
}

/// Persisted media record header.
///
/// The header is the commit point of a save: it is written only after every
/// payload blob it references exists, so a decodable header always names a
/// payload that was fully written at some point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,
    pub media_type: MediaType,
    /// Capture time, recorded at save.
    pub created_at: DateTime<Utc>,
    /// Monotonic per-store sequence number, breaks `created_at` ties.
    pub seq: u64,
    /// Payload size in bytes.
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the payload.
    pub checksum: String,
    pub payload: PayloadRef,
    /// Caller-supplied metadata (event name, captions, flags).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl MediaRecord {
    /// Backend key of the record header for `id`.
    pub fn record_key(id: MediaId) -> String {
        format!("records/{}", id)
    }

    /// Backend key of the inline payload blob for `id`.
    pub fn blob_key(id: MediaId) -> String {
        format!("blobs/{}", id)
    }

    /// Sort key for newest-first listings.
    pub fn recency(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.seq)
    }
}

/// Lowercase hex SHA-256 digest of `data`.
pub fn payload_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_stable_hex() {
        let a = payload_checksum(b"hello");
        let b = payload_checksum(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, payload_checksum(b"hellp"));
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let id = MediaId::generate();
        let mut metadata = serde_json::Map::new();
        metadata.insert("event_name".into(), serde_json::json!("reception"));

        let record = MediaRecord {
            id,
            media_type: MediaType::Photo,
            created_at: Utc::now(),
            seq: 7,
            size_bytes: 5,
            checksum: payload_checksum(b"hello"),
            payload: PayloadRef::Inline,
            metadata,
        };
        let json = serde_json::to_vec(&record).unwrap();
        let parsed: MediaRecord = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_keys_are_namespaced() {
        let id = MediaId::generate();
        assert!(MediaRecord::record_key(id).starts_with("records/"));
        assert!(MediaRecord::blob_key(id).starts_with("blobs/"));
    }
}
