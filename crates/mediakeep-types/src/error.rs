//! Error taxonomy for the storage engine.
//!
//! Every error carries enough context (usually the media id) for a caller to
//! act on it without string matching. Corruption findings are reported, never
//! silently repaired: deleting a broken record is always an explicit call.

use crate::ids::MediaId;

/// Errors that can occur during storage engine operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested media id does not exist. Recoverable; callers show an
    /// empty state.
    #[error("media {0} not found")]
    NotFound(MediaId),

    /// A chunked payload cannot be reassembled because one or more chunks
    /// are missing. Distinct from [`StoreError::NotFound`]: the record
    /// exists but its payload is broken.
    #[error("media {id}: {} of {total} chunks missing", missing.len())]
    IncompleteManifest {
        id: MediaId,
        /// Zero-based indices of the missing chunks, ascending.
        missing: Vec<u32>,
        total: u32,
    },

    /// A reassembled payload disagrees with the size recorded in its
    /// manifest.
    #[error("media {id}: reassembled {actual} bytes, manifest records {expected}")]
    SizeMismatch {
        id: MediaId,
        expected: u64,
        actual: u64,
    },

    /// The payload cannot fit within the capacity budget even after evicting
    /// everything. Surfaced to the user; callers must not retry.
    #[error("payload of {requested} bytes exceeds storage capacity of {capacity} bytes")]
    QuotaExceeded { requested: u64, capacity: u64 },

    /// An underlying I/O failure occurred mid-write. The write has been
    /// rolled back; the caller may retry.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The payload was rejected before any write happened (e.g. empty).
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A stored record header or manifest could not be decoded.
    #[error("corrupt record data: {0}")]
    Corrupt(String),

    /// An I/O error outside the put path (reads, listing, deletes).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The standard result type used throughout mediakeep.
pub type Result<T> = std::result::Result<T, StoreError>;
