//! Store configuration.

use serde::{Deserialize, Serialize};

use mediakeep_chunk::DEFAULT_CHUNK_SIZE;

/// Bounded-footprint policy for a store.
///
/// Both thresholds are independent; a put must satisfy every configured one.
/// A threshold set to `None` is unenforced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Maximum number of records kept, `None` for unlimited.
    pub max_items: Option<u64>,
    /// Maximum total payload bytes kept, `None` for unlimited.
    pub max_bytes: Option<u64>,
    /// Post-eviction usage target as a fraction of each threshold.
    ///
    /// 1.0 evicts exactly enough for the incoming item to fit. Lower values
    /// free headroom in the same pass so back-to-back saves do not each pay
    /// an eviction.
    pub retention_fraction: f64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_items: Some(50),
            max_bytes: Some(1024 * 1024 * 1024),
            retention_fraction: 1.0,
        }
    }
}

impl QuotaConfig {
    /// Quota with no thresholds; nothing is ever evicted.
    pub fn unlimited() -> Self {
        Self {
            max_items: None,
            max_bytes: None,
            retention_fraction: 1.0,
        }
    }

    /// Clamped retention fraction, guarding against bad config files.
    pub(crate) fn retention(&self) -> f64 {
        self.retention_fraction.clamp(0.0, 1.0)
    }
}

/// Configuration for a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Chunk size for chunked payloads (bytes).
    pub chunk_size: u32,
    /// Photo payloads at or below this size are stored inline as a single
    /// blob. Larger photos and all videos are chunked.
    pub inline_threshold: u64,
    /// Per-item size ceiling for photos (bytes); oversized photos are
    /// rejected rather than chunked.
    pub max_photo_bytes: u64,
    /// Capacity of the change event channel.
    pub event_capacity: usize,
    pub quota: QuotaConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            inline_threshold: 1024 * 1024,
            max_photo_bytes: 1024 * 1024,
            event_capacity: 64,
            quota: QuotaConfig::default(),
        }
    }
}
