//! Public facade over the record store.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use mediakeep_backend::BlobBackend;
use mediakeep_store::{
    payload_checksum, BrokenVideo, ChangeEvent, IntegrityScanner, MediaCounts, MediaRecord,
    RecordStore, StoreConfig, UsageSnapshot,
};
use mediakeep_types::{MediaId, MediaType, Result, StoreError};

use crate::save::{SavePhase, SaveProgress};

/// Usage summary surfaced to callers and dashboards.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StorageInfo {
    pub usage: UsageSnapshot,
    pub counts: MediaCounts,
}

/// The media engine: every caller-facing operation goes through here.
///
/// Saves run an explicit state machine (validate, write, verify, publish)
/// so a failure at any point rolls back completely and logs the phase it
/// died in. Reads and deletes delegate to the store; diagnostics delegate
/// to the integrity scanner.
pub struct MediaEngine {
    store: RecordStore,
}

impl MediaEngine {
    /// Open an engine over `backend`.
    pub async fn open(backend: Arc<dyn BlobBackend>, config: StoreConfig) -> Result<Self> {
        let store = RecordStore::open(backend, config).await?;
        Ok(Self { store })
    }

    /// The underlying store, for maintenance tooling.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Save a photo. Photos above the configured per-photo size limit are
    /// rejected during validation.
    pub async fn save_photo(
        &self,
        payload: &[u8],
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MediaRecord> {
        self.save(MediaType::Photo, payload, metadata).await
    }

    /// Save a video. The committed payload is re-read and re-hashed before
    /// the record is announced; a verification miss rolls the save back.
    pub async fn save_video(
        &self,
        payload: &[u8],
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MediaRecord> {
        self.save(MediaType::Video, payload, metadata).await
    }

    async fn save(
        &self,
        media_type: MediaType,
        payload: &[u8],
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MediaRecord> {
        let mut progress = SaveProgress::start();

        progress.advance(SavePhase::Validating);
        if payload.is_empty() {
            progress.fail("empty payload");
            return Err(StoreError::InvalidPayload("empty payload".into()));
        }
        let size = payload.len() as u64;
        let config = self.store.config();
        if media_type == MediaType::Photo && size > config.max_photo_bytes {
            progress.fail("photo too large");
            return Err(StoreError::InvalidPayload(format!(
                "photo of {} bytes exceeds the {} byte limit",
                size, config.max_photo_bytes
            )));
        }
        // A payload no eviction can make room for fails before any write.
        if let Some(capacity) = config.quota.max_bytes {
            if size > capacity {
                progress.fail("payload exceeds total capacity");
                return Err(StoreError::QuotaExceeded {
                    requested: size,
                    capacity,
                });
            }
        }

        progress.advance(SavePhase::Writing);
        let record = match self.store.put(media_type, payload, metadata).await {
            Ok(record) => record,
            Err(err) => {
                progress.fail(&err.to_string());
                return Err(err);
            }
        };

        // Inline photos are committed by a single atomic blob write; only
        // chunked video payloads get the read-after-write check.
        if media_type == MediaType::Video {
            progress.advance(SavePhase::Verifying);
            if let Err(err) = self.verify(&record).await {
                progress.fail(&err.to_string());
                // The verification error is what the caller acts on; a
                // rollback failure is logged and the stranded record is
                // left for the integrity scanner.
                if let Err(rollback_err) = self.store.delete(record.id).await {
                    tracing::error!(
                        id = %record.id,
                        error = %rollback_err,
                        "rollback after failed verification did not complete"
                    );
                }
                return Err(err);
            }
        }

        progress.advance(SavePhase::Published);
        self.store
            .notifier()
            .publish(ChangeEvent::created(record.id, record.media_type));
        Ok(record)
    }

    async fn verify(&self, record: &MediaRecord) -> Result<()> {
        let stored = self.store.get_payload(record.id).await?;
        let checksum = payload_checksum(&stored);
        if checksum != record.checksum {
            return Err(StoreError::WriteFailed(format!(
                "verification mismatch for {}: wrote {}, read back {}",
                record.id, record.checksum, checksum
            )));
        }
        Ok(())
    }

    /// Fetch a photo payload by id.
    pub async fn get_photo(&self, id: MediaId) -> Result<Vec<u8>> {
        self.get_typed(id, MediaType::Photo).await
    }

    /// Fetch a video payload by id, reassembled from its chunks.
    pub async fn get_video(&self, id: MediaId) -> Result<Vec<u8>> {
        self.get_typed(id, MediaType::Video).await
    }

    async fn get_typed(&self, id: MediaId, media_type: MediaType) -> Result<Vec<u8>> {
        let record = self.store.get(id).await?;
        if record.media_type != media_type {
            return Err(StoreError::NotFound(id));
        }
        self.store.get_payload(id).await
    }

    /// All media records, newest first. Metadata only; payloads are fetched
    /// per item.
    pub async fn get_all_media(&self) -> Result<Vec<MediaRecord>> {
        self.store.list().await
    }

    /// Current usage against the configured quota, with per-type counts.
    pub async fn get_storage_info(&self) -> Result<StorageInfo> {
        Ok(StorageInfo {
            usage: self.store.quota().snapshot(),
            counts: self.store.count_by_type().await?,
        })
    }

    /// Replace the metadata of a record, keeping its payload untouched.
    pub async fn update_metadata(
        &self,
        id: MediaId,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MediaRecord> {
        self.store.update_metadata(id, metadata).await
    }

    /// Delete a record and its payload. Deleting an absent id succeeds.
    pub async fn delete_media(&self, id: MediaId) -> Result<()> {
        self.store.delete(id).await
    }

    /// Report every video whose payload can no longer be reassembled.
    pub async fn find_broken_videos(&self) -> Result<Vec<BrokenVideo>> {
        IntegrityScanner::new(&self.store).scan().await
    }

    /// Remove a broken video record and whatever chunks survive.
    pub async fn delete_broken_video(&self, id: MediaId) -> Result<()> {
        IntegrityScanner::new(&self.store).repair(id).await
    }

    /// Evict oldest records down to the retention target. Returns how many
    /// records were removed.
    pub async fn cleanup_old_media(&self) -> Result<u64> {
        Ok(self.store.sweep().await?.len() as u64)
    }

    /// Subscribe to record lifecycle events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.store.notifier().subscribe()
    }
}
