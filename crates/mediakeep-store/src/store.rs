//! Record store: transactional persistence of media records.
//!
//! Every record is two or more backend keys: a payload (one inline blob or
//! a run of chunks) and a header at `records/{id}`. The header is always
//! written last, so it is the commit point: readers treat a record as
//! existing exactly when its header decodes. A failed save rolls its
//! payload keys back and surfaces as [`StoreError::WriteFailed`]; it never
//! leaves a header behind.
//!
//! There is no store-wide lock. Unrelated puts proceed concurrently over
//! per-key backend operations, and the usage tally is kept in atomics.
//! Exactly-once accounting for deletes rides on the backend reporting
//! whether the header key existed: of two racing deleters, only the one
//! that removed the header updates the tally and publishes the event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use mediakeep_backend::BlobBackend;
use mediakeep_chunk::{ChunkCodec, ChunkManifest};
use mediakeep_types::{MediaId, MediaType, Result, StoreError};

use crate::config::StoreConfig;
use crate::model::{payload_checksum, MediaRecord, PayloadRef};
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::quota::{Admission, QuotaManager};

/// Per-type record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediaCounts {
    pub photos: u64,
    pub videos: u64,
}

/// Media record store over a blob backend.
pub struct RecordStore {
    backend: Arc<dyn BlobBackend>,
    codec: ChunkCodec,
    config: StoreConfig,
    quota: QuotaManager,
    notifier: ChangeNotifier,
    next_seq: AtomicU64,
}

impl RecordStore {
    /// Open a store over `backend`, seeding the usage tally and sequence
    /// counter from the committed records already present.
    ///
    /// Headers that fail to decode are logged and skipped; they do not
    /// count against the quota and are invisible to listings.
    pub async fn open(backend: Arc<dyn BlobBackend>, config: StoreConfig) -> Result<Self> {
        let store = Self {
            codec: ChunkCodec::new(config.chunk_size),
            quota: QuotaManager::new(config.quota.clone()),
            notifier: ChangeNotifier::new(config.event_capacity),
            backend,
            config,
            next_seq: AtomicU64::new(0),
        };

        let mut items = 0u64;
        let mut bytes = 0u64;
        let mut max_seq = 0u64;
        for key in store.backend.list("records/").await? {
            match store.load_header(&key).await {
                Ok(Some(record)) => {
                    items += 1;
                    bytes += record.size_bytes;
                    max_seq = max_seq.max(record.seq);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "skipping undecodable record header");
                }
            }
        }
        store.quota.seed(items, bytes);
        store.next_seq.store(max_seq + 1, Ordering::SeqCst);
        tracing::info!(items, bytes, "opened record store");
        Ok(store)
    }

    pub fn backend(&self) -> &dyn BlobBackend {
        self.backend.as_ref()
    }

    pub fn codec(&self) -> &ChunkCodec {
        &self.codec
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn quota(&self) -> &QuotaManager {
        &self.quota
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Store a payload as a new record and return its committed header.
    ///
    /// Runs admission first, evicting oldest records if the quota demands
    /// it, then writes the payload and finally the header. Any write
    /// failure rolls back the keys already written and maps to
    /// [`StoreError::WriteFailed`]. No creation event is published here;
    /// callers announce the record once they consider it live.
    pub async fn put(
        &self,
        media_type: MediaType,
        payload: &[u8],
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MediaRecord> {
        if payload.is_empty() {
            return Err(StoreError::InvalidPayload("empty payload".into()));
        }
        let size = payload.len() as u64;
        if media_type == MediaType::Photo && size > self.config.max_photo_bytes {
            return Err(StoreError::InvalidPayload(format!(
                "photo of {} bytes exceeds the {} byte limit",
                size, self.config.max_photo_bytes
            )));
        }

        match self.quota.admit(size) {
            Admission::Admit => {}
            Admission::Reject {
                requested,
                capacity,
            } => {
                return Err(StoreError::QuotaExceeded {
                    requested,
                    capacity,
                })
            }
            Admission::Evict {
                max_items_after,
                max_bytes_after,
            } => {
                self.evict_until(max_items_after, max_bytes_after).await?;
            }
        }

        let record = MediaRecord {
            id: MediaId::generate(),
            media_type,
            created_at: Utc::now(),
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            size_bytes: size,
            checksum: payload_checksum(payload),
            payload: PayloadRef::Inline,
            metadata,
        };

        // Videos always chunk so their completeness stays auditable; small
        // photos skip the chunking overhead.
        let record = if media_type == MediaType::Photo && size <= self.config.inline_threshold {
            self.commit_inline(record, payload).await?
        } else {
            self.commit_chunked(record, payload).await?
        };

        self.quota.record_put(size);
        tracing::info!(
            id = %record.id,
            media_type = %record.media_type,
            bytes = record.size_bytes,
            "stored record"
        );
        Ok(record)
    }

    async fn commit_inline(&self, record: MediaRecord, payload: &[u8]) -> Result<MediaRecord> {
        let blob_key = MediaRecord::blob_key(record.id);
        if let Err(err) = self.backend.put(&blob_key, payload).await {
            let _ = self.backend.delete(&blob_key).await;
            return Err(write_failure(err));
        }
        if let Err(err) = self.write_header(&record).await {
            let _ = self.backend.delete(&blob_key).await;
            return Err(err);
        }
        Ok(record)
    }

    async fn commit_chunked(&self, mut record: MediaRecord, payload: &[u8]) -> Result<MediaRecord> {
        let manifest = match self.codec.write_chunks(self.backend(), record.id, payload).await {
            Ok(manifest) => manifest,
            Err(err) => {
                // Some chunks may have landed; the full split names them all.
                let (manifest, _) = self.codec.split(record.id, payload);
                let _ = self.codec.delete_chunks(self.backend(), &manifest).await;
                return Err(write_failure(err));
            }
        };
        record.payload = PayloadRef::Chunked(manifest);
        if let Err(err) = self.write_header(&record).await {
            if let PayloadRef::Chunked(manifest) = &record.payload {
                let _ = self.codec.delete_chunks(self.backend(), manifest).await;
            }
            return Err(err);
        }
        Ok(record)
    }

    async fn write_header(&self, record: &MediaRecord) -> Result<()> {
        let encoded = serde_json::to_vec(record)
            .map_err(|err| StoreError::WriteFailed(format!("header encoding: {err}")))?;
        self.backend
            .put(&MediaRecord::record_key(record.id), &encoded)
            .await
            .map_err(write_failure)
    }

    /// Fetch the header of `id`, or [`StoreError::NotFound`].
    pub async fn get(&self, id: MediaId) -> Result<MediaRecord> {
        self.load_header(&MediaRecord::record_key(id))
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    /// Fetch the full payload of `id`, reassembling chunks if needed.
    pub async fn get_payload(&self, id: MediaId) -> Result<Vec<u8>> {
        let record = self.get(id).await?;
        match &record.payload {
            PayloadRef::Inline => self
                .backend
                .get(&MediaRecord::blob_key(id))
                .await?
                .ok_or_else(|| StoreError::Corrupt(format!("inline payload missing for {id}"))),
            PayloadRef::Chunked(manifest) => {
                self.codec.reassemble(self.backend(), id, manifest).await
            }
        }
    }

    /// All committed records, newest first. Ties on capture time are broken
    /// by sequence number, so the order is deterministic.
    pub async fn list(&self) -> Result<Vec<MediaRecord>> {
        let mut records = Vec::new();
        for key in self.backend.list("records/").await? {
            match self.load_header(&key).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "skipping undecodable record header");
                }
            }
        }
        records.sort_by(|a, b| b.recency().cmp(&a.recency()));
        Ok(records)
    }

    /// Per-type counts over committed records.
    pub async fn count_by_type(&self) -> Result<MediaCounts> {
        let mut counts = MediaCounts::default();
        for record in self.list().await? {
            match record.media_type {
                MediaType::Photo => counts.photos += 1,
                MediaType::Video => counts.videos += 1,
            }
        }
        Ok(counts)
    }

    /// Delete `id` and all its payload keys. Succeeds if the record does
    /// not exist; a delete and its retry are indistinguishable.
    pub async fn delete(&self, id: MediaId) -> Result<()> {
        if let Some(record) = self.delete_inner(id).await? {
            self.notifier
                .publish(ChangeEvent::deleted(record.id, record.media_type));
        }
        Ok(())
    }

    /// Delete `id`, returning its header if this call removed it.
    ///
    /// The header is removed first; whichever racing deleter actually
    /// removed it owns the payload cleanup and the tally update, so two
    /// racing deletes never account the same record twice.
    async fn delete_inner(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        let record = match self.load_header(&MediaRecord::record_key(id)).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(id = %id, error = %err, "deleting record with undecodable header");
                None
            }
        };

        let removed_header = self.backend.delete(&MediaRecord::record_key(id)).await?;

        let Some(record) = record else {
            // No committed record; sweep payload keys that may have been
            // stranded by an interrupted write.
            let _ = self.backend.delete(&MediaRecord::blob_key(id)).await;
            self.delete_stray_chunks(id).await?;
            return Ok(None);
        };

        if !removed_header {
            // Lost the race; the winner cleans up and accounts.
            return Ok(None);
        }

        match &record.payload {
            PayloadRef::Inline => {
                self.backend.delete(&MediaRecord::blob_key(id)).await?;
            }
            PayloadRef::Chunked(manifest) => {
                self.codec.delete_chunks(self.backend(), manifest).await?;
            }
        }
        self.delete_stray_chunks(id).await?;

        self.quota.record_delete(record.size_bytes);
        tracing::info!(id = %id, media_type = %record.media_type, "deleted record");
        Ok(Some(record))
    }

    /// Remove any chunk keys under `chunks/{id}/` not covered by a
    /// manifest, so interrupted writes cannot strand storage.
    async fn delete_stray_chunks(&self, id: MediaId) -> Result<()> {
        for key in self.backend.list(&ChunkManifest::chunk_prefix(id)).await? {
            self.backend.delete(&key).await?;
        }
        Ok(())
    }

    /// Replace the metadata of `id`, rewriting its header in place.
    /// Last writer wins on concurrent updates of the same record.
    pub async fn update_metadata(
        &self,
        id: MediaId,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MediaRecord> {
        let mut record = self.get(id).await?;
        record.metadata = metadata;
        self.write_header(&record).await?;
        Ok(record)
    }

    /// Evict oldest records until usage meets the sweep targets of the
    /// quota config. Returns the evicted records, oldest first.
    pub async fn sweep(&self) -> Result<Vec<MediaRecord>> {
        let (items, bytes) = self.quota.sweep_targets();
        self.evict_until(items, bytes).await
    }

    /// Evict oldest-first until the tally satisfies both bounds.
    async fn evict_until(
        &self,
        max_items: Option<u64>,
        max_bytes: Option<u64>,
    ) -> Result<Vec<MediaRecord>> {
        let over = |quota: &QuotaManager| {
            let snap = quota.snapshot();
            max_items.map_or(false, |max| snap.item_count > max)
                || max_bytes.map_or(false, |max| snap.used_bytes > max)
        };
        if !over(&self.quota) {
            return Ok(Vec::new());
        }

        let mut oldest_first = self.list().await?;
        oldest_first.reverse();

        let mut evicted = Vec::new();
        let mut candidates = oldest_first.into_iter();
        while over(&self.quota) {
            let Some(victim) = candidates.next() else {
                break;
            };
            if let Some(record) = self.delete_inner(victim.id).await? {
                self.notifier
                    .publish(ChangeEvent::deleted(record.id, record.media_type));
                evicted.push(record);
            }
        }
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "evicted oldest records");
        }
        Ok(evicted)
    }

    async fn load_header(&self, key: &str) -> Result<Option<MediaRecord>> {
        match self.backend.get(key).await? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|err| StoreError::Corrupt(format!("record header {key}: {err}"))),
            None => Ok(None),
        }
    }
}

fn write_failure(err: StoreError) -> StoreError {
    match err {
        StoreError::WriteFailed(_) => err,
        other => StoreError::WriteFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediakeep_backend::{FailingBackend, MemoryBackend};

    fn small_config() -> StoreConfig {
        StoreConfig {
            chunk_size: 4,
            inline_threshold: 8,
            max_photo_bytes: 8,
            ..StoreConfig::default()
        }
    }

    async fn open_memory(config: StoreConfig) -> RecordStore {
        RecordStore::open(Arc::new(MemoryBackend::new()), config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_get_inline_roundtrip() {
        let store = open_memory(small_config()).await;
        let record = store
            .put(MediaType::Photo, b"pic", serde_json::Map::new())
            .await
            .unwrap();

        assert_eq!(record.payload, PayloadRef::Inline);
        assert_eq!(store.get(record.id).await.unwrap(), record);
        assert_eq!(store.get_payload(record.id).await.unwrap(), b"pic");
    }

    #[tokio::test]
    async fn test_put_get_chunked_roundtrip() {
        let store = open_memory(small_config()).await;
        let payload = b"0123456789abcdef0";
        let record = store
            .put(MediaType::Video, payload, serde_json::Map::new())
            .await
            .unwrap();

        match &record.payload {
            PayloadRef::Chunked(manifest) => {
                assert_eq!(manifest.total_chunks, 5);
                assert_eq!(manifest.total_bytes, 17);
            }
            other => panic!("expected chunked payload, got {other:?}"),
        }
        assert_eq!(store.get_payload(record.id).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_empty_and_oversized_payloads_rejected() {
        let store = open_memory(small_config()).await;
        let err = store
            .put(MediaType::Photo, b"", serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPayload(_)));

        let err = store
            .put(MediaType::Photo, b"123456789", serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPayload(_)));

        // Videos of the same size are chunked, not rejected.
        store
            .put(MediaType::Video, b"123456789", serde_json::Map::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = open_memory(small_config()).await;
        let a = store
            .put(MediaType::Photo, b"a", serde_json::Map::new())
            .await
            .unwrap();
        let b = store
            .put(MediaType::Photo, b"b", serde_json::Map::new())
            .await
            .unwrap();
        let c = store
            .put(MediaType::Video, b"c", serde_json::Map::new())
            .await
            .unwrap();

        let listed: Vec<MediaId> = store.list().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![c.id, b.id, a.id]);
    }

    #[tokio::test]
    async fn test_item_quota_evicts_oldest() {
        let config = StoreConfig {
            quota: crate::QuotaConfig {
                max_items: Some(3),
                max_bytes: None,
                retention_fraction: 1.0,
            },
            ..small_config()
        };
        let store = open_memory(config).await;

        let a = store.put(MediaType::Photo, b"a", serde_json::Map::new()).await.unwrap();
        let b = store.put(MediaType::Photo, b"b", serde_json::Map::new()).await.unwrap();
        let c = store.put(MediaType::Photo, b"c", serde_json::Map::new()).await.unwrap();
        let d = store.put(MediaType::Photo, b"d", serde_json::Map::new()).await.unwrap();

        let listed: Vec<MediaId> = store.list().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![d.id, c.id, b.id]);
        assert!(matches!(store.get(a.id).await, Err(StoreError::NotFound(_))));
        assert_eq!(store.quota().snapshot().item_count, 3);
    }

    #[tokio::test]
    async fn test_byte_quota_rejects_impossible_payload() {
        let config = StoreConfig {
            quota: crate::QuotaConfig {
                max_items: None,
                max_bytes: Some(10),
                retention_fraction: 1.0,
            },
            ..small_config()
        };
        let store = open_memory(config).await;
        let err = store
            .put(MediaType::Video, &[0u8; 11], serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_removes_chunks() {
        let store = open_memory(small_config()).await;
        let record = store
            .put(MediaType::Video, b"0123456789abcdef", serde_json::Map::new())
            .await
            .unwrap();

        store.delete(record.id).await.unwrap();
        store.delete(record.id).await.unwrap();

        assert!(matches!(
            store.get(record.id).await,
            Err(StoreError::NotFound(_))
        ));
        let chunks = store
            .backend()
            .list(&ChunkManifest::chunk_prefix(record.id))
            .await
            .unwrap();
        assert!(chunks.is_empty());
        assert_eq!(store.quota().snapshot().item_count, 0);
        assert_eq!(store.quota().snapshot().used_bytes, 0);
    }

    #[tokio::test]
    async fn test_failed_chunk_write_leaves_nothing() {
        // Budget of 2 puts: the third chunk write fails mid-payload.
        let inner = MemoryBackend::new();
        let backend = Arc::new(FailingBackend::new(inner, 2));
        let store = RecordStore::open(backend.clone(), small_config())
            .await
            .unwrap();

        let err = store
            .put(MediaType::Video, b"0123456789abcdef", serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed(_)));

        assert!(store.list().await.unwrap().is_empty());
        assert!(backend.inner().is_empty());
        assert_eq!(store.quota().snapshot().item_count, 0);
    }

    #[tokio::test]
    async fn test_failed_header_write_rolls_back_payload() {
        // Chunks fit in the budget; the header write is the one that fails.
        let inner = MemoryBackend::new();
        let backend = Arc::new(FailingBackend::new(inner, 4));
        let store = RecordStore::open(backend.clone(), small_config())
            .await
            .unwrap();

        let err = store
            .put(MediaType::Video, b"0123456789abcdef", serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed(_)));
        assert!(backend.inner().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_seeds_tally_and_sequence() {
        let backend = Arc::new(MemoryBackend::new());
        let store = RecordStore::open(backend.clone(), small_config())
            .await
            .unwrap();
        store.put(MediaType::Photo, b"aa", serde_json::Map::new()).await.unwrap();
        let last = store
            .put(MediaType::Video, b"0123456789abc", serde_json::Map::new())
            .await
            .unwrap();

        let reopened = RecordStore::open(backend, small_config()).await.unwrap();
        let snap = reopened.quota().snapshot();
        assert_eq!(snap.item_count, 2);
        assert_eq!(snap.used_bytes, 2 + 13);

        // New records keep sorting after the pre-existing ones.
        let next = reopened
            .put(MediaType::Photo, b"bb", serde_json::Map::new())
            .await
            .unwrap();
        assert!(next.seq > last.seq);
    }

    #[tokio::test]
    async fn test_update_metadata_persists() {
        let store = open_memory(small_config()).await;
        let record = store
            .put(MediaType::Photo, b"pic", serde_json::Map::new())
            .await
            .unwrap();

        let mut metadata = serde_json::Map::new();
        metadata.insert("event_name".into(), serde_json::json!("ceremony"));
        store.update_metadata(record.id, metadata.clone()).await.unwrap();

        let fetched = store.get(record.id).await.unwrap();
        assert_eq!(fetched.metadata, metadata);
        assert_eq!(fetched.checksum, record.checksum);
    }

    #[tokio::test]
    async fn test_sweep_trims_to_retention_target() {
        let config = StoreConfig {
            quota: crate::QuotaConfig {
                max_items: Some(4),
                max_bytes: None,
                retention_fraction: 0.5,
            },
            ..small_config()
        };
        let store = open_memory(config).await;
        for payload in [&b"a"[..], b"b", b"c", b"d"] {
            store.put(MediaType::Photo, payload, serde_json::Map::new()).await.unwrap();
        }

        let evicted = store.sweep().await.unwrap();
        assert_eq!(evicted.len(), 2);
        assert_eq!(store.list().await.unwrap().len(), 2);
        // Oldest went first.
        assert_eq!(
            store.get_payload(store.list().await.unwrap()[1].id).await.unwrap(),
            b"c"
        );
    }

    #[tokio::test]
    async fn test_count_by_type() {
        let store = open_memory(small_config()).await;
        store.put(MediaType::Photo, b"a", serde_json::Map::new()).await.unwrap();
        store.put(MediaType::Photo, b"b", serde_json::Map::new()).await.unwrap();
        store.put(MediaType::Video, b"c", serde_json::Map::new()).await.unwrap();

        let counts = store.count_by_type().await.unwrap();
        assert_eq!(counts, MediaCounts { photos: 2, videos: 1 });
    }

    #[tokio::test]
    async fn test_deletion_events_published_for_evictions() {
        let config = StoreConfig {
            quota: crate::QuotaConfig {
                max_items: Some(1),
                max_bytes: None,
                retention_fraction: 1.0,
            },
            ..small_config()
        };
        let store = open_memory(config).await;
        let first = store
            .put(MediaType::Photo, b"a", serde_json::Map::new())
            .await
            .unwrap();

        let mut rx = store.notifier().subscribe();
        store.put(MediaType::Photo, b"b", serde_json::Map::new()).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, crate::ChangeKind::Deleted);
        assert_eq!(event.id, first.id);
    }

    #[tokio::test]
    async fn test_concurrent_puts_both_commit() {
        let store = Arc::new(open_memory(small_config()).await);
        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .put(MediaType::Video, b"0123456789abcdef", serde_json::Map::new())
                    .await
                    .unwrap()
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .put(MediaType::Video, b"fedcba9876543210", serde_json::Map::new())
                    .await
                    .unwrap()
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_ne!(a.id, b.id);
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(store.quota().snapshot().item_count, 2);
    }
}
