//! Integrity scanner: finds video records whose chunked payloads can no
//! longer be reassembled.
//!
//! A broken record has a committed header but one or more absent chunks,
//! the footprint of an interrupted delete or external tampering. The
//! scanner only reports; repair is a separate, explicit operation that
//! removes the record and whatever payload keys survive.

use serde::Serialize;

use mediakeep_types::{MediaId, MediaType, Result};

use crate::model::PayloadRef;
use crate::store::RecordStore;

/// One unrecoverable video record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenVideo {
    pub id: MediaId,
    /// Absent chunk indices, ascending.
    pub missing_chunk_indices: Vec<u32>,
    pub total_chunks: u32,
}

/// Read-only audit over a store's chunked video payloads.
pub struct IntegrityScanner<'a> {
    store: &'a RecordStore,
}

impl<'a> IntegrityScanner<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Audit every video record and report the broken ones.
    ///
    /// Healthy records are not mentioned. The scan takes no locks and
    /// mutates nothing, so it can run while saves are in flight; a record
    /// deleted mid-scan may appear with all chunks missing, which repair
    /// handles as a no-op.
    pub async fn scan(&self) -> Result<Vec<BrokenVideo>> {
        let mut broken = Vec::new();
        for record in self.store.list().await? {
            if record.media_type != MediaType::Video {
                continue;
            }
            let PayloadRef::Chunked(manifest) = &record.payload else {
                continue;
            };

            let mut missing = self
                .store
                .codec()
                .missing_chunks(self.store.backend(), manifest)
                .await?;
            // A manifest that names fewer keys than it declares is missing
            // the undeclared tail as well.
            for index in manifest.chunks.len() as u32..manifest.total_chunks {
                missing.push(index);
            }

            if !missing.is_empty() {
                tracing::warn!(
                    id = %record.id,
                    missing = missing.len(),
                    total = manifest.total_chunks,
                    "found unrecoverable video record"
                );
                broken.push(BrokenVideo {
                    id: record.id,
                    missing_chunk_indices: missing,
                    total_chunks: manifest.total_chunks,
                });
            }
        }
        Ok(broken)
    }

    /// Remove a broken record and its surviving chunks. Safe to call on a
    /// healthy or absent id; repair of nothing succeeds.
    pub async fn repair(&self, id: MediaId) -> Result<()> {
        self.store.delete(id).await
    }
}
