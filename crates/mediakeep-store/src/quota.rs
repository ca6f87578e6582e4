//! Quota manager: running usage tally and admission decisions.
//!
//! The tally is held in atomics and updated by the store on every committed
//! put and delete, so usage queries never rescan the backend. The manager
//! only decides; eviction itself is executed by the store, which owns record
//! ordering and deletion.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::config::QuotaConfig;

/// Point-in-time usage of a store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub item_count: u64,
    pub used_bytes: u64,
    /// Configured byte threshold, if any.
    pub capacity_bytes: Option<u64>,
    /// Configured item threshold, if any.
    pub max_items: Option<u64>,
    /// Fullness against the tightest configured threshold, 0.0 to 100.0 and
    /// beyond if usage was seeded above a threshold.
    pub used_percent: f64,
}

impl UsageSnapshot {
    /// Whether usage crossed 80% of a configured threshold.
    pub fn is_nearly_full(&self) -> bool {
        self.used_percent >= 80.0
    }
}

/// Outcome of an admission check for one incoming payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The payload fits as-is.
    Admit,
    /// Oldest records must be evicted until existing usage drops to the
    /// given bounds, then the payload fits.
    Evict {
        /// Largest admissible pre-write item count, if items are bounded.
        max_items_after: Option<u64>,
        /// Largest admissible pre-write byte usage, if bytes are bounded.
        max_bytes_after: Option<u64>,
    },
    /// The payload can never fit, even into an empty store.
    Reject { requested: u64, capacity: u64 },
}

/// Tracks usage against a [`QuotaConfig`] and decides admissions.
#[derive(Debug)]
pub struct QuotaManager {
    config: QuotaConfig,
    item_count: AtomicU64,
    used_bytes: AtomicU64,
}

impl QuotaManager {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            item_count: AtomicU64::new(0),
            used_bytes: AtomicU64::new(0),
        }
    }

    /// Initialize the tally from a startup scan of committed records.
    pub fn seed(&self, items: u64, bytes: u64) {
        self.item_count.store(items, Ordering::SeqCst);
        self.used_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Account one committed put.
    pub fn record_put(&self, bytes: u64) {
        self.item_count.fetch_add(1, Ordering::SeqCst);
        self.used_bytes.fetch_add(bytes, Ordering::SeqCst);
    }

    /// Account one committed delete. Saturates at zero so a stale seed can
    /// never wrap the tally.
    pub fn record_delete(&self, bytes: u64) {
        let _ = self
            .item_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            });
        let _ = self
            .used_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(bytes))
            });
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let item_count = self.item_count.load(Ordering::SeqCst);
        let used_bytes = self.used_bytes.load(Ordering::SeqCst);

        let mut used_percent: f64 = 0.0;
        if let Some(max) = self.config.max_items {
            if max > 0 {
                used_percent = used_percent.max(item_count as f64 / max as f64 * 100.0);
            }
        }
        if let Some(max) = self.config.max_bytes {
            if max > 0 {
                used_percent = used_percent.max(used_bytes as f64 / max as f64 * 100.0);
            }
        }

        UsageSnapshot {
            item_count,
            used_bytes,
            capacity_bytes: self.config.max_bytes,
            max_items: self.config.max_items,
            used_percent,
        }
    }

    /// Decide whether a payload of `incoming_bytes` may be stored.
    ///
    /// Eviction targets honor `retention_fraction`, but feasibility is
    /// always judged against the full thresholds: a payload is rejected
    /// only when it exceeds the byte threshold outright.
    pub fn admit(&self, incoming_bytes: u64) -> Admission {
        if let Some(max_bytes) = self.config.max_bytes {
            if incoming_bytes > max_bytes {
                return Admission::Reject {
                    requested: incoming_bytes,
                    capacity: max_bytes,
                };
            }
        }

        let item_count = self.item_count.load(Ordering::SeqCst);
        let used_bytes = self.used_bytes.load(Ordering::SeqCst);
        let retention = self.config.retention();

        let over_items = self
            .config
            .max_items
            .map_or(false, |max| item_count + 1 > max);
        let over_bytes = self
            .config
            .max_bytes
            .map_or(false, |max| used_bytes + incoming_bytes > max);

        if !over_items && !over_bytes {
            return Admission::Admit;
        }

        // Existing usage must drop so that the incoming item lands at or
        // below the retention target.
        let max_items_after = self.config.max_items.map(|max| {
            let target = ((max as f64 * retention).floor() as u64).max(1);
            target - 1
        });
        let max_bytes_after = self.config.max_bytes.map(|max| {
            let target = (max as f64 * retention).floor() as u64;
            target.saturating_sub(incoming_bytes)
        });

        Admission::Evict {
            max_items_after,
            max_bytes_after,
        }
    }

    /// Targets for a maintenance sweep with no incoming payload: existing
    /// usage is reduced to the retention fraction of each threshold.
    pub fn sweep_targets(&self) -> (Option<u64>, Option<u64>) {
        let retention = self.config.retention();
        let items = self
            .config
            .max_items
            .map(|max| (max as f64 * retention).floor() as u64);
        let bytes = self
            .config
            .max_bytes
            .map(|max| (max as f64 * retention).floor() as u64);
        (items, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(max_items: Option<u64>, max_bytes: Option<u64>) -> QuotaManager {
        QuotaManager::new(QuotaConfig {
            max_items,
            max_bytes,
            retention_fraction: 1.0,
        })
    }

    #[test]
    fn test_admit_under_both_thresholds() {
        let q = quota(Some(3), Some(100));
        q.seed(2, 40);
        assert_eq!(q.admit(10), Admission::Admit);
    }

    #[test]
    fn test_item_threshold_forces_single_eviction() {
        let q = quota(Some(3), None);
        q.seed(3, 300);
        match q.admit(100) {
            Admission::Evict {
                max_items_after, ..
            } => assert_eq!(max_items_after, Some(2)),
            other => panic!("unexpected admission: {other:?}"),
        }
    }

    #[test]
    fn test_byte_threshold_eviction_target_accounts_for_incoming() {
        let q = quota(None, Some(100));
        q.seed(4, 90);
        match q.admit(30) {
            Admission::Evict {
                max_bytes_after, ..
            } => assert_eq!(max_bytes_after, Some(70)),
            other => panic!("unexpected admission: {other:?}"),
        }
    }

    #[test]
    fn test_oversized_payload_rejected_even_when_empty() {
        let q = quota(None, Some(100));
        assert_eq!(
            q.admit(101),
            Admission::Reject {
                requested: 101,
                capacity: 100
            }
        );
        // At exactly the threshold it is admissible.
        assert_eq!(q.admit(100), Admission::Admit);
    }

    #[test]
    fn test_retention_fraction_frees_headroom() {
        let q = QuotaManager::new(QuotaConfig {
            max_items: Some(50),
            max_bytes: None,
            retention_fraction: 0.5,
        });
        q.seed(50, 0);
        match q.admit(1) {
            Admission::Evict {
                max_items_after, ..
            } => assert_eq!(max_items_after, Some(24)),
            other => panic!("unexpected admission: {other:?}"),
        }
    }

    #[test]
    fn test_tally_updates_and_saturation() {
        let q = quota(Some(10), Some(100));
        q.record_put(30);
        q.record_put(20);
        q.record_delete(30);
        let snap = q.snapshot();
        assert_eq!(snap.item_count, 1);
        assert_eq!(snap.used_bytes, 20);

        q.record_delete(100);
        q.record_delete(100);
        let snap = q.snapshot();
        assert_eq!(snap.item_count, 0);
        assert_eq!(snap.used_bytes, 0);
    }

    #[test]
    fn test_used_percent_takes_tightest_axis() {
        let q = quota(Some(10), Some(100));
        q.seed(9, 10);
        let snap = q.snapshot();
        assert_eq!(snap.used_percent, 90.0);
        assert!(snap.is_nearly_full());

        let q = quota(None, None);
        q.seed(1000, 1 << 40);
        assert_eq!(q.snapshot().used_percent, 0.0);
        assert!(!q.snapshot().is_nearly_full());
    }
}
