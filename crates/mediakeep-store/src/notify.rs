//! Change notifier: in-process broadcast of record lifecycle events.
//!
//! Delivery is fire-and-forget. A publish with no live subscribers is not an
//! error, and a slow subscriber that lags past the channel capacity loses
//! the oldest events. Consumers must treat events as hints and reconcile
//! against the store, so duplicate or dropped deliveries are harmless.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use mediakeep_types::{MediaId, MediaType};

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Deleted,
}

/// One record lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub id: MediaId,
    pub media_type: MediaType,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn created(id: MediaId, media_type: MediaType) -> Self {
        Self {
            kind: ChangeKind::Created,
            id,
            media_type,
            timestamp: Utc::now(),
        }
    }

    pub fn deleted(id: MediaId, media_type: MediaType) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            id,
            media_type,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast hub for [`ChangeEvent`]s.
#[derive(Debug)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Open a new subscription; only events published after this call are
    /// delivered to it.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: ChangeEvent) {
        let delivered = self.tx.send(event.clone()).unwrap_or(0);
        tracing::debug!(
            kind = ?event.kind,
            id = %event.id,
            subscribers = delivered,
            "published change event"
        );
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}
