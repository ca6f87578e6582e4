//! Save state machine phases.
//!
//! A save moves strictly forward through the phases below; any phase can
//! fall to `Failed`, at which point everything the save wrote has been
//! rolled back. The phase is logged at every transition so an interrupted
//! save can be located in the logs by its last recorded phase.

use std::fmt;

/// Phase of one save operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePhase {
    Idle,
    /// Payload and metadata checks, nothing written yet.
    Validating,
    /// Payload and header going to the backend.
    Writing,
    /// Read-after-write check of the committed payload.
    Verifying,
    /// Record is live and announced to subscribers.
    Published,
    /// Save aborted; no trace of it remains in the store.
    Failed,
}

impl fmt::Display for SavePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SavePhase::Idle => "idle",
            SavePhase::Validating => "validating",
            SavePhase::Writing => "writing",
            SavePhase::Verifying => "verifying",
            SavePhase::Published => "published",
            SavePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current phase of a save and logs transitions.
pub(crate) struct SaveProgress {
    phase: SavePhase,
}

impl SaveProgress {
    pub(crate) fn start() -> Self {
        Self {
            phase: SavePhase::Idle,
        }
    }

    pub(crate) fn advance(&mut self, next: SavePhase) {
        tracing::debug!(from = %self.phase, to = %next, "save phase transition");
        self.phase = next;
    }

    pub(crate) fn fail(&mut self, reason: &str) {
        tracing::warn!(from = %self.phase, reason, "save failed");
        self.phase = SavePhase::Failed;
    }
}
