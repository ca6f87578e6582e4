//! Media engine facade for mediakeep.
//!
//! [`MediaEngine`] is the single entry point applications use: validated
//! saves with read-after-write verification, typed payload fetches, quota
//! and usage reporting, broken-video diagnostics, and change event
//! subscriptions. Storage policy and persistence live in the layers
//! below (`mediakeep-store`, `mediakeep-backend`).

pub mod engine;
pub mod save;

pub use engine::{MediaEngine, StorageInfo};
pub use save::SavePhase;

// The types callers handle come from the lower crates; re-export the
// common ones so most applications only depend on this crate.
pub use mediakeep_store::{
    BrokenVideo, ChangeEvent, ChangeKind, MediaCounts, MediaRecord, PayloadRef, QuotaConfig,
    StoreConfig, UsageSnapshot,
};
pub use mediakeep_types::{MediaId, MediaType, Result, StoreError};
