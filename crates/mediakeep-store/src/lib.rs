//! Durable record store for captured media.
//!
//! A [`RecordStore`] keeps media records and their payloads in a
//! [`BlobBackend`](mediakeep_backend::BlobBackend), enforcing a bounded
//! footprint through its [`QuotaManager`] and broadcasting record lifecycle
//! changes through its [`ChangeNotifier`]. The [`IntegrityScanner`] audits
//! chunked payloads for gaps left by interrupted or partially failed writes.

pub mod config;
pub mod integrity;
pub mod model;
pub mod notify;
pub mod quota;
pub mod store;

pub use config::{QuotaConfig, StoreConfig};
pub use integrity::{BrokenVideo, IntegrityScanner};
pub use model::{payload_checksum, MediaRecord, PayloadRef};
pub use notify::{ChangeEvent, ChangeKind, ChangeNotifier};
pub use quota::{Admission, QuotaManager, UsageSnapshot};
pub use store::{MediaCounts, RecordStore};
