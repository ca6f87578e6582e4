//! Shared vocabulary for the mediakeep storage engine.
//!
//! Every other crate in the workspace depends on this one for the media
//! identifier, the media kind, and the error taxonomy. Nothing in here
//! performs I/O.

pub mod error;
pub mod ids;

pub use error::{Result, StoreError};
pub use ids::{MediaId, MediaType};
