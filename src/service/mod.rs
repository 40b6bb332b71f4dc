//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the record store, the sync marker and the job queue.

mod freshness;
mod sync;

pub use freshness::{Freshness, FreshnessGate};
pub use sync::SyncService;
