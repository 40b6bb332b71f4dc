//! Data layer module
//!
//! Handles all data persistence and caching:
//! - Record store contract and its SQLite implementation
//! - Sync marker cache (volatile)

mod cache;
mod database;
mod models;
mod repository;

pub use cache::{LAST_SYNC_KEY, SyncMarker};
pub use database::Database;
pub use models::*;
pub use repository::PostRepository;

#[cfg(test)]
pub use repository::MockPostRepository;
