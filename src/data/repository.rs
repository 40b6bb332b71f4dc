//! Record store contract
//!
//! Handlers, the freshness gate and the sync coordinator only depend on this
//! trait, so any storage engine satisfying it can back the mirror.

use async_trait::async_trait;

use super::models::{Post, PostPage, SourcePost};
use crate::error::AppError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create or update one post per record, keyed by external id.
    ///
    /// Repeating a call with overlapping input never creates duplicates.
    /// Returns the number of records written.
    async fn upsert_many(&self, records: &[SourcePost]) -> Result<u64, AppError>;

    /// Total number of stored posts.
    async fn count(&self) -> Result<i64, AppError>;

    /// Posts ordered newest-first.
    ///
    /// `page_number` is 1-based; zero is treated as the first page.
    async fn list_recent(&self, page_size: u32, page_number: u32) -> Result<PostPage, AppError>;

    /// Look up a post by its upstream identifier.
    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Post>, AppError>;
}
