//! Data models
//!
//! Rust structs representing database rows and upstream records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Post
// =============================================================================

/// A mirrored post
///
/// `id` is assigned by the store; `external_id` comes from the upstream
/// feed and is unique across all rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub external_id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Upstream record
// =============================================================================

/// A post as served by the upstream feed
///
/// Unknown fields such as `userId` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePost {
    pub id: i64,
    pub title: String,
    pub body: String,
}

impl SourcePost {
    pub fn new(id: i64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
        }
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of posts plus the totals needed for pagination metadata
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// Total number of posts in the store
    pub total: i64,
    /// 1-based page number actually served
    pub page: u32,
    pub page_size: u32,
}

impl PostPage {
    /// Number of the last page (at least 1, even when empty)
    pub fn last_page(&self) -> u32 {
        let size = i64::from(self.page_size.max(1));
        let pages = (self.total + size - 1) / size;
        pages.max(1) as u32
    }

    /// 1-based position of the first post on this page
    pub fn from(&self) -> Option<i64> {
        if self.posts.is_empty() {
            None
        } else {
            Some(self.offset() + 1)
        }
    }

    /// 1-based position of the last post on this page
    pub fn to(&self) -> Option<i64> {
        if self.posts.is_empty() {
            None
        } else {
            Some(self.offset() + self.posts.len() as i64)
        }
    }

    fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}
