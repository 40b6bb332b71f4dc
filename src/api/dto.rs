//! API response DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{Post, PostPage};

/// Serialized post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub external_id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            external_id: post.external_id,
            title: post.title,
            body: post.body,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Single resource envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostEnvelope {
    pub data: PostResponse,
}

/// Paginated collection envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCollection {
    pub data: Vec<PostResponse>,
    pub links: PaginationLinks,
    pub meta: PaginationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub current_page: u32,
    pub from: Option<i64>,
    pub last_page: u32,
    pub path: String,
    pub per_page: u32,
    pub to: Option<i64>,
    pub total: i64,
}

impl PostCollection {
    /// Build the envelope for `page`, with links rooted at `path`
    pub fn from_page(page: PostPage, path: &str) -> Self {
        let last_page = page.last_page();
        let current = page.page;
        let link = |n: u32| format!("{path}?page={n}");

        let links = PaginationLinks {
            first: link(1),
            last: link(last_page),
            prev: (current > 1).then(|| link(current - 1)),
            next: (current < last_page).then(|| link(current + 1)),
        };
        let meta = PaginationMeta {
            current_page: current,
            from: page.from(),
            last_page,
            path: path.to_string(),
            per_page: page.page_size,
            to: page.to(),
            total: page.total,
        };

        Self {
            data: page.posts.into_iter().map(PostResponse::from).collect(),
            links,
            meta,
        }
    }
}

/// Plain `{"message": ...}` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
