//! Freshness gate
//!
//! Decides, before a listing is served, whether the mirror has data or a
//! background refresh has to be requested first.

use std::sync::Arc;

use crate::data::{PostRepository, SyncMarker};
use crate::error::AppError;
use crate::jobs::{Dispatch, Job, JobQueue};

/// Result of a gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The store has posts; serve them
    Ready,
    /// The store is empty; a sync was requested or is already under way
    Syncing {
        /// Whether this check queued a new sync job
        dispatched: bool,
    },
}

/// Gate in front of the listing endpoint
pub struct FreshnessGate {
    posts: Arc<dyn PostRepository>,
    marker: Arc<SyncMarker>,
    jobs: JobQueue,
}

impl FreshnessGate {
    pub fn new(posts: Arc<dyn PostRepository>, marker: Arc<SyncMarker>, jobs: JobQueue) -> Self {
        Self {
            posts,
            marker,
            jobs,
        }
    }

    /// Check the store before serving a listing
    ///
    /// Stale data is still served; only an empty store triggers a refresh.
    pub async fn check(&self) -> Result<Freshness, AppError> {
        if self.posts.count().await? > 0 {
            return Ok(Freshness::Ready);
        }

        let dispatched = self.request_sync().await;
        Ok(Freshness::Syncing { dispatched })
    }

    /// Queue a sync unless one completed within the marker TTL
    ///
    /// Returns whether a new job was queued. A job already in flight counts
    /// as not queued.
    pub async fn request_sync(&self) -> bool {
        if self.marker.is_fresh().await {
            tracing::debug!("Sync marker is fresh; not dispatching");
            return false;
        }

        self.jobs.dispatch(Job::SyncPosts) == Dispatch::Queued
    }
}
