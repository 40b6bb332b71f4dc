//! Sync service
//!
//! Pulls the full post collection from the upstream feed and upserts it into
//! the record store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::data::{PostRepository, SourcePost, SyncMarker};
use crate::error::AppError;

/// Upstream sync coordinator
pub struct SyncService {
    posts: Arc<dyn PostRepository>,
    marker: Arc<SyncMarker>,
    http_client: reqwest::Client,
    source_url: String,
    timeout: Duration,
}

impl SyncService {
    /// Create new sync service
    ///
    /// # Arguments
    /// * `source_url` - URL of the upstream posts collection
    /// * `timeout` - Bound on the whole upstream request
    pub fn new(
        posts: Arc<dyn PostRepository>,
        marker: Arc<SyncMarker>,
        http_client: reqwest::Client,
        source_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            posts,
            marker,
            http_client,
            source_url: source_url.into(),
            timeout,
        }
    }

    /// Refresh the mirror once
    ///
    /// Returns `false` on any failure. Nothing is written and the sync
    /// marker is left alone when the fetch fails.
    pub async fn sync_posts(&self) -> bool {
        let started = Instant::now();

        match self.try_sync().await {
            Ok(written) => {
                crate::metrics::observe_sync("success", started.elapsed());
                crate::metrics::POSTS_UPSERTED_TOTAL.inc_by(written);
                tracing::info!(
                    written,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Post sync completed"
                );
                true
            }
            Err(error) => {
                crate::metrics::observe_sync("failure", started.elapsed());
                tracing::warn!(%error, source = %self.source_url, "Post sync failed");
                false
            }
        }
    }

    async fn try_sync(&self) -> Result<u64, AppError> {
        let records = self.fetch_posts().await?;
        let written = self.posts.upsert_many(&records).await?;
        self.marker.mark(Utc::now()).await;
        Ok(written)
    }

    /// Fetch and decode the upstream collection
    ///
    /// # Errors
    /// Network failures, timeouts, non-2xx statuses and undecodable bodies
    pub async fn fetch_posts(&self) -> Result<Vec<SourcePost>, AppError> {
        let response = self
            .http_client
            .get(&self.source_url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let records = response.json::<Vec<SourcePost>>().await?;
        tracing::debug!(count = records.len(), "Fetched upstream posts");
        Ok(records)
    }
}
