//! In-memory caches
//!
//! These caches are volatile and cleared on restart.
//! Uses Moka for high-performance concurrent caching.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::time::Duration;

/// Cache key of the "last successful sync" entry
pub const LAST_SYNC_KEY: &str = "posts_last_sync";

// =============================================================================
// Sync Marker
// =============================================================================

/// Keyed cache holding the last successful sync time
///
/// An entry is valid until `synced_at + ttl`. Expiry is implicit: Moka
/// evicts the entry after the TTL, and reads also compare against the
/// stored timestamp so the answer never depends on eviction timing.
pub struct SyncMarker {
    entries: Cache<&'static str, DateTime<Utc>>,
    ttl: Duration,
}

impl SyncMarker {
    /// Create new marker cache
    ///
    /// # Arguments
    /// * `ttl` - How long a completed sync stays valid
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder().max_capacity(1).time_to_live(ttl).build();

        Self { entries, ttl }
    }

    /// Record a successful sync at `synced_at`
    pub async fn mark(&self, synced_at: DateTime<Utc>) {
        self.entries.insert(LAST_SYNC_KEY, synced_at).await;
        tracing::debug!(%synced_at, ttl_secs = self.ttl.as_secs(), "Sync marker set");
    }

    /// Last successful sync time, if still within the TTL
    pub async fn last_synced(&self) -> Option<DateTime<Utc>> {
        let result = self
            .entries
            .get(LAST_SYNC_KEY)
            .await
            .filter(|synced_at| Self::expiry_of(*synced_at, self.ttl) > Utc::now());

        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&["sync_marker"]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&["sync_marker"]).inc();
        }

        result
    }

    /// When the current marker stops being valid
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced()
            .await
            .map(|synced_at| Self::expiry_of(synced_at, self.ttl))
    }

    /// True while a sync completed within the TTL window
    pub async fn is_fresh(&self) -> bool {
        self.last_synced().await.is_some()
    }

    /// Drop the marker
    pub async fn clear(&self) {
        self.entries.invalidate(LAST_SYNC_KEY).await;
    }

    fn expiry_of(synced_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        synced_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
