//! Request rate limiting
//!
//! Fixed-window limiter keyed by authenticated user id, or by client IP for
//! anonymous requests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::RwLock;

use crate::AppState;
use crate::auth::MaybeUser;
use crate::error::AppError;

/// Rate limiter entry
#[derive(Debug, Clone)]
struct RateLimitEntry {
    /// Number of requests in current window
    count: u32,
    /// Window start time
    window_start: Instant,
}

impl RateLimitEntry {
    fn is_new_window(&self, window_duration: Duration) -> bool {
        self.window_start.elapsed() >= window_duration
    }

    fn increment(&mut self, window_duration: Duration) {
        if self.is_new_window(window_duration) {
            self.count = 1;
            self.window_start = Instant::now();
        } else {
            self.count += 1;
        }
    }

    fn retry_after(&self, window_duration: Duration) -> u64 {
        let remaining = window_duration.saturating_sub(self.window_start.elapsed());
        remaining.as_secs().max(1)
    }
}

/// Quota left after an allowed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allowance {
    pub limit: u32,
    pub remaining: u32,
}

/// Rate limiter for API requests
pub struct RateLimiter {
    /// Rate limit entries: key -> entry
    entries: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
    /// Maximum requests per window
    max_requests: u32,
    /// Window duration
    window_duration: Duration,
    /// Maximum number of tracked keys in memory
    max_tracked_keys: usize,
}

impl RateLimiter {
    /// Create new rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests per window
    /// * `window_duration` - Window duration
    /// * `max_tracked_keys` - In-memory key cap
    pub fn new(max_requests: u32, window_duration: Duration, max_tracked_keys: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window_duration,
            max_tracked_keys: max_tracked_keys.max(1),
        }
    }

    pub fn from_config(config: &crate::config::RateLimitConfig) -> Self {
        Self::new(
            config.max_requests,
            config.window(),
            config.max_tracked_keys,
        )
    }

    fn prune_expired_locked(
        entries: &mut HashMap<String, RateLimitEntry>,
        window_duration: Duration,
    ) -> usize {
        let before = entries.len();
        entries.retain(|_, value| !value.is_new_window(window_duration));
        before - entries.len()
    }

    fn evict_oldest_locked(entries: &mut HashMap<String, RateLimitEntry>) -> bool {
        let Some(oldest_key) = entries
            .iter()
            .min_by_key(|(_, value)| value.window_start)
            .map(|(key, _)| key.clone())
        else {
            return false;
        };
        entries.remove(&oldest_key);
        true
    }

    /// Count a request against `key`
    ///
    /// # Returns
    /// The remaining allowance, or `AppError::RateLimited` once the window is
    /// exhausted
    pub async fn check_and_increment(&self, key: &str) -> Result<Allowance, AppError> {
        let mut entries = self.entries.write().await;

        if !entries.contains_key(key) && entries.len() >= self.max_tracked_keys {
            Self::prune_expired_locked(&mut entries, self.window_duration);
            if entries.len() >= self.max_tracked_keys {
                let _ = Self::evict_oldest_locked(&mut entries);
            }
        }

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                count: 0,
                window_start: Instant::now(),
            });

        if !entry.is_new_window(self.window_duration) && entry.count >= self.max_requests {
            return Err(AppError::RateLimited {
                retry_after: entry.retry_after(self.window_duration),
            });
        }

        entry.increment(self.window_duration);
        Ok(Allowance {
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
        })
    }

    /// Get current count for a key
    pub async fn get_count(&self, key: &str) -> u32 {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| !e.is_new_window(self.window_duration))
            .map(|e| e.count)
            .unwrap_or(0)
    }

    /// Number of keys currently tracked
    pub async fn tracked_keys(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Prune old entries
    ///
    /// Should be called periodically to clean up expired entries.
    pub async fn prune_old(&self) {
        let mut entries = self.entries.write().await;
        let removed = Self::prune_expired_locked(&mut entries, self.window_duration);

        if removed > 0 {
            tracing::debug!("Pruned {} old rate limit entries", removed);
        }
    }
}

fn request_key(user: Option<&crate::auth::ApiUser>, peer: Option<SocketAddr>) -> String {
    match (user, peer) {
        (Some(user), _) => user.rate_limit_key(),
        (None, Some(addr)) => format!("ip:{}", addr.ip()),
        (None, None) => "ip:unknown".to_string(),
    }
}

/// Middleware that throttles requests per user or client IP
pub async fn throttle_requests(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let MaybeUser(user) = match MaybeUser::from_request_parts(&mut parts, &state).await {
        Ok(user) => user,
        Err(never) => match never {},
    };
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = request_key(user.as_ref(), peer);

    let allowance = match state.rate_limiter.check_and_increment(&key).await {
        Ok(allowance) => allowance,
        Err(error) => {
            tracing::warn!(key = %key, "Rate limit exceeded");
            let mut response = error.into_response();
            insert_quota_headers(
                &mut response,
                Allowance {
                    limit: state.rate_limiter.max_requests,
                    remaining: 0,
                },
            );
            return response;
        }
    };

    let mut response = next.run(Request::from_parts(parts, body)).await;
    insert_quota_headers(&mut response, allowance);
    response
}

fn insert_quota_headers(response: &mut Response, allowance: Allowance) {
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(allowance.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(allowance.remaining),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1), 100);

        assert_eq!(
            limiter.check_and_increment("ip:1.2.3.4").await.unwrap(),
            Allowance {
                limit: 3,
                remaining: 2
            }
        );
        assert!(limiter.check_and_increment("ip:1.2.3.4").await.is_ok());
        assert!(limiter.check_and_increment("ip:1.2.3.4").await.is_ok());

        // 4th request should be rate limited
        assert!(matches!(
            limiter.check_and_increment("ip:1.2.3.4").await,
            Err(AppError::RateLimited { retry_after }) if retry_after >= 1
        ));

        // Wait for window to reset
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(limiter.check_and_increment("ip:1.2.3.4").await.is_ok());
    }

    #[tokio::test]
    async fn test_different_keys() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60), 100);

        assert!(limiter.check_and_increment("user:1").await.is_ok());
        assert!(limiter.check_and_increment("user:1").await.is_ok());
        assert!(limiter.check_and_increment("user:2").await.is_ok());
        assert!(limiter.check_and_increment("user:2").await.is_ok());

        assert!(limiter.check_and_increment("user:1").await.is_err());
        assert!(limiter.check_and_increment("user:2").await.is_err());
    }

    #[tokio::test]
    async fn test_max_tracked_keys_evicts_oldest_entry() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60), 2);

        assert!(limiter.check_and_increment("a").await.is_ok());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(limiter.check_and_increment("b").await.is_ok());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(limiter.check_and_increment("c").await.is_ok());

        assert_eq!(limiter.tracked_keys().await, 2);
        assert_eq!(limiter.get_count("a").await, 0);
        assert_eq!(limiter.get_count("b").await, 1);
        assert_eq!(limiter.get_count("c").await, 1);
    }

    #[tokio::test]
    async fn test_prune_old_drops_expired_windows() {
        let limiter = RateLimiter::new(10, Duration::from_millis(20), 100);
        assert!(limiter.check_and_increment("a").await.is_ok());

        tokio::time::sleep(Duration::from_millis(40)).await;
        limiter.prune_old().await;

        assert_eq!(limiter.tracked_keys().await, 0);
    }

    #[test]
    fn test_request_key_prefers_user() {
        let user = crate::auth::ApiUser {
            id: 9,
            name: "ops".to_string(),
        };
        let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();

        assert_eq!(request_key(Some(&user), Some(peer)), "user:9");
        assert_eq!(request_key(None, Some(peer)), "ip:10.0.0.1");
        assert_eq!(request_key(None, None), "ip:unknown");
    }
}
