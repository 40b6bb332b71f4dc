//! API layer
//!
//! HTTP handlers for:
//! - Post listing and lookup
//! - Manual sync trigger
//! - Metrics (Prometheus)

mod dto;
pub mod metrics;
mod posts;
mod user;

pub use dto::*;
pub use metrics::metrics_router;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::AppState;

/// Create the post API router
///
/// Every route is throttled per user or client IP. Reads are public; the
/// manual sync trigger and `/v1/user` require a bearer token through their
/// `CurrentUser` extractor.
pub fn posts_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/posts", get(posts::list_posts))
        .route("/v1/posts/:id", get(posts::get_post))
        .route("/v1/user", get(user::current_user))
        .route("/sync-posts", post(posts::force_sync))
        .layer(middleware::from_fn_with_state(
            state,
            crate::rate_limit::throttle_requests,
        ))
}
