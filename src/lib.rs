//! post-mirror - A paginated read API over a locally cached mirror of an
//! upstream post feed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - GET /v1/posts, GET /v1/posts/:id, POST /sync-posts       │
//! │  - Bearer token auth, per-user/IP rate limiting             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Freshness gate (serve, or request a sync)                │
//! │  - Sync coordinator (fetch upstream, upsert, mark)          │
//! │  - Job queue + background worker                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx) behind `PostRepository`                    │
//! │  - Sync marker cache (Moka, TTL)                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Freshness gate and sync coordinator
//! - `jobs`: Fire-and-forget job queue and worker
//! - `data`: Record store and sync marker
//! - `auth`: Bearer token authentication
//! - `rate_limit`: Request throttling
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod rate_limit;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the record store, caches, and job queue.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Record store
    pub db: Arc<dyn data::PostRepository>,

    /// Last successful sync (volatile, TTL)
    pub sync_marker: Arc<data::SyncMarker>,

    /// Upstream sync coordinator, run by the job worker
    pub sync: Arc<service::SyncService>,

    /// Background job queue
    pub jobs: jobs::JobQueue,

    /// Request throttling state
    pub rate_limiter: Arc<rate_limit::RateLimiter>,

    /// Configured API tokens (hashed)
    pub tokens: Arc<auth::ApiTokens>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build caches, HTTP client and job queue
    ///
    /// The returned receiver must be handed to [`jobs::spawn_worker`];
    /// until then queued jobs only accumulate.
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(
        config: config::AppConfig,
    ) -> Result<(Self, jobs::JobReceiver), error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        Self::with_repository(config, Arc::new(db))
    }

    /// Initialize application state around an existing record store
    pub fn with_repository(
        config: config::AppConfig,
        db: Arc<dyn data::PostRepository>,
    ) -> Result<(Self, jobs::JobReceiver), error::AppError> {
        let sync_marker = Arc::new(data::SyncMarker::new(config.sync.marker_ttl()));

        let http_client = reqwest::Client::builder()
            .user_agent("post-mirror/0.1.0")
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let sync = Arc::new(service::SyncService::new(
            db.clone(),
            sync_marker.clone(),
            http_client,
            config.source.url.clone(),
            config.source.timeout(),
        ));

        let (jobs, receiver) = jobs::channel();
        let rate_limiter = Arc::new(rate_limit::RateLimiter::from_config(&config.rate_limit));
        let tokens = Arc::new(auth::ApiTokens::from_config(&config.auth.tokens));
        if tokens.is_empty() {
            tracing::warn!("No API tokens configured; authenticated endpoints will reject all requests");
        }

        tracing::info!(
            source = %config.source.url,
            tokens = tokens.len(),
            "Application state initialized successfully"
        );

        Ok((
            Self {
                config: Arc::new(config),
                db,
                sync_marker,
                sync,
                jobs,
                rate_limiter,
                tokens,
            },
            receiver,
        ))
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower::ServiceBuilder;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    let metrics_routes = api::metrics_router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_auth,
    ));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route("/up", axum::routing::get(health_check))
        .merge(api::posts_router(state.clone()))
        .merge(metrics_routes)
        .fallback(not_found)
        .layer(middleware::from_fn(api::metrics::track_requests))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer),
        )
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if server.cors_allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(%error, origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound
}
