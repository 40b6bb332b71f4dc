//! Common test utilities for E2E tests

pub mod schema_validator;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use post_mirror::data::{PostRepository, SourcePost};
use post_mirror::jobs::JobReceiver;
use post_mirror::{AppState, config};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Bearer token accepted by every test server
pub const TEST_TOKEN: &str = "test-token-0123456789";
pub const TEST_USER_ID: u64 = 1;

// =============================================================================
// Upstream stub
// =============================================================================

#[derive(Clone)]
struct UpstreamState {
    response: Arc<Mutex<(StatusCode, String)>>,
    delay: Arc<Mutex<Duration>>,
    hits: Arc<AtomicUsize>,
}

/// Stand-in for the upstream post feed
pub struct Upstream {
    pub url: String,
    state: UpstreamState,
}

impl Upstream {
    /// Start serving `sample_feed(12)` on a random port
    pub async fn start() -> Self {
        let state = UpstreamState {
            response: Arc::new(Mutex::new((StatusCode::OK, sample_feed(12).to_string()))),
            delay: Arc::new(Mutex::new(Duration::ZERO)),
            hits: Arc::new(AtomicUsize::new(0)),
        };

        let app = axum::Router::new()
            .route("/posts", axum::routing::get(serve_feed))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/posts", addr),
            state,
        }
    }

    pub fn respond_with(&self, status: u16, body: impl Into<String>) {
        *self.state.response.lock().unwrap() =
            (StatusCode::from_u16(status).unwrap(), body.into());
    }

    pub fn delay_by(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

async fn serve_feed(State(state): State<UpstreamState>) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let delay = *state.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let (status, body) = state.response.lock().unwrap().clone();
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body,
    )
}

/// Upstream-shaped JSON array with ids `1..=count`
pub fn sample_feed(count: i64) -> serde_json::Value {
    let posts: Vec<_> = (1..=count)
        .map(|id| {
            json!({
                "userId": 1,
                "id": id,
                "title": format!("title {id}"),
                "body": format!("body {id}"),
            })
        })
        .collect();
    serde_json::Value::Array(posts)
}

// =============================================================================
// Test server
// =============================================================================

/// Knobs for a test server instance
pub struct TestOptions {
    /// Run the background job worker
    pub spawn_worker: bool,
    pub max_requests: u32,
    pub source_timeout_seconds: u64,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            spawn_worker: true,
            max_requests: 1000,
            source_timeout_seconds: 10,
        }
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub upstream: Upstream,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
    receiver: Mutex<Option<JobReceiver>>,
}

impl TestServer {
    /// Server with a running job worker
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    /// Server whose queued jobs stay in the queue for inspection
    pub async fn without_worker() -> Self {
        Self::with_options(TestOptions {
            spawn_worker: false,
            ..TestOptions::default()
        })
        .await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        post_mirror::metrics::init_metrics();
        let upstream = Upstream::start().await;

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_allowed_origins: Vec::new(),
            },
            database: config::DatabaseConfig { path: db_path },
            source: config::SourceConfig {
                url: upstream.url.clone(),
                timeout_seconds: options.source_timeout_seconds,
            },
            sync: config::SyncConfig {
                marker_ttl_seconds: 3600,
            },
            api: config::ApiConfig { page_size: 10 },
            rate_limit: config::RateLimitConfig {
                max_requests: options.max_requests,
                window_seconds: 60,
                max_tracked_keys: 10_000,
            },
            auth: config::AuthConfig {
                tokens: vec![config::ApiTokenConfig {
                    token: TEST_TOKEN.to_string(),
                    user_id: TEST_USER_ID,
                    name: "Test User".to_string(),
                }],
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let (state, receiver) = AppState::new(config).await.unwrap();
        let receiver = if options.spawn_worker {
            post_mirror::jobs::spawn_worker(receiver, state.sync.clone());
            None
        } else {
            Some(receiver)
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = post_mirror::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            upstream,
            _temp_dir: temp_dir,
            client,
            receiver: Mutex::new(receiver),
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post_authenticated(&self, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(TEST_TOKEN)
            .send()
            .await
            .unwrap()
    }

    /// Drain the job queue, returning how many jobs were waiting
    ///
    /// Drained jobs are marked complete, so later dispatches are accepted.
    /// Only available on servers built without a worker.
    pub fn take_queued_jobs(&self) -> usize {
        let mut guard = self.receiver.lock().unwrap();
        let receiver = guard
            .as_mut()
            .expect("take_queued_jobs requires TestServer::without_worker");

        let mut taken = 0;
        while let Some(job) = receiver.try_recv() {
            receiver.complete(job);
            taken += 1;
        }
        taken
    }

    /// Insert posts with external ids `1..=count` directly into the store
    pub async fn seed_posts(&self, count: i64) {
        let records: Vec<SourcePost> = (1..=count)
            .map(|id| SourcePost::new(id, format!("seeded {id}"), format!("seeded body {id}")))
            .collect();
        self.state.db.upsert_many(&records).await.unwrap();
    }

    /// Poll the store until it holds `expected` posts
    pub async fn wait_for_posts(&self, expected: i64) {
        for _ in 0..100 {
            if self.state.db.count().await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("store never reached {expected} posts");
    }
}
