//! post-mirror binary entry point

use std::net::SocketAddr;

use post_mirror::{AppState, config, jobs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the `[logging]` section
/// 3. Initialize AppState
/// 4. Start the job worker and maintenance tasks
/// 5. Build Axum router and serve
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging; RUST_LOG overrides logging.level
    init_tracing(&config.logging);
    tracing::info!("Starting post-mirror...");
    tracing::info!(
        database = %config.database.path.display(),
        source = %config.source.url,
        "Configuration loaded"
    );

    // 3. Initialize metrics
    post_mirror::metrics::init_metrics();

    // 4. Initialize application state
    let (state, receiver) = AppState::new(config.clone()).await?;

    // 5. Start background tasks
    jobs::spawn_worker(receiver, state.sync.clone());
    spawn_rate_limit_pruner(state.clone());

    // 6. Build Axum router
    let app = post_mirror::build_router(state);

    // 7. Start HTTP server
    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter_directives().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Spawn periodic cleanup of expired rate limit windows
fn spawn_rate_limit_pruner(state: AppState) {
    tokio::spawn(async move {
        let interval_secs = state.config.rate_limit.window_seconds.max(1);
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        // Consume the immediate first tick
        interval.tick().await;

        loop {
            interval.tick().await;
            state.rate_limiter.prune_old().await;
        }
    });

    tracing::info!("Rate limit pruner spawned");
}
