//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Once;
use std::time::Duration;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("post_mirror_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "post_mirror_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Sync Metrics
    pub static ref SYNC_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("post_mirror_sync_runs_total", "Total number of upstream sync runs"),
        &["status"]
    ).expect("metric can be created");
    pub static ref SYNC_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "post_mirror_sync_duration_seconds",
            "Upstream sync duration in seconds"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["status"]
    ).expect("metric can be created");
    pub static ref POSTS_UPSERTED_TOTAL: prometheus::IntCounter = prometheus::IntCounter::new(
        "post_mirror_posts_upserted_total",
        "Total number of post records upserted from upstream"
    ).expect("metric can be created");

    // Job Metrics
    pub static ref JOBS_DISPATCHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("post_mirror_jobs_dispatched_total", "Job dispatch attempts by outcome"),
        &["job", "outcome"]
    ).expect("metric can be created");
    pub static ref JOBS_PROCESSED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("post_mirror_jobs_processed_total", "Jobs processed by the worker"),
        &["job", "status"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("post_mirror_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("post_mirror_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");

    // Application Metrics
    pub static ref POSTS_TOTAL: IntGauge = IntGauge::new(
        "post_mirror_posts_total",
        "Number of posts in the local mirror"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("post_mirror_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static REGISTER: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    REGISTER.call_once(register_all);
}

fn register_all() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(SYNC_RUNS_TOTAL.clone()))
        .expect("SYNC_RUNS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SYNC_DURATION_SECONDS.clone()))
        .expect("SYNC_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(POSTS_UPSERTED_TOTAL.clone()))
        .expect("POSTS_UPSERTED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(JOBS_DISPATCHED_TOTAL.clone()))
        .expect("JOBS_DISPATCHED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(JOBS_PROCESSED_TOTAL.clone()))
        .expect("JOBS_PROCESSED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_HITS_TOTAL.clone()))
        .expect("CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .expect("CACHE_MISSES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(POSTS_TOTAL.clone()))
        .expect("POSTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record the outcome of one upstream sync run.
pub fn observe_sync(status: &str, elapsed: Duration) {
    SYNC_RUNS_TOTAL.with_label_values(&[status]).inc();
    SYNC_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(elapsed.as_secs_f64());
}
