//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub sync: SyncConfig,
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Origins allowed for CORS; empty means permissive
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Upstream post feed
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Full URL of the posts collection
    pub url: String,
    /// Request timeout in seconds (default: 10)
    pub timeout_seconds: u64,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Sync marker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// How long a completed sync suppresses new ones (default: 3600)
    pub marker_ttl_seconds: u64,
}

impl SyncConfig {
    pub fn marker_ttl(&self) -> Duration {
        Duration::from_secs(self.marker_ttl_seconds)
    }
}

/// Listing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Posts per page (default: 10)
    pub page_size: u32,
}

/// Request throttling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window (default: 60)
    pub max_requests: u32,
    /// Window length in seconds (default: 60)
    pub window_seconds: u64,
    /// Upper bound on tracked keys kept in memory
    pub max_tracked_keys: usize,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// API token configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<ApiTokenConfig>,
}

/// A single bearer token and the user it authenticates
#[derive(Debug, Clone, Deserialize)]
pub struct ApiTokenConfig {
    pub token: String,
    pub user_id: u64,
    pub name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Default `EnvFilter` directives when `RUST_LOG` is unset
    pub fn filter_directives(&self) -> String {
        let level = self.level.trim().to_ascii_lowercase();
        format!("post_mirror={level},tower_http={level}")
    }

    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (POSTMIRROR__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/posts.db")?
            .set_default("source.url", "https://jsonplaceholder.typicode.com/posts")?
            .set_default("source.timeout_seconds", 10)?
            .set_default("sync.marker_ttl_seconds", 3600)?
            .set_default("api.page_size", 10)?
            .set_default("rate_limit.max_requests", 60)?
            .set_default("rate_limit.window_seconds", 60)?
            .set_default("rate_limit.max_tracked_keys", 10000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("POSTMIRROR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        let source_url = url::Url::parse(&self.source.url)
            .map_err(|e| AppError::Config(format!("source.url is not a valid URL: {e}")))?;
        if !matches!(source_url.scheme(), "http" | "https") {
            return Err(AppError::Config(
                "source.url must use http or https".to_string(),
            ));
        }

        if self.source.timeout_seconds == 0 {
            return Err(AppError::Config(
                "source.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.sync.marker_ttl_seconds == 0 {
            return Err(AppError::Config(
                "sync.marker_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.api.page_size == 0 {
            return Err(AppError::Config(
                "api.page_size must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window_seconds == 0 {
            return Err(AppError::Config(
                "rate_limit.max_requests and rate_limit.window_seconds must be greater than 0"
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.auth.tokens {
            if entry.token.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "auth.tokens entry for user {} has an empty token",
                    entry.user_id
                )));
            }
            if !seen.insert(entry.token.as_str()) {
                return Err(AppError::Config(format!(
                    "auth.tokens contains a duplicate token (user {})",
                    entry.user_id
                )));
            }
        }

        let level = self.logging.level.trim().to_ascii_lowercase();
        if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            return Err(AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {:?})",
                self.logging.level
            )));
        }

        let format = self.logging.format.trim().to_ascii_lowercase();
        if !matches!(format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\" (got {:?})",
                self.logging.format
            )));
        }

        Ok(())
    }
}
