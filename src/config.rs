//! Configuration module for Dspace.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::storage::RetryPolicy;
use crate::{DspaceError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins (empty = any origin).
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Maximum request body size for uploads, in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// User acting on requests that carry no user header.
    #[serde(default = "default_user")]
    pub default_user: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_size() -> u64 {
    1024
}

fn default_user() -> String {
    "testuser".to_string()
}

/// Convert a size in megabytes to bytes, `None` when it does not fit a `usize`.
fn megabytes(mb: u64) -> Option<usize> {
    mb.checked_mul(1024 * 1024)
        .and_then(|bytes| usize::try_from(bytes).ok())
}

impl ServerConfig {
    /// Upload size limit in bytes.
    pub fn max_upload_size_bytes(&self) -> Result<usize> {
        megabytes(self.max_upload_size_mb).ok_or_else(|| {
            DspaceError::Config(format!(
                "server.max_upload_size_mb ({}) is too large",
                self.max_upload_size_mb
            ))
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            max_upload_size_mb: default_max_upload_size(),
            default_user: default_user(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/dspace.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Which platform implementation backs the chunk store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Discord REST API.
    #[default]
    Discord,
    /// Process-local memory (development and tests).
    Memory,
}

/// Remote chunk storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Platform implementation.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Bot token (overridable by `DSPACE_TOKEN`).
    #[serde(default)]
    pub token: String,
    /// REST API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Storage channel ids, in round-robin order.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Chunk size in megabytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_mb: u64,
    /// Largest attachment the platform accepts, in megabytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size_mb: u64,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
    /// Growth factor applied to the delay after each failure (1.0 = fixed).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound for the retry delay, in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Random extra delay added to each retry, in milliseconds.
    #[serde(default)]
    pub jitter_ms: u64,
    /// Attempts per chunk send/fetch (0 = retry forever).
    #[serde(default)]
    pub max_attempts: u32,
    /// Attempts for the platform login (0 = retry forever).
    #[serde(default)]
    pub login_max_attempts: u32,
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_chunk_size() -> u64 {
    8
}

fn default_max_chunk_size() -> u64 {
    24
}

fn default_request_timeout() -> u64 {
    50_000
}

fn default_backoff() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_backoff() -> u64 {
    60_000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            token: String::new(),
            api_base_url: default_api_base_url(),
            channels: vec![],
            chunk_size_mb: default_chunk_size(),
            max_chunk_size_mb: default_max_chunk_size(),
            request_timeout_ms: default_request_timeout(),
            backoff_ms: default_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff(),
            jitter_ms: 0,
            max_attempts: 0,
            login_max_attempts: 0,
        }
    }
}

impl StorageConfig {
    /// Chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> Result<usize> {
        megabytes(self.chunk_size_mb).ok_or_else(|| {
            DspaceError::Config(format!(
                "storage.chunk_size_mb ({}) is too large",
                self.chunk_size_mb
            ))
        })
    }

    /// Retry policy for chunk sends and fetches.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.base_policy().with_max_attempts(self.max_attempts)
    }

    /// Retry policy for the platform login.
    pub fn login_retry_policy(&self) -> RetryPolicy {
        self.base_policy()
            .with_max_attempts(self.login_max_attempts)
    }

    fn base_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(Duration::from_millis(self.backoff_ms))
            .with_multiplier(self.backoff_multiplier)
            .with_max_delay(Duration::from_millis(self.max_backoff_ms))
            .with_jitter(Duration::from_millis(self.jitter_ms))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/dspace.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Remote chunk storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DspaceError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| DspaceError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `DSPACE_TOKEN`: Override the platform bot token
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("DSPACE_TOKEN") {
            if !token.is_empty() {
                self.storage.token = token;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let storage = &self.storage;

        self.server.max_upload_size_bytes()?;
        storage.chunk_size_bytes()?;

        if storage.chunk_size_mb == 0 {
            return Err(DspaceError::Config(
                "storage.chunk_size_mb must be at least 1".to_string(),
            ));
        }
        if storage.chunk_size_mb > storage.max_chunk_size_mb {
            return Err(DspaceError::Config(format!(
                "storage.chunk_size_mb ({}) exceeds max_chunk_size_mb ({})",
                storage.chunk_size_mb, storage.max_chunk_size_mb
            )));
        }
        if storage.backoff_multiplier < 1.0 {
            return Err(DspaceError::Config(
                "storage.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }

        if storage.backend == StorageBackend::Discord {
            if storage.token.is_empty() {
                return Err(DspaceError::Config(
                    "storage.token is not set. \
                     Set it in config.toml or via DSPACE_TOKEN environment variable."
                        .to_string(),
                ));
            }
            if storage.channels.is_empty() {
                return Err(DspaceError::Config(
                    "storage.channels must list at least one channel".to_string(),
                ));
            }
        }

        Ok(())
    }
}
