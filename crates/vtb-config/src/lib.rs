// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and overrides for the vector tool bridge.
//!
//! [`BridgeConfig`] is resolved once at process start: an optional TOML
//! file, then environment variables, then command-line [`ConfigOverrides`].
//! [`validate_config`] separates hard errors from advisory
//! [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// An environment variable held a value of the wrong type.
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv {
        /// Variable name.
        var: String,
        /// Offending value.
        value: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// The backend request timeout is unusually large.
    LargeTimeout {
        /// Timeout value in seconds.
        secs: u64,
    },
    /// The connection pool is unusually large.
    LargePool {
        /// Configured pool size.
        size: usize,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { secs } => {
                write!(f, "backend timeout is large ({secs}s)")
            }
            ConfigWarning::LargePool { size } => {
                write!(f, "connection pool of {size} may overwhelm the backend")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Vector store connection.
    pub backend: BackendSettings,
    /// Listening socket and protocol identity.
    pub server: ServerSettings,
    /// Request ceilings enforced before any backend call.
    pub limits: LimitSettings,
    /// Values used when a tool argument is omitted.
    pub defaults: DefaultSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

/// Vector store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the Qdrant REST API.
    pub url: String,
    /// API key sent as `api-key` when the caller supplies no token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum concurrent backend requests.
    pub pool_size: usize,
    /// Timeout of the liveness round trip in seconds.
    pub health_timeout_secs: u64,
    /// Retry schedule for idempotent reads.
    pub retry: RetrySettings,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: "http://qdrant-unity:6333".into(),
            api_key: None,
            timeout_secs: 30,
            connect_timeout_secs: 5,
            pool_size: 16,
            health_timeout_secs: 5,
            retry: RetrySettings::default(),
        }
    }
}

impl BackendSettings {
    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// TCP connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Liveness probe timeout.
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

/// Exponential backoff schedule for idempotent reads.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

/// Listening socket and protocol identity.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSettings {
    /// Server name reported in `initialize` and `/`.
    pub name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Interval between SSE keep-alive comments, in seconds.
    pub sse_keepalive_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "qdrant-admin".into(),
            host: "0.0.0.0".into(),
            port: 8080,
            sse_keepalive_secs: 15,
        }
    }
}

impl ServerSettings {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Request ceilings.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct LimitSettings {
    /// Largest `limit` accepted by search and recommend tools.
    pub max_search_limit: u64,
    /// Largest `limit` accepted by the scroll tool.
    pub max_scroll_limit: u64,
    /// Largest number of queries in one batch search.
    pub max_batch_queries: u64,
    /// Largest number of points in one upsert.
    pub max_upsert_points: u64,
    /// Largest number of ids in one get or delete.
    pub max_ids: u64,
    /// Longest time the optimize tool waits for a green status, in seconds.
    pub optimize_wait_secs: u64,
    /// Poll interval while waiting for optimization, in seconds.
    pub optimize_poll_secs: u64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_search_limit: 100,
            max_scroll_limit: 1_000,
            max_batch_queries: 16,
            max_upsert_points: 1_000,
            max_ids: 1_000,
            optimize_wait_secs: 60,
            optimize_poll_secs: 2,
        }
    }
}

/// Values used when tool arguments are omitted.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultSettings {
    /// Logical collection used when a non-destructive tool gets none.
    pub collection: String,
    /// Isolation scope applied when a tool gets none. Empty means unscoped.
    pub scope: String,
    /// Dense vector space name.
    pub vector_name: String,
    /// Sparse vector space name.
    pub sparse_vector_name: String,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            collection: "unity_project_kb".into(),
            scope: String::new(),
            vector_name: "text-dense".into(),
            sparse_vector_name: "text-sparse".into(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed backend timeout in seconds.
const MAX_TIMEOUT_SECS: u64 = 3_600;

/// Threshold above which a timeout generates a warning.
const LARGE_TIMEOUT_THRESHOLD: u64 = 300;

/// Threshold above which a pool size generates a warning.
const LARGE_POOL_THRESHOLD: usize = 256;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`BridgeConfig`] from an optional TOML file path and the process
/// environment.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Like [`load_config`] but reads variables through `lookup`.
pub fn load_config_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<BridgeConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => BridgeConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    Ok(config)
}

/// Parse a TOML string into a [`BridgeConfig`].
pub fn parse_toml(content: &str) -> Result<BridgeConfig, ConfigError> {
    toml::from_str::<BridgeConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

fn parse_env<T: std::str::FromStr>(var: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv {
            var: var.into(),
            value,
        })
}

/// Apply environment variable overrides read through `lookup`.
///
/// Recognised variables:
/// - `QDRANT_URL`, `QDRANT_API_KEY`, `QDRANT_TIMEOUT`, `QDRANT_POOL_SIZE`
/// - `MCP_SERVER_NAME`, `MCP_SERVER_HOST`, `MCP_SERVER_PORT`, `MCP_LOG_LEVEL`
/// - `DEFAULT_COLLECTION`, `VTB_DEFAULT_SCOPE`
/// - `DEBUG` (`true` forces the `debug` log level)
///
/// An empty `QDRANT_API_KEY` clears the key.
pub fn apply_env_overrides(
    config: &mut BridgeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(val) = lookup("QDRANT_URL") {
        config.backend.url = val;
    }
    if let Some(val) = lookup("QDRANT_API_KEY") {
        config.backend.api_key = if val.is_empty() { None } else { Some(val) };
    }
    if let Some(val) = lookup("QDRANT_TIMEOUT") {
        config.backend.timeout_secs = parse_env("QDRANT_TIMEOUT", val)?;
    }
    if let Some(val) = lookup("QDRANT_POOL_SIZE") {
        config.backend.pool_size = parse_env("QDRANT_POOL_SIZE", val)?;
    }
    if let Some(val) = lookup("MCP_SERVER_NAME") {
        config.server.name = val;
    }
    if let Some(val) = lookup("MCP_SERVER_HOST") {
        config.server.host = val;
    }
    if let Some(val) = lookup("MCP_SERVER_PORT") {
        config.server.port = parse_env("MCP_SERVER_PORT", val)?;
    }
    if let Some(val) = lookup("MCP_LOG_LEVEL") {
        config.logging.level = val.to_lowercase();
    }
    if let Some(val) = lookup("DEFAULT_COLLECTION") {
        config.defaults.collection = val;
    }
    if let Some(val) = lookup("VTB_DEFAULT_SCOPE") {
        config.defaults.scope = val;
    }
    if let Some(val) = lookup("DEBUG")
        && val.eq_ignore_ascii_case("true")
    {
        config.logging.level = "debug".into();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command-line overrides
// ---------------------------------------------------------------------------

/// Values supplied on the command line. `None` leaves the setting alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Backend base URL.
    pub backend_url: Option<String>,
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
    /// Log level.
    pub log_level: Option<String>,
    /// Log format.
    pub log_format: Option<LogFormat>,
}

/// Apply `overrides` on top of `base`. Overrides win.
pub fn merge_overrides(mut base: BridgeConfig, overrides: ConfigOverrides) -> BridgeConfig {
    if let Some(url) = overrides.backend_url {
        base.backend.url = url;
    }
    if let Some(host) = overrides.host {
        base.server.host = host;
    }
    if let Some(port) = overrides.port {
        base.server.port = port;
    }
    if let Some(level) = overrides.log_level {
        base.logging.level = level;
    }
    if let Some(format) = overrides.log_format {
        base.logging.format = format;
    }
    base
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a resolved configuration, returning advisory warnings.
pub fn validate_config(config: &BridgeConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    let level = config.logging.level.as_str();
    if !VALID_LOG_LEVELS.contains(&level) {
        errors.push(format!("invalid log level '{level}'"));
    }

    let backend = &config.backend;
    if !(backend.url.starts_with("http://") || backend.url.starts_with("https://")) {
        errors.push(format!(
            "backend url '{}' must start with http:// or https://",
            backend.url
        ));
    }
    if backend.timeout_secs == 0 || backend.timeout_secs > MAX_TIMEOUT_SECS {
        errors.push(format!(
            "backend timeout {}s out of range (1..{MAX_TIMEOUT_SECS})",
            backend.timeout_secs
        ));
    } else if backend.timeout_secs > LARGE_TIMEOUT_THRESHOLD {
        warnings.push(ConfigWarning::LargeTimeout {
            secs: backend.timeout_secs,
        });
    }
    if backend.health_timeout_secs == 0 {
        errors.push("health timeout must be at least 1s".into());
    }
    if backend.pool_size == 0 {
        errors.push("pool_size must be at least 1".into());
    } else if backend.pool_size > LARGE_POOL_THRESHOLD {
        warnings.push(ConfigWarning::LargePool {
            size: backend.pool_size,
        });
    }
    if backend.retry.max_attempts == 0 {
        errors.push("retry.max_attempts must be at least 1".into());
    }
    if backend.retry.base_delay_ms > backend.retry.max_delay_ms {
        errors.push("retry.base_delay_ms must not exceed retry.max_delay_ms".into());
    }

    let limits = &config.limits;
    for (name, value) in [
        ("max_search_limit", limits.max_search_limit),
        ("max_scroll_limit", limits.max_scroll_limit),
        ("max_batch_queries", limits.max_batch_queries),
        ("max_upsert_points", limits.max_upsert_points),
        ("max_ids", limits.max_ids),
        ("optimize_poll_secs", limits.optimize_poll_secs),
    ] {
        if value == 0 {
            errors.push(format!("limits.{name} must be at least 1"));
        }
    }

    if config.defaults.collection.trim().is_empty() {
        errors.push("defaults.collection must not be empty".into());
    }
    if config.defaults.vector_name.trim().is_empty() {
        errors.push("defaults.vector_name must not be empty".into());
    }
    if config.server.name.trim().is_empty() {
        errors.push("server.name must not be empty".into());
    }

    if backend.api_key.is_none() && backend.url.starts_with("https://") {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "backend.api_key".into(),
            hint: "remote backends usually require an API key".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

impl BridgeConfig {
    /// Copy with secrets masked, for logging.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.backend.api_key.is_some() {
            copy.backend.api_key = Some("***".into());
        }
        copy
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
