// SPDX-License-Identifier: MIT OR Apache-2.0
//! Server configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use dissociation_engine::{PgStoreConfig, MAX_RESULTS};

use crate::error::{Result, ServerError};
use crate::metrics::MetricsConfig;

// Environment variable names for configuration.

/// Bind address environment variable.
pub const ENV_BIND_ADDR: &str = "DISSOCIATE_BIND_ADDR";
/// Database URL environment variable.
pub const ENV_DB_URL: &str = "DB_URL";
/// Fallback database URL environment variable.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// JSON corpus path environment variable.
pub const ENV_CORPUS_PATH: &str = "DISSOCIATE_CORPUS_PATH";
/// Database schema environment variable.
pub const ENV_DB_SCHEMA: &str = "DISSOCIATE_DB_SCHEMA";
/// Database pool size environment variable.
pub const ENV_DB_MAX_CONNECTIONS: &str = "DISSOCIATE_DB_MAX_CONNECTIONS";
/// Database acquire timeout seconds environment variable.
pub const ENV_DB_ACQUIRE_TIMEOUT_SECS: &str = "DISSOCIATE_DB_ACQUIRE_TIMEOUT_SECS";
/// Result cap environment variable.
pub const ENV_RESULT_CAP: &str = "DISSOCIATE_RESULT_CAP";
/// Static image path environment variable.
pub const ENV_IMAGE_PATH: &str = "DISSOCIATE_IMAGE_PATH";
/// Request timeout seconds environment variable.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "DISSOCIATE_REQUEST_TIMEOUT_SECS";
/// Maximum request body size environment variable.
pub const ENV_MAX_BODY_SIZE: &str = "DISSOCIATE_MAX_BODY_SIZE";
/// Shutdown grace period seconds environment variable.
pub const ENV_SHUTDOWN_GRACE_PERIOD_SECS: &str = "DISSOCIATE_SHUTDOWN_GRACE_PERIOD_SECS";
/// Enable metrics export environment variable.
pub const ENV_METRICS_ENABLED: &str = "DISSOCIATE_METRICS_ENABLED";
/// OTLP endpoint environment variable.
pub const ENV_OTLP_ENDPOINT: &str = "DISSOCIATE_OTLP_ENDPOINT";

/// Reported when no store source is configured.
pub const MISSING_STORE_MESSAGE: &str = "Missing DB_URL or DATABASE_URL environment variable.";

/// Default maximum request body size (1MB). Every route is a GET.
const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Environment variable parsing helpers.
mod env_parse {
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{Result, ServerError};

    /// Read a variable, treating an empty value as unset.
    pub fn non_empty(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|val| !val.trim().is_empty())
    }

    /// Parse a socket address from an environment variable.
    pub fn parse_socket_addr(key: &str) -> Option<Result<SocketAddr>> {
        non_empty(key).map(|val| {
            val.parse()
                .map_err(|e| ServerError::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Parse a usize from an environment variable.
    pub fn parse_usize(key: &str) -> Option<Result<usize>> {
        non_empty(key).map(|val| {
            val.parse()
                .map_err(|e| ServerError::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Parse a u32 from an environment variable.
    pub fn parse_u32(key: &str) -> Option<Result<u32>> {
        non_empty(key).map(|val| {
            val.parse()
                .map_err(|e| ServerError::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Parse a boolean from an environment variable.
    /// Accepts "true", "1", "yes", "on" as true (case-insensitive).
    /// Accepts "false", "0", "no", "off" as false (case-insensitive).
    pub fn parse_bool(key: &str) -> Option<Result<bool>> {
        non_empty(key).map(|val| match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ServerError::Config(format!(
                "invalid {key}: expected boolean (true/false/1/0/yes/no/on/off)"
            ))),
        })
    }

    /// Parse a duration in seconds from an environment variable.
    pub fn parse_duration_secs(key: &str) -> Option<Result<Duration>> {
        non_empty(key).map(|val| {
            val.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ServerError::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Parse a path from an environment variable.
    pub fn parse_path(key: &str) -> Option<PathBuf> {
        non_empty(key).map(PathBuf::from)
    }
}

/// Where the study corpus is read from.
#[derive(Debug, Clone)]
pub enum StoreSource {
    /// A PostgreSQL/PostGIS database.
    Postgres(PgStoreConfig),
    /// A JSON corpus file loaded into memory.
    Corpus(PathBuf),
}

impl StoreSource {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Corpus(_) => "corpus",
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
    /// Study corpus source. Required to serve.
    pub store: Option<StoreSource>,
    /// Maximum study ids per result direction.
    pub result_cap: usize,
    /// GIF served at `/img` (optional).
    pub image_path: Option<PathBuf>,
    /// Request timeout (None = unlimited).
    pub request_timeout: Option<Duration>,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// How long in-flight requests may run after a shutdown signal.
    pub shutdown_grace_period: Duration,
    /// Metrics configuration (optional).
    pub metrics: Option<MetricsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            store: None,
            result_cap: MAX_RESULTS,
            image_path: None,
            request_timeout: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            shutdown_grace_period: Duration::from_secs(5),
            metrics: None,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Unset or empty variables use defaults. Invalid values return an error.
    ///
    /// # Supported Environment Variables
    ///
    /// - `DISSOCIATE_BIND_ADDR` - Server bind address (e.g., "0.0.0.0:8000")
    /// - `DB_URL` - PostgreSQL connection URL
    /// - `DATABASE_URL` - Used when `DB_URL` is unset
    /// - `DISSOCIATE_CORPUS_PATH` - JSON corpus, used when no database URL is set
    /// - `DISSOCIATE_DB_SCHEMA` - Schema holding the corpus tables (default "ns")
    /// - `DISSOCIATE_DB_MAX_CONNECTIONS` - Pool size
    /// - `DISSOCIATE_DB_ACQUIRE_TIMEOUT_SECS` - Pool acquire timeout
    /// - `DISSOCIATE_RESULT_CAP` - Maximum study ids per direction (1 to 250)
    /// - `DISSOCIATE_IMAGE_PATH` - GIF served at `/img`
    /// - `DISSOCIATE_REQUEST_TIMEOUT_SECS` - Request timeout in seconds
    /// - `DISSOCIATE_MAX_BODY_SIZE` - Maximum request body size in bytes
    /// - `DISSOCIATE_SHUTDOWN_GRACE_PERIOD_SECS` - Shutdown grace period
    /// - `DISSOCIATE_METRICS_ENABLED` - Export metrics over OTLP (true/false)
    /// - `DISSOCIATE_OTLP_ENDPOINT` - OTLP collector endpoint
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Core server settings
        if let Some(result) = env_parse::parse_socket_addr(ENV_BIND_ADDR) {
            config.bind_addr = result?;
        }
        if let Some(result) = env_parse::parse_usize(ENV_RESULT_CAP) {
            config.result_cap = result?;
        }
        config.image_path = env_parse::parse_path(ENV_IMAGE_PATH);
        if let Some(result) = env_parse::parse_duration_secs(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = Some(result?);
        }
        if let Some(result) = env_parse::parse_usize(ENV_MAX_BODY_SIZE) {
            config.max_body_size = result?;
        }
        if let Some(result) = env_parse::parse_duration_secs(ENV_SHUTDOWN_GRACE_PERIOD_SECS) {
            config.shutdown_grace_period = result?;
        }

        // Store source (database preferred over corpus file)
        let db_url =
            env_parse::non_empty(ENV_DB_URL).or_else(|| env_parse::non_empty(ENV_DATABASE_URL));
        if let Some(url) = db_url {
            let mut pg = PgStoreConfig::new(url);
            if let Some(schema) = env_parse::non_empty(ENV_DB_SCHEMA) {
                pg = pg.with_schema(schema);
            }
            if let Some(result) = env_parse::parse_u32(ENV_DB_MAX_CONNECTIONS) {
                pg = pg.with_max_connections(result?);
            }
            if let Some(result) = env_parse::parse_duration_secs(ENV_DB_ACQUIRE_TIMEOUT_SECS) {
                pg = pg.with_acquire_timeout(result?);
            }
            config.store = Some(StoreSource::Postgres(pg));
        } else if let Some(path) = env_parse::parse_path(ENV_CORPUS_PATH) {
            config.store = Some(StoreSource::Corpus(path));
        }

        // Metrics configuration
        let has_metrics = std::env::var(ENV_METRICS_ENABLED).is_ok()
            || std::env::var(ENV_OTLP_ENDPOINT).is_ok();

        if has_metrics {
            let mut metrics = MetricsConfig::default();
            if let Some(result) = env_parse::parse_bool(ENV_METRICS_ENABLED) {
                metrics.enabled = result?;
            }
            if let Some(endpoint) = env_parse::non_empty(ENV_OTLP_ENDPOINT) {
                metrics.otlp_endpoint = endpoint;
            }
            config.metrics = Some(metrics);
        }

        Ok(config)
    }

    /// Set the bind address.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the store source.
    #[must_use]
    pub fn with_store(mut self, store: StoreSource) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the maximum study ids per result direction.
    #[must_use]
    pub fn with_result_cap(mut self, cap: usize) -> Self {
        self.result_cap = cap;
        self
    }

    /// Set the GIF served at `/img`.
    #[must_use]
    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the maximum request body size.
    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace_period(mut self, period: Duration) -> Self {
        self.shutdown_grace_period = period;
        self
    }

    /// Set metrics configuration.
    #[must_use]
    pub fn with_metrics(mut self, config: MetricsConfig) -> Self {
        self.metrics = Some(config);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match &self.store {
            None => return Err(ServerError::Config(MISSING_STORE_MESSAGE.to_string())),
            Some(StoreSource::Postgres(pg)) => pg.validate()?,
            Some(StoreSource::Corpus(_)) => {},
        }
        if self.result_cap == 0 || self.result_cap > MAX_RESULTS {
            return Err(ServerError::Config(format!(
                "result_cap must be between 1 and {MAX_RESULTS}"
            )));
        }
        if self.max_body_size == 0 {
            return Err(ServerError::Config(
                "max_body_size must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ServerError::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
