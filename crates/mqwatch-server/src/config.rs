//! Server configuration loading from file and environment variables.

use mqwatch_store::StoreConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Event buffer settings.
    #[serde(default)]
    pub store: StoreSettings,

    /// Ingestion adapter settings.
    #[serde(default)]
    pub ingest: IngestSettings,

    /// Query front-end settings.
    #[serde(default)]
    pub query: QuerySettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Event buffer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Number of messages kept in memory.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Maximum number of messages returned for one query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Number of pending query/clear/dump requests before callers are
    /// turned away.
    #[serde(default = "default_request_queue")]
    pub request_queue: usize,

    /// Number of pending ingested messages before the bus adapter waits.
    #[serde(default = "default_ingest_queue")]
    pub ingest_queue: usize,

    /// How long a request waits for the store, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Ingestion adapter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    /// Routing keys that are dropped before decoding.
    #[serde(default)]
    pub ignore_keys: Vec<String>,

    /// Header whose value is shown as the message class.
    #[serde(default = "default_class_header")]
    pub class_header: String,

    /// Whether message bodies are pretty-printed on the HTML page.
    #[serde(default)]
    pub indent_json: bool,
}

/// Query front-end configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySettings {
    /// Shortest non-empty query accepted (`*` is always accepted).
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "mqwatch_store=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    9090
}

fn default_capacity() -> usize {
    100_000
}

fn default_max_results() -> usize {
    1000
}

fn default_request_queue() -> usize {
    64
}

fn default_ingest_queue() -> usize {
    1024
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_class_header() -> String {
    "__ClassName__".to_string()
}

fn default_min_length() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_results: default_max_results(),
            request_queue: default_request_queue(),
            ingest_queue: default_ingest_queue(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl StoreSettings {
    /// Converts to the store's construction parameters.
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig {
            capacity: self.capacity,
            max_results: self.max_results,
            request_queue: self.request_queue,
            ingest_queue: self.ingest_queue,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            ignore_keys: Vec::new(),
            class_header: default_class_header(),
            indent_json: false,
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Checks values that deserialise fine but cannot run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let store = &self.store;
        if store.capacity == 0 {
            return Err(ConfigError::Invalid("store.capacity must be positive".into()));
        }
        if store.max_results == 0 {
            return Err(ConfigError::Invalid(
                "store.max_results must be positive".into(),
            ));
        }
        if store.request_queue == 0 || store.ingest_queue == 0 {
            return Err(ConfigError::Invalid(
                "store queue sizes must be positive".into(),
            ));
        }
        if store.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store.request_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `MQWATCH_HOST` overrides `server.host`
/// - `MQWATCH_PORT` overrides `server.port`
/// - `MQWATCH_BUFFER` overrides `store.capacity`
/// - `MQWATCH_MAX_RESULTS` overrides `store.max_results`
/// - `MQWATCH_LOG_LEVEL` overrides `logging.level`
/// - `MQWATCH_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if the resulting configuration fails [`Config::validate`].
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("MQWATCH_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("MQWATCH_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(capacity) = std::env::var("MQWATCH_BUFFER") {
        if let Ok(parsed) = capacity.parse() {
            config.store.capacity = parsed;
        }
    }
    if let Ok(max_results) = std::env::var("MQWATCH_MAX_RESULTS") {
        if let Ok(parsed) = max_results.parse() {
            config.store.max_results = parsed;
        }
    }
    if let Ok(level) = std::env::var("MQWATCH_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("MQWATCH_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    config.validate()?;
    Ok(config)
}
