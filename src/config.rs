//! Configuration management for DSpace Uploader
//!
//! Server, collection, holding-area, client and worker settings come from a
//! TOML file (written with defaults on first run) and the environment.
//! Precedence is defaults < config file < environment < command-line flags;
//! the last step is applied by the command handlers.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::items::HoldingAreas;
use crate::app::{ClientConfig, ConfigPresets, WorkerConfig};
use crate::constants::{dspace, env as env_constants, http, limits, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server and holding-area settings
    pub dspace: DspaceConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Bulk dispatcher settings
    pub workers: WorkerConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DspaceConfigToml {
    /// DSpace server root (without `/server/api`)
    pub url: String,
    /// Owning collection for new workspace items
    pub collection_uuid: Option<String>,
    /// Where failed items are moved (disabled when unset)
    pub error_dir: Option<PathBuf>,
    /// Where submitted ingest files are moved (disabled when unset)
    pub archive_dir: Option<PathBuf>,
}

impl Default for DspaceConfigToml {
    fn default() -> Self {
        Self {
            url: dspace::DEFAULT_URL.to_string(),
            collection_uuid: None,
            error_dir: None,
            archive_dir: None,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive timeout in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Rate limit per session (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: Some(30),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// TOML-friendly worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfigToml {
    /// Number of concurrent workers (each with its own session)
    pub worker_count: usize,
    /// Attempts per item folder
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Channel buffer size for progress reporting
    pub progress_buffer_size: usize,
}

impl Default for WorkerConfigToml {
    fn default() -> Self {
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            max_attempts: workers::DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: workers::RETRY_DELAY.as_millis() as u64,
            progress_buffer_size: workers::CHANNEL_BUFFER_SIZE,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the file (if any) and the environment
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let config_path = match config_file_override {
            Some(ref path) => Some(path.clone()),
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(ConfigError::NotFound { path });
            }
        }

        config.apply_env_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment values; empty values are ignored
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(env_constants::DSPACE_URL) {
            self.dspace.url = url;
        }
        if let Some(uuid) = get(env_constants::COLLECTION_UUID) {
            self.dspace.collection_uuid = Some(uuid);
        }
        if let Some(dir) = get(env_constants::ERROR_DIR) {
            self.dspace.error_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get(env_constants::ARCHIVE_DIR) {
            self.dspace.archive_dir = Some(PathBuf::from(dir));
        }
    }

    /// Check values that would only fail later, deep inside a batch
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.dspace.url.starts_with("http://") || self.dspace.url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "dspace.url".to_string(),
                value: self.dspace.url.clone(),
                reason: "Expected an http:// or https:// URL".to_string(),
            });
        }
        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Collection to submit into, required by upload and ingest
    pub fn require_collection(&self) -> ConfigResult<&str> {
        self.dspace
            .collection_uuid
            .as_deref()
            .filter(|uuid| !uuid.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: format!(
                    "dspace.collection_uuid (or {} / --collection)",
                    env_constants::COLLECTION_UUID
                ),
            })
    }

    pub fn client_config(&self) -> ClientConfig {
        self.client.to_runtime_config(&self.dspace.url)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        self.workers.to_runtime_config()
    }

    /// Worker settings for loose-file ingest
    ///
    /// `[workers]` values still at their generic defaults take the ingest
    /// preset instead; anything set in the file wins.
    pub fn ingest_worker_config(&self) -> WorkerConfig {
        let defaults = WorkerConfigToml::default();
        let preset = ConfigPresets::ingest();
        let mut config = self.workers.to_runtime_config();

        if self.workers.worker_count == defaults.worker_count {
            config.worker_count = preset.worker_count;
        }
        if self.workers.max_attempts == defaults.max_attempts {
            config.max_attempts = preset.max_attempts;
        }
        config
    }

    pub fn holding_areas(&self) -> HoldingAreas {
        HoldingAreas::new(self.dspace.error_dir.clone(), self.dspace.archive_dir.clone())
    }

    /// Initialize configuration on first run
    ///
    /// Creates a default config file if none exists and notifies the user
    pub async fn initialize_first_run() -> ConfigResult<Option<PathBuf>> {
        let Some(config_path) = Self::get_default_config_path() else {
            return Ok(None);
        };

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&config_path, Self::generate_default_config_content()).await?;

        println!("Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   Set collection_uuid there or pass --collection.");
        println!();

        Ok(Some(config_path))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from("./dspace-uploader.toml")];
        search_paths.extend(Self::get_default_config_path());

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        debug!("No config file found in standard locations");
        None
    }

    /// Get the default config file path for the current user
    fn get_default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dspace-uploader").join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# DSpace Uploader Configuration
# This file was automatically generated on first run.
# Environment variables (DSPACE_URL, COLLECTION_UUID, DSPACE_ERROR_DIR,
# DSPACE_ARCHIVE_DIR) override these values; command-line flags override both.

[dspace]
url = "{}"
# collection_uuid = "00000000-0000-0000-0000-000000000000"
# error_dir = "/path/to/error"
# archive_dir = "/path/to/archive"

[client]
tcp_keepalive_secs = 30
tcp_nodelay = true
pool_idle_timeout_secs = {}
pool_max_per_host = {}
request_timeout_secs = {}
connect_timeout_secs = {}
rate_limit_rps = {}

[workers]
worker_count = {}
max_attempts = {}
retry_delay_ms = {}
progress_buffer_size = {}

[logging]
level = "warn"  # error, warn, info, debug, trace
"#,
            dspace::DEFAULT_URL,
            http::POOL_IDLE_TIMEOUT.as_secs(),
            http::POOL_MAX_PER_HOST,
            http::DEFAULT_TIMEOUT.as_secs(),
            http::CONNECT_TIMEOUT.as_secs(),
            limits::DEFAULT_RATE_LIMIT_RPS,
            workers::DEFAULT_WORKER_COUNT,
            workers::DEFAULT_MAX_ATTEMPTS,
            workers::RETRY_DELAY.as_millis(),
            workers::CHANNEL_BUFFER_SIZE,
        )
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self, base_url: &str) -> ClientConfig {
        ClientConfig {
            base_url: base_url.to_string(),
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rate_limit_rps: self.rate_limit_rps,
        }
    }
}

impl WorkerConfigToml {
    /// Convert to runtime WorkerConfig
    pub fn to_runtime_config(&self) -> WorkerConfig {
        WorkerConfig {
            worker_count: self.worker_count,
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            progress_buffer_size: self.progress_buffer_size,
            ..WorkerConfig::default()
        }
    }
}
