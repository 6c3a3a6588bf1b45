//! Configuration module for xCloud.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{XcloudError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage root directory. Every virtual folder lives underneath it.
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Directory holding service-owned state (the public link document).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// File name of the public link document inside `data_dir`.
    #[serde(default = "default_public_links_file")]
    pub public_links_file: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Timezone used for date search (IANA name). Empty means system local time.
    #[serde(default)]
    pub timezone: String,
}

fn default_storage_root() -> String {
    "./storage".to_string()
}

fn default_data_dir() -> String {
    "Important_files".to_string()
}

fn default_public_links_file() -> String {
    ".public_links.json".to_string()
}

fn default_max_upload_size() -> u64 {
    500
}

impl StorageConfig {
    /// Full path of the public link document.
    pub fn public_links_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.public_links_file)
    }

    /// Upload ceiling in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            data_dir: default_data_dir(),
            public_links_file: default_public_links_file(),
            max_upload_size_mb: default_max_upload_size(),
            timezone: String::new(),
        }
    }
}

/// API key configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Key granting full access.
    #[serde(default)]
    pub main_api_key: String,
    /// Key granting upload-only access.
    #[serde(default)]
    pub upload_api_key: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty disables file logging.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/xcloud.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Whether to serve the static console.
    #[serde(default)]
    pub serve_static: bool,
    /// Path to static files directory.
    #[serde(default = "default_static_path")]
    pub static_path: String,
    /// General API rate limit (requests per 15 minutes per client).
    #[serde(default = "default_api_rate_limit")]
    pub api_rate_limit: u32,
    /// Upload/file rate limit (requests per 15 minutes per client).
    #[serde(default = "default_upload_rate_limit")]
    pub upload_rate_limit: u32,
}

fn default_static_path() -> String {
    "public".to_string()
}

fn default_api_rate_limit() -> u32 {
    1000
}

fn default_upload_rate_limit() -> u32 {
    500
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec![],
            serve_static: false,
            static_path: default_static_path(),
            api_rate_limit: default_api_rate_limit(),
            upload_rate_limit: default_upload_rate_limit(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// API keys.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(XcloudError::Io)?;
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
        toml::from_str(s).map_err(|e| XcloudError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `XCLOUD_MAIN_API_KEY`
    /// - `XCLOUD_UPLOAD_API_KEY`
    /// - `XCLOUD_STORAGE_PATH`
    /// - `XCLOUD_PORT`
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env("XCLOUD_MAIN_API_KEY") {
            self.auth.main_api_key = key;
        }
        if let Some(key) = non_empty_env("XCLOUD_UPLOAD_API_KEY") {
            self.auth.upload_api_key = key;
        }
        if let Some(root) = non_empty_env("XCLOUD_STORAGE_PATH") {
            self.storage.root = root;
        }
        if let Some(port) = non_empty_env("XCLOUD_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid XCLOUD_PORT"),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.auth.main_api_key.is_empty() || self.auth.upload_api_key.is_empty() {
            return Err(XcloudError::Config(
                "main_api_key and upload_api_key must be set. \
                 Set them in config.toml or via XCLOUD_MAIN_API_KEY / XCLOUD_UPLOAD_API_KEY."
                    .to_string(),
            ));
        }
        if self.auth.main_api_key == self.auth.upload_api_key {
            return Err(XcloudError::Config(
                "main_api_key and upload_api_key must differ".to_string(),
            ));
        }
        if self.storage.max_upload_size_mb == 0 {
            return Err(XcloudError::Config(
                "max_upload_size_mb must be greater than 0".to_string(),
            ));
        }
        if !self.storage.timezone.is_empty() && self.storage.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(XcloudError::Config(format!(
                "unknown timezone '{}'",
                self.storage.timezone
            )));
        }
        Ok(())
    }

    /// Human-readable summary with secrets redacted.
    pub fn summary(&self) -> String {
        format!(
            "server:      {}:{}\n\
             storage:     {}\n\
             links file:  {}\n\
             max upload:  {} MB\n\
             timezone:    {}\n\
             main key:    {}\n\
             upload key:  {}\n\
             log level:   {}\n\
             log file:    {}",
            self.server.host,
            self.server.port,
            self.storage.root,
            self.storage.public_links_path().display(),
            self.storage.max_upload_size_mb,
            if self.storage.timezone.is_empty() { "local" } else { &self.storage.timezone },
            redact(&self.auth.main_api_key),
            redact(&self.auth.upload_api_key),
            self.logging.level,
            if self.logging.file.is_empty() { "<console only>" } else { &self.logging.file },
        )
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        "NOT SET".to_string()
    } else {
        format!("set ({} chars)", secret.chars().count())
    }
}
