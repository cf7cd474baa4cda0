use serde::{Deserialize, Serialize};
use std::path::Path;
use tabrefresh_ingress::bulk::DEFAULT_REFRESH_CONCURRENCY;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub cors: CorsConfig,
}

/// Upstream REST API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Sign-in, listing and job status
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Refresh trigger only
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Refresh triggers in flight per bulk request; 1 is strictly sequential
    #[serde(default = "default_refresh_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub log_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub allow_any_origin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream: UpstreamConfig::default(),
            refresh: RefreshConfig::default(),
            logging: LoggingConfig::default(),
            ui: UiConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout(),
            refresh_timeout_secs: default_refresh_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            concurrency: default_refresh_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_requests: false,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_any_origin: true,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    ///
    /// Runs before tracing is initialised, so bad values are reported on stderr.
    pub fn merge_env(&mut self) {
        // Server settings
        if let Ok(val) = std::env::var("TABREFRESH_HOST") {
            self.host = val;
        }
        if let Some(port) = parse_env("TABREFRESH_PORT") {
            self.port = port;
        }

        // Upstream settings
        if let Ok(val) = std::env::var("TABREFRESH_API_VERSION") {
            self.upstream.api_version = val;
        }
        if let Some(secs) = parse_env("TABREFRESH_REQUEST_TIMEOUT_SECS") {
            self.upstream.request_timeout_secs = secs;
        }
        if let Some(secs) = parse_env("TABREFRESH_REFRESH_TIMEOUT_SECS") {
            self.upstream.refresh_timeout_secs = secs;
        }
        if let Some(concurrency) = parse_env("TABREFRESH_REFRESH_CONCURRENCY") {
            self.refresh.concurrency = concurrency;
        }

        // Logging settings
        if let Ok(val) = std::env::var("TABREFRESH_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(enabled) = parse_env("TABREFRESH_LOG_REQUESTS") {
            self.logging.log_requests = enabled;
        }
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.upstream.api_version.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "upstream.api_version must not be empty".to_string(),
            ));
        }
        for (name, secs) in [
            ("upstream.request_timeout_secs", self.upstream.request_timeout_secs),
            ("upstream.refresh_timeout_secs", self.upstream.refresh_timeout_secs),
            ("upstream.connect_timeout_secs", self.upstream.connect_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        if self.refresh.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "refresh.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let val = std::env::var(name).ok()?;
    match val.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            eprintln!("Warning: Invalid {} '{}', keeping current value", name, val);
            None
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_api_version() -> String {
    tabrefresh_egress::tableau::DEFAULT_API_VERSION.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_refresh_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_refresh_concurrency() -> usize {
    DEFAULT_REFRESH_CONCURRENCY
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}
