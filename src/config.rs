//! Configuration loader and validator for the CMS server.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub server: Server,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub phones: Phones,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means permissive.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Bounds applied to every list request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

/// Upstream product API used by the phones proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phones {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for Phones {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl App {
    /// `data_dir` with a leading `~/` expanded against `$HOME`.
    pub fn resolved_data_dir(&self) -> String {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
                Err(_) => self.data_dir.clone(),
            },
            None => self.data_dir.clone(),
        }
    }
}

impl Server {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    /// Default SQLite location inside the data directory.
    pub fn default_database_url(&self) -> String {
        format!("sqlite://{}/cms.db", self.app.resolved_data_dir())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.server.host.trim().is_empty() {
        return Err(ConfigError::Invalid("server.host must be non-empty"));
    }
    if cfg
        .server
        .cors_origins
        .iter()
        .any(|origin| origin.trim().is_empty())
    {
        return Err(ConfigError::Invalid(
            "server.cors_origins entries must be non-empty",
        ));
    }

    if cfg.pagination.default_limit <= 0 {
        return Err(ConfigError::Invalid("pagination.default_limit must be > 0"));
    }
    if cfg.pagination.max_limit < cfg.pagination.default_limit {
        return Err(ConfigError::Invalid(
            "pagination.max_limit must be >= pagination.default_limit",
        ));
    }

    if let Some(url) = cfg.phones.api_url.as_deref() {
        if Url::parse(url).is_err() {
            return Err(ConfigError::Invalid("phones.api_url must be an absolute URL"));
        }
    }
    if cfg.phones.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("phones.timeout_seconds must be > 0"));
    }

    Ok(())
}

/// Example configuration file.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

server:
  host: "0.0.0.0"
  port: 3000
  cors_origins:
    - "http://localhost:3000"

pagination:
  default_limit: 10
  max_limit: 100

phones:
  api_url: "https://api.example.com/phones"
  timeout_seconds: 30
"#
}
