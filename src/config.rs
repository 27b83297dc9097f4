use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "TWBOARD_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub metrics: MetricsConfig,
    pub telegram: TelegramConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Base URL of the metrics store, e.g. `http://localhost:4242`
    pub url: String,
    /// Basic-auth user for read queries
    pub user: String,
    /// Basic-auth password for read queries
    pub read_token: String,
    /// Metric holding the follower counts
    pub metric: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::from("twboardbot"),
            read_token: String::new(),
            metric: String::from("followers_count_total"),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token
    pub token: String,
    /// Long-poll timeout for getUpdates, in seconds
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Lookback used by chat commands
    pub weeks_ago: i64,
    /// Font family for image reports
    pub font_family: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            weeks_ago: 3,
            font_family: String::from("sans-serif"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("missing required setting {0}")]
    Missing(&'static str),
}

impl Config {
    pub fn require_metrics(&self) -> Result<(), ConfigError> {
        if self.metrics.url.trim().is_empty() {
            return Err(ConfigError::Missing("metrics.url"));
        }
        Ok(())
    }

    pub fn require_telegram(&self) -> Result<(), ConfigError> {
        self.require_metrics()?;
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::Missing("telegram.token"));
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("twboard").join("config.toml")
}

pub fn resolve_config_path(config_path: Option<&Path>) -> PathBuf {
    if let Some(path) = config_path {
        return path.to_path_buf();
    }
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if let Some(stripped) = env_path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        }
        return PathBuf::from(env_path);
    }
    default_config_path()
}

pub fn parse_config(contents: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the configuration once at startup; it is immutable afterwards.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}
