//! Application configuration module
//!
//! Provides configuration types for the client. Values come from, in order
//! of increasing precedence: built-in defaults, an optional TOML file, and
//! the builder (which the client wrapper fills from the environment).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default REST base URL
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
/// Default live channel URL
pub const DEFAULT_LIVE_URL: &str = "ws://localhost:5000/ws";
/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
/// Default message page size
pub const DEFAULT_PAGE_LIMIT: u32 = 50;
/// Largest page size the server accepts
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// REST base URL
    pub server_url: Option<String>,
    /// Live channel (WebSocket) URL
    pub live_url: Option<String>,
    /// Timeout applied to every transport call
    pub request_timeout_secs: Option<u64>,
    /// Messages requested per page
    pub page_limit: Option<u32>,
    /// Where the session token is persisted
    pub token_file: Option<PathBuf>,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.server_url {
            check_url(url, &["http", "https"])?;
        }
        if let Some(url) = &self.live_url {
            check_url(url, &["ws", "wss"])?;
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::OutOfRange("request_timeout_secs must be positive"));
        }
        if let Some(limit) = self.page_limit {
            if limit == 0 || limit > MAX_PAGE_LIMIT {
                return Err(ConfigError::OutOfRange("page_limit must be within 1..=200"));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn page_limit(&self) -> u32 {
        self.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }
}

fn check_url(url: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", url, e)))?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(ConfigError::InvalidUrl(format!(
            "{}: expected scheme {}",
            url,
            schemes.join(" or ")
        )));
    }
    Ok(())
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    base: AppConfig,
}

impl AppConfigBuilder {
    /// Start from an existing configuration (e.g. a loaded file)
    pub fn from_config(base: AppConfig) -> Self {
        Self { base }
    }

    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.base.server_url = Some(url.into());
        self
    }

    /// Set the live channel URL
    pub fn live_url(mut self, url: impl Into<String>) -> Self {
        self.base.live_url = Some(url.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.base.request_timeout_secs = Some(secs);
        self
    }

    pub fn page_limit(mut self, limit: u32) -> Self {
        self.base.page_limit = Some(limit);
        self
    }

    pub fn token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.base.token_file = Some(path.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.base.validate()?;
        Ok(self.base)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to read config: {0}")]
    Io(String),
}
