use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::sync::SyncSettings;
use crate::shared::config::{
    AppConfig, AppConfigBuilder, ConfigError, DEFAULT_LIVE_URL, DEFAULT_SERVER_URL,
};

/// Environment variable overriding the REST base URL
pub const API_URL_ENV: &str = "WACHAT_API_URL";
/// Environment variable overriding the live channel URL
pub const LIVE_URL_ENV: &str = "WACHAT_LIVE_URL";

const SESSION_FILE: &str = "session.json";

/// Application configuration wrapper.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            token: None,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        let app = builder.build()?;
        Ok(Self { app, token: None })
    }

    /// Defaults, then the TOML file if given, then the environment
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        let mut builder = AppConfigBuilder::from_config(base);
        if let Ok(url) = std::env::var(API_URL_ENV) {
            builder = builder.server_url(url);
        }
        if let Ok(url) = std::env::var(LIVE_URL_ENV) {
            builder = builder.live_url(url);
        }
        Self::with_builder(builder)
    }

    /// Set the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Get the bearer token
    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    /// Clear the token (logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url().trim_end_matches('/'), path)
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn live_url(&self) -> &str {
        self.app.live_url.as_deref().unwrap_or(DEFAULT_LIVE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        self.app.request_timeout()
    }

    pub fn page_limit(&self) -> u32 {
        self.app.page_limit()
    }

    /// Location of the persisted session, `<data_dir>/wachat/session.json` by default
    pub fn token_file(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.app.token_file {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join("wachat").join(SESSION_FILE))
            .ok_or(ConfigError::MissingValue("token_file"))
    }

    /// Settings handed to the synchronization controller
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            request_timeout: self.request_timeout(),
            page_limit: self.page_limit(),
        }
    }
}
