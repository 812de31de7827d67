//! Session Token Storage
//!
//! Persists the bearer token (and the profile it belongs to) as a small
//! JSON file so the CLI stays logged in between runs. A missing or
//! unreadable file simply means "not logged in".

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::auth::UserProfile;
use crate::client::config::Config;
use crate::client::error::AuthError;
use crate::shared::config::ConfigError;

/// What is written to disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    pub saved_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(token: impl Into<String>, user: Option<UserProfile>) -> Self {
        Self {
            token: token.into(),
            user,
            saved_at: Utc::now(),
        }
    }
}

/// File-backed session storage
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(config.token_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, session: &StoredSession) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuthError::storage("create session directory", e))?;
        }
        let bytes = serde_json::to_vec_pretty(session)
            .map_err(|e| AuthError::storage("encode session", e))?;
        std::fs::write(&self.path, bytes).map_err(|e| AuthError::storage("write session", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| AuthError::storage("restrict session file", e))?;
        }

        tracing::debug!("[AUTH] Session saved to {}", self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Option<StoredSession> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("[AUTH] Cannot read {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("[AUTH] Ignoring corrupt session file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::storage("remove session", e)),
        }
    }
}
