//! Client Error Types
//!
//! Three layers, from the wire up:
//!
//! - `TransportError` - what an adapter reports (network, HTTP status,
//!   timeout, undecodable payload, closed channel)
//! - `SyncError` - what the synchronization controller returns. `Fetch` and
//!   `Send` wrap a transport failure on the read and write paths and are
//!   retryable by the user; `Precondition` means the caller asked for
//!   something the controller documents as invalid and is not retryable.
//! - `AuthError` - login/register/profile flows and token storage
//!
//! No operation retries on its own; retry is always a fresh call.

use std::fmt;

use thiserror::Error;

use crate::shared::config::ConfigError;
use crate::shared::error::SharedError;

/// Failure reported by a transport adapter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("server rejected credentials")]
    Unauthorized,

    #[error("request timed out")]
    Timeout,

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("live channel is not connected")]
    Closed,

    #[error("request aborted")]
    Aborted,
}

impl TransportError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        if status == 401 {
            return Self::Unauthorized;
        }
        Self::Status {
            status,
            body: body.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::status(status.as_u16(), err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<SharedError> for TransportError {
    fn from(err: SharedError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// A documented precondition the caller did not meet
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("no older messages for conversation {0}")]
    NoMorePages(String),

    #[error("an older page is already loading for conversation {0}")]
    LoadInFlight(String),

    #[error("initial page not loaded for conversation {0}")]
    NotLoaded(String),

    #[error(transparent)]
    InvalidInput(#[from] SharedError),
}

/// Error returned by the synchronization controller
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Read-path failure; the user may retry
    #[error("fetch failed: {0}")]
    Fetch(TransportError),

    /// Write-path failure; nothing was applied locally
    #[error("send failed: {0}")]
    Send(TransportError),

    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),
}

impl SyncError {
    /// Whether a user-initiated retry can succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::Precondition(_))
    }

    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            SyncError::Fetch(e) | SyncError::Send(e) => Some(e),
            SyncError::Precondition(_) => None,
        }
    }
}

/// Authentication and session errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("auth request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("session storage: {0}")]
    Storage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AuthError {
    pub fn storage(context: &str, err: impl fmt::Display) -> Self {
        Self::Storage(format!("{}: {}", context, err))
    }
}
