//! Wire Data Errors
//!
//! Failures while decoding server payloads or checking user input, before
//! any transport is involved. Transport adapters fold these into
//! `TransportError::Decode`; the controller reports invalid input as a
//! precondition failure.
//!
//! ```rust
//! use wachat::shared::error::SharedError;
//! use wachat::shared::messaging::validate_text;
//!
//! assert_eq!(validate_text("   "), Err(SharedError::EmptyText));
//! ```
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// Payload is not the JSON shape the client expects
    #[error("malformed payload: {0}")]
    Json(String),

    #[error("invalid timestamp '{raw}'")]
    InvalidTimestamp { raw: String },

    /// Message record names neither `wa_id` nor `conversation_id`
    #[error("message {message_id} does not name a conversation")]
    MissingConversation { message_id: String },

    #[error("message text is empty")]
    EmptyText,

    #[error("message text is {len} characters, limit is {max}")]
    TextTooLong { len: usize, max: usize },

    #[error("unknown conversation filter '{0}'")]
    UnknownFilter(String),
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
