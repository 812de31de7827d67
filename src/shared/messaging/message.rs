//! Chat Message Data Structure
//!
//! Represents a message in a conversation, plus the timestamp and delivery
//! status types it carries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::shared::error::SharedError;

/// Maximum accepted length of outgoing message text, in characters
pub const MAX_TEXT_LEN: usize = 4096;

/// Unix timestamp with second resolution.
///
/// The server sends timestamps as decimal strings (`"1700000000"`). Ordering
/// must be numeric, not lexicographic, so the value is parsed once on the
/// way in and compared as an integer everywhere else. Serialization writes
/// the string form back out; deserialization also accepts a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from Unix seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Unix seconds
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    /// RFC3339 rendering for display
    pub fn to_rfc3339(self) -> String {
        chrono::DateTime::from_timestamp(self.0 as i64, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.0.to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Timestamp {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| SharedError::InvalidTimestamp { raw: s.to_string() })
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
            Raw::Number(secs) => Ok(Self(secs)),
        }
    }
}

/// Delivery status of a message.
///
/// Variants are declared in lifecycle order so that `Ord` reflects
/// progression: a status only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    /// Move to `next` if it is further along. Returns whether it changed.
    pub fn advance(&mut self, next: MessageStatus) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }
}

/// Represents a chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "WireMessage")]
pub struct Message {
    /// Server-assigned unique message ID
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Message text
    pub text: String,
    /// When the message was sent
    pub timestamp: Timestamp,
    /// Delivery status
    pub status: MessageStatus,
    /// Whether the local user sent this message
    pub is_outgoing: bool,
    /// Display name of the contact, when the server includes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
}

/// Message as the server sends it. Server records carry both `wa_id` and
/// `conversation_id`; `wa_id` names the conversation.
#[derive(Deserialize)]
struct WireMessage {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default)]
    wa_id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    text: String,
    timestamp: Timestamp,
    #[serde(default)]
    status: MessageStatus,
    #[serde(default)]
    is_outgoing: bool,
    #[serde(default)]
    contact_name: Option<String>,
}

impl TryFrom<WireMessage> for Message {
    type Error = SharedError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let conversation_id = wire
            .wa_id
            .filter(|id| !id.is_empty())
            .or(wire.conversation_id.filter(|id| !id.is_empty()))
            .ok_or_else(|| SharedError::MissingConversation {
                message_id: wire.id.clone(),
            })?;
        Ok(Self {
            id: wire.id,
            conversation_id,
            text: wire.text,
            timestamp: wire.timestamp,
            status: wire.status,
            is_outgoing: wire.is_outgoing,
            contact_name: wire.contact_name.filter(|name| !name.is_empty()),
        })
    }
}

impl Message {
    /// Create an incoming text message
    pub fn incoming(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            text: text.into(),
            timestamp,
            status: MessageStatus::Delivered,
            is_outgoing: false,
            contact_name: None,
        }
    }

    /// Create an outgoing text message
    pub fn outgoing(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            text: text.into(),
            timestamp,
            status: MessageStatus::Sent,
            is_outgoing: true,
            contact_name: None,
        }
    }

    /// Get a preview of the message (first N characters)
    pub fn preview(&self, max_len: usize) -> String {
        if self.text.chars().count() <= max_len {
            self.text.clone()
        } else {
            let mut preview: String = self.text.chars().take(max_len.saturating_sub(3)).collect();
            preview.push_str("...");
            preview
        }
    }
}

/// Status change pushed by the server for a message already delivered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    #[serde(rename = "conversationId", alias = "wa_id")]
    pub conversation_id: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub status: MessageStatus,
}

/// Check outgoing text and return it trimmed
pub fn validate_text(text: &str) -> Result<&str, SharedError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SharedError::EmptyText);
    }
    let len = trimmed.chars().count();
    if len > MAX_TEXT_LEN {
        return Err(SharedError::TextTooLong {
            len,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(trimmed)
}
