//! Conversation Data Structure
//!
//! Represents a chat thread with one contact, as shown in the chat list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::message::{Message, Timestamp};
use crate::shared::error::SharedError;

/// Represents a conversation summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Stable conversation ID (the contact's phone-number-like id)
    #[serde(alias = "wa_id")]
    pub id: String,
    /// Display name of the contact
    #[serde(default)]
    pub contact_name: String,
    /// Text of the latest message
    #[serde(default)]
    pub last_message: String,
    /// Timestamp of the latest message
    #[serde(default)]
    pub last_message_time: Option<Timestamp>,
    /// Number of unread incoming messages
    #[serde(default)]
    pub unread_count: u32,
    /// Whether the contact is currently online
    #[serde(default)]
    pub is_online: bool,
    /// Last time the contact was seen, as reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new(id: impl Into<String>, contact_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            contact_name: contact_name.into(),
            last_message: String::new(),
            last_message_time: None,
            unread_count: 0,
            is_online: false,
            last_seen: None,
        }
    }

    /// Create a conversation for an id first seen through a message
    pub fn from_message(message: &Message) -> Self {
        let name = message
            .contact_name
            .clone()
            .unwrap_or_else(|| message.conversation_id.clone());
        Self::new(message.conversation_id.clone(), name)
    }

    /// Update the last message if `message` is at least as recent.
    ///
    /// Returns whether the summary changed. Equal timestamps count as newer:
    /// a later arrival with the same second is placed after its peers in the
    /// thread, so it is also the one the summary shows.
    pub fn update_last_message(&mut self, message: &Message) -> bool {
        let newer = self
            .last_message_time
            .map_or(true, |current| message.timestamp >= current);
        if newer {
            self.last_message = message.text.clone();
            self.last_message_time = Some(message.timestamp);
        }
        newer
    }
}

/// Chat list filter, sent as `?filter=` and applied locally by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationFilter {
    #[default]
    All,
    Unread,
    Online,
}

impl ConversationFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationFilter::All => "all",
            ConversationFilter::Unread => "unread",
            ConversationFilter::Online => "online",
        }
    }

    pub fn matches(self, conversation: &Conversation) -> bool {
        match self {
            ConversationFilter::All => true,
            ConversationFilter::Unread => conversation.unread_count > 0,
            ConversationFilter::Online => conversation.is_online,
        }
    }
}

impl fmt::Display for ConversationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationFilter {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ConversationFilter::All),
            "unread" => Ok(ConversationFilter::Unread),
            "online" => Ok(ConversationFilter::Online),
            other => Err(SharedError::UnknownFilter(other.to_string())),
        }
    }
}
