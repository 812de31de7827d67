/**
 * Real-time Event System
 *
 * This module defines the frames exchanged over the live channel and the
 * events the live client reports to the synchronization controller.
 *
 * Every frame on the wire is a JSON object `{"event": <name>, "data": <payload>}`.
 * Server frames the client does not know are skipped rather than treated as
 * errors, so the server can add events without breaking older clients.
 */
use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;
use crate::shared::messaging::{Message, StatusUpdate};

/// Presence payload of `user-online` / `user-offline`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresencePayload {
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Payload of `user-typing`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    /// `false` once the contact stopped typing
    #[serde(rename = "isTyping", default = "typing_default")]
    pub is_typing: bool,
}

fn typing_default() -> bool {
    true
}

/// Frame sent by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// A message was created in one of the user's conversations
    NewMessage(Message),
    /// A message's delivery status changed
    MessageStatus(StatusUpdate),
    UserOnline(PresencePayload),
    UserOffline(PresencePayload),
    UserTyping(TypingPayload),
    /// The `authenticate` handshake was rejected
    AuthError(String),
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ServerFrame {
    /// Decode a text frame. Returns `Ok(None)` for events this client ignores.
    pub fn decode(text: &str) -> Result<Option<Self>, SharedError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        let frame = match raw.event.as_str() {
            "new-message" => ServerFrame::NewMessage(serde_json::from_value(raw.data)?),
            "message-status" => ServerFrame::MessageStatus(serde_json::from_value(raw.data)?),
            "user-online" => ServerFrame::UserOnline(serde_json::from_value(raw.data)?),
            "user-offline" => ServerFrame::UserOffline(serde_json::from_value(raw.data)?),
            "user-typing" => ServerFrame::UserTyping(serde_json::from_value(raw.data)?),
            "auth-error" => ServerFrame::AuthError(
                raw.data
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| raw.data.to_string()),
            ),
            _ => return Ok(None),
        };
        Ok(Some(frame))
    }

    pub fn encode(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Text payload of `send-message`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingText {
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    pub text: String,
}

/// Frame sent by the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Bearer token handshake, sent first on every connection
    Authenticate(String),
    SendMessage(OutgoingText),
    JoinConversation(String),
    LeaveConversation(String),
    /// The local user started typing in a conversation
    TypingStart(String),
    TypingStop(String),
}

impl ClientFrame {
    pub fn encode(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, SharedError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Event reported by a live subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Connected,
    Disconnected,
    MessageReceived(Message),
    AuthError(String),
    StatusUpdated(StatusUpdate),
    Presence { user_id: String, online: bool },
    Typing { user_id: String, typing: bool },
}

impl From<ServerFrame> for LiveEvent {
    fn from(frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::NewMessage(message) => LiveEvent::MessageReceived(message),
            ServerFrame::MessageStatus(update) => LiveEvent::StatusUpdated(update),
            ServerFrame::UserOnline(p) => LiveEvent::Presence { user_id: p.user_id, online: true },
            ServerFrame::UserOffline(p) => LiveEvent::Presence { user_id: p.user_id, online: false },
            ServerFrame::UserTyping(p) => LiveEvent::Typing {
                user_id: p.user_id,
                typing: p.is_typing,
            },
            ServerFrame::AuthError(reason) => LiveEvent::AuthError(reason),
        }
    }
}

/// Connectivity of the live channel as seen by the controller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// The server rejected the token; reconnecting will not help
    AuthFailed(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}
