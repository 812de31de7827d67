//! Transport Adapters
//!
//! Thin wrappers around the server's REST surface and its live channel.
//! No business logic lives here: adapters turn calls into requests and
//! responses into shared types, and report every failure as a
//! [`TransportError`].
//!
//! The controller depends on the [`RestTransport`] trait rather than on
//! [`HttpRestClient`] directly, so tests can substitute an in-memory server.

pub mod live;
pub mod rest;

use async_trait::async_trait;
use std::fmt::Debug;

use crate::client::error::TransportError;
use crate::shared::messaging::{Conversation, ConversationFilter, Message, MessagePage};

pub use live::{Backoff, LiveClient, LiveSender, LiveSubscription};
pub use rest::HttpRestClient;

/// Request/response side of the server
#[async_trait]
pub trait RestTransport: Send + Sync + Debug {
    /// `GET /conversations?filter=`
    async fn fetch_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, TransportError>;

    /// `GET /conversations/{id}`
    async fn fetch_conversation(&self, conversation_id: &str) -> Result<Conversation, TransportError>;

    /// `GET /conversations/{id}/messages?page=&limit=`
    ///
    /// `page` is 1-indexed; page 1 holds the newest messages.
    async fn fetch_page(
        &self,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<MessagePage, TransportError>;

    /// `POST /messages/send`; returns the stored message with its server id
    async fn post_message(
        &self,
        conversation_id: &str,
        text: &str,
        contact_name: Option<&str>,
    ) -> Result<Message, TransportError>;

    /// `PUT /conversations/{id}/read`
    async fn mark_read(&self, conversation_id: &str) -> Result<(), TransportError>;
}
