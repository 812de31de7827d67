//! Messaging Module
//!
//! This module contains all the data structures for the messaging system:
//!
//! - `Message` - A message in a conversation thread
//! - `Conversation` - A chat thread summary with one contact
//! - `Timestamp` - Unix-seconds timestamp (string on the wire)
//! - `ApiEnvelope` / `MessagePage` - REST response shapes
//!
//! # Usage
//!
//! ```rust
//! use wachat::shared::messaging::{Conversation, Message, MessageStatus, Timestamp};
//! ```

pub mod api;
pub mod conversation;
pub mod message;

// Re-export all types
pub use api::{ApiEnvelope, MessagePage, Pagination, SendMessageRequest};
pub use conversation::{Conversation, ConversationFilter};
pub use message::{validate_text, Message, MessageStatus, StatusUpdate, Timestamp, MAX_TEXT_LEN};
