//! Shared Module
//!
//! This module contains types and data structures that mirror the server's
//! wire format. They are used both by the transport adapters (for
//! serialization) and by the stores (as the in-memory representation).
//!
//! # Overview
//!
//! The shared module is free of I/O. Everything here can be constructed
//! and inspected in tests without a runtime.

/// Real-time channel frames and events
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Conversation and message types
pub mod messaging;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::SharedError;
pub use event::{ClientFrame, ConnectionStatus, LiveEvent, ServerFrame};
pub use messaging::{
    Conversation, ConversationFilter, Message, MessagePage, MessageStatus, StatusUpdate, Timestamp,
};
