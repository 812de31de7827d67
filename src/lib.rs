//! WaChat - Client Core Library
//!
//! WaChat is the headless core of a WhatsApp-style chat client. It keeps a
//! local view of conversations and message threads consistent with a backend
//! that is reached over REST calls and a persistent real-time channel.
//!
//! # Overview
//!
//! This library provides:
//! - Conversation and message data types shared with the server wire format
//! - A Conversation Store and a Message Store (read-only to callers)
//! - A synchronization controller that merges REST pages and live pushes
//!   into one ordered, de-duplicated sequence per conversation
//! - REST and WebSocket transport adapters
//! - Authentication with durable token storage
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared with the server
//!   - Message, conversation, and envelope structures
//!   - Live channel frames and events
//!   - Configuration and shared error types
//!
//! - **`client`** - Client runtime
//!   - Stores and the synchronization controller
//!   - REST (`reqwest`) and live (`tokio-tungstenite`) adapters
//!   - Authentication and token persistence
//!   - `wachat-cli` binary (feature `cli`)
//!
//! # Usage
//!
//! ```rust,no_run
//! use wachat::client::{Config, HttpRestClient, SyncController};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new();
//! let rest = HttpRestClient::new(config.clone())?;
//! let controller = SyncController::new(rest, config.sync_settings());
//!
//! controller.load_initial_page("15551234567").await?;
//! for message in controller.messages("15551234567").await {
//!     println!("{}: {}", message.timestamp, message.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The controller is cheap to clone and `Send + Sync`. All store mutation
//! happens inside short write-locked sections that never span network I/O.

/// Shared types and data structures
pub mod shared;

/// Client runtime: stores, synchronization, transports, auth
pub mod client;
