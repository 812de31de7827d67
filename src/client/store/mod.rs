//! Client Stores
//!
//! Plain containers for conversation summaries and message sequences.
//! Callers get read accessors only; every mutator is crate-private and
//! driven by the synchronization controller.

pub mod conversations;
pub mod messages;

pub use conversations::ConversationStore;
pub use messages::{MessageStore, PageCursor};
