//! Client Runtime Module
//!
//! Everything that talks to the server or holds client-side state.
//!
//! # Architecture
//!
//! - **`config`** - Runtime configuration (server URLs, session token)
//! - **`error`** - Transport, sync, and auth error taxonomy
//! - **`transport`** - REST adapter (`reqwest`) and live adapter (`tokio-tungstenite`)
//! - **`store`** - Conversation Store and Message Store (read-only to callers)
//! - **`sync`** - Synchronization controller, merge rules, change notification
//! - **`auth`** - Login/register/profile calls
//! - **`token_store`** - Durable session token storage
//! - **`main`** - `wachat-cli` binary (feature `cli`)
//!
//! # Data Flow
//!
//! ```text
//! intent ──▶ SyncController ──▶ RestTransport ──▶ server
//!                 ▲    │
//!  LiveSubscription    └──▶ ConversationStore / MessageStore ──▶ StoreChange
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod store;
pub mod sync;
pub mod token_store;
pub mod transport;

// Re-export commonly used types
pub use auth::{AuthClient, RegisterRequest, UserProfile};
pub use config::Config;
pub use error::{AuthError, PreconditionError, SyncError, TransportError};
pub use store::{ConversationStore, MessageStore, PageCursor};
pub use sync::{PageOutcome, PendingSend, StoreChange, SyncController, SyncSettings, SyncState};
pub use token_store::{StoredSession, TokenStore};
pub use transport::{Backoff, HttpRestClient, LiveClient, LiveSender, LiveSubscription, RestTransport};
