//! Synchronization
//!
//! The controller reconciles three input channels into the stores:
//!
//! 1. the initial REST page of a conversation
//! 2. older REST pages, fetched on demand
//! 3. live pushes from the WebSocket channel
//!
//! Whatever order these arrive in, each conversation's sequence stays
//! sorted by timestamp and unique by message id (see [`merge`]).

pub mod controller;
pub mod merge;
pub mod observer;

use std::time::Duration;

use crate::shared::config::{DEFAULT_PAGE_LIMIT, DEFAULT_REQUEST_TIMEOUT_SECS};

pub use controller::{PageOutcome, PendingSend, SyncController, SyncState};
pub use merge::MergeOutcome;
pub use observer::StoreChange;

/// Tunables for the synchronization controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Upper bound on every transport call
    pub request_timeout: Duration,
    /// Messages requested per page
    pub page_limit: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}
