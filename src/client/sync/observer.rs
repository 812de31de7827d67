/**
 * Store Change Notification
 *
 * The controller publishes a `StoreChange` after every mutation it applies
 * to the stores. Views subscribe and re-read whatever part of the state the
 * change names.
 *
 * Notifications carry identifiers, not data: a slow subscriber that lags
 * behind the channel capacity can resynchronize by reading the state.
 */

use tokio::sync::broadcast;

use crate::shared::event::ConnectionStatus;

/// Default number of buffered changes per subscriber
pub const CHANGE_CAPACITY: usize = 256;

/// Something in the controller's state changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// The conversation list was (re)loaded
    ConversationsChanged,
    /// One conversation summary changed
    ConversationUpdated { id: String },
    /// A conversation's message sequence or cursor changed
    MessagesChanged { conversation_id: String },
    ActiveConversationChanged(Option<String>),
    ConnectivityChanged(ConnectionStatus),
    /// A contact started or stopped typing. Nothing is stored.
    Typing { conversation_id: String, typing: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct ChangeNotifier {
    tx: broadcast::Sender<StoreChange>,
}

impl ChangeNotifier {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }

    pub(crate) fn notify(&self, change: StoreChange) {
        match self.tx.send(change) {
            Ok(count) => tracing::trace!("[SYNC] change delivered to {} subscribers", count),
            Err(e) => tracing::debug!("[SYNC] no subscribers for {:?}", e.0),
        }
    }
}
