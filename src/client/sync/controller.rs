//! Synchronization Controller
//!
//! Sole writer of the conversation and message stores. Every mutation runs
//! under the state write lock in a short critical section that never spans
//! network I/O: the controller snapshots what it needs, releases the lock,
//! awaits the transport, then re-acquires the lock to apply the result.
//!
//! Late results are recognised by two counters kept on each thread:
//!
//! - the thread `generation`, which changes when a conversation is
//!   forgotten and loaded again
//! - the `older_token`, which changes when an older page load is cancelled
//!   (the user navigated away, or the initial page was reloaded)
//!
//! A result whose counters no longer match is dropped with
//! [`PageOutcome::Discarded`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::merge::{self, MergeOutcome};
use super::observer::{ChangeNotifier, StoreChange, CHANGE_CAPACITY};
use super::SyncSettings;
use crate::client::error::{PreconditionError, SyncError, TransportError};
use crate::client::store::{ConversationStore, MessageStore, PageCursor};
use crate::client::transport::{LiveSubscription, RestTransport};
use crate::shared::event::{ConnectionStatus, LiveEvent};
use crate::shared::messaging::{
    validate_text, Conversation, ConversationFilter, Message, StatusUpdate, Timestamp,
};

/// Everything the controller owns
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    conversations: ConversationStore,
    messages: MessageStore,
    active: Option<String>,
    connectivity: ConnectionStatus,
}

impl SyncState {
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    /// Conversation currently shown to the user, if any
    pub fn active_conversation(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn connectivity(&self) -> &ConnectionStatus {
        &self.connectivity
    }
}

/// What happened to a fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Merged into the store. `added` counts new messages.
    Applied { added: usize, has_more: bool },
    /// Arrived after the load was cancelled or the conversation forgotten
    Discarded,
}

/// Handle to an in-flight send.
///
/// Dropping the handle does not cancel the send; the acknowledged message
/// is merged into the store either way.
#[derive(Debug)]
pub struct PendingSend {
    id: Uuid,
    conversation_id: String,
    handle: JoinHandle<Result<Message, SyncError>>,
}

impl PendingSend {
    /// Local identifier of this send attempt (not the server message id)
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abandon the send. The server may still have received it.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the server acknowledgement
    pub async fn wait(self) -> Result<Message, SyncError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("[SYNC] send {} did not complete: {}", self.id, e);
                Err(SyncError::Send(TransportError::Aborted))
            }
        }
    }
}

#[derive(Debug)]
struct Inner {
    rest: Arc<dyn RestTransport>,
    settings: SyncSettings,
    state: RwLock<SyncState>,
    notifier: ChangeNotifier,
}

/// Reconciles REST pages and live pushes into the stores.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct SyncController {
    inner: Arc<Inner>,
}

impl SyncController {
    pub fn new<R>(rest: R, settings: SyncSettings) -> Self
    where
        R: RestTransport + 'static,
    {
        Self::with_transport(Arc::new(rest), settings)
    }

    pub fn with_transport(rest: Arc<dyn RestTransport>, settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                rest,
                settings,
                state: RwLock::new(SyncState::default()),
                notifier: ChangeNotifier::new(CHANGE_CAPACITY),
            }),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.inner.settings
    }

    /// Receive a [`StoreChange`] after every applied mutation
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.notifier.subscribe()
    }

    /// Read access to the whole state. Hold the guard briefly: writers wait
    /// on it.
    pub async fn state(&self) -> RwLockReadGuard<'_, SyncState> {
        self.inner.state.read().await
    }

    pub async fn snapshot(&self) -> SyncState {
        self.inner.state.read().await.clone()
    }

    pub async fn conversation(&self, id: &str) -> Option<Conversation> {
        self.inner.state.read().await.conversations.get(id).cloned()
    }

    pub async fn conversations(&self, filter: ConversationFilter) -> Vec<Conversation> {
        let state = self.inner.state.read().await;
        state.conversations.list(filter).into_iter().cloned().collect()
    }

    /// Messages of a conversation, oldest first
    pub async fn messages(&self, conversation_id: &str) -> Vec<Message> {
        let state = self.inner.state.read().await;
        state
            .messages
            .get(conversation_id)
            .map(<[Message]>::to_vec)
            .unwrap_or_default()
    }

    pub async fn cursor(&self, conversation_id: &str) -> Option<PageCursor> {
        self.inner.state.read().await.messages.cursor(conversation_id)
    }

    pub async fn connectivity(&self) -> ConnectionStatus {
        self.inner.state.read().await.connectivity.clone()
    }

    pub async fn active_conversation(&self) -> Option<String> {
        self.inner.state.read().await.active.clone()
    }

    /// Fetch the conversation list and merge it into the store.
    ///
    /// Entries missing from the response are kept: a filtered list says
    /// nothing about the conversations it leaves out.
    pub async fn load_conversations(&self, filter: ConversationFilter) -> Result<usize, SyncError> {
        let list = self
            .timed(self.inner.rest.fetch_conversations(filter))
            .await
            .map_err(|e| {
                tracing::error!("[SYNC] Failed to load conversations: {}", e);
                SyncError::Fetch(e)
            })?;

        let count = self.inner.state.write().await.conversations.merge_all(list);
        tracing::info!("[SYNC] Loaded {} conversations (filter={})", count, filter);
        self.publish(vec![StoreChange::ConversationsChanged]);
        Ok(count)
    }

    /// Make `conversation_id` the active conversation and refresh its
    /// summary.
    ///
    /// Any older page load of the previously active conversation is
    /// cancelled. The conversation stays active even if the summary fetch
    /// fails.
    pub async fn open_conversation(&self, conversation_id: &str) -> Result<(), SyncError> {
        let switched = {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;
            let previous = state.active.replace(conversation_id.to_string());
            if let Some(previous) = previous.as_deref().filter(|p| *p != conversation_id) {
                if state.messages.cancel_older_load(previous) {
                    tracing::debug!("[SYNC] Cancelled older page load for {}", previous);
                }
            }
            previous.as_deref() != Some(conversation_id)
        };
        if switched {
            tracing::info!("[SYNC] Opened conversation {}", conversation_id);
            self.publish(vec![StoreChange::ActiveConversationChanged(Some(
                conversation_id.to_string(),
            ))]);
        }

        let summary = self
            .timed(self.inner.rest.fetch_conversation(conversation_id))
            .await
            .map_err(|e| {
                tracing::error!("[SYNC] Failed to fetch conversation {}: {}", conversation_id, e);
                SyncError::Fetch(e)
            })?;

        self.inner.state.write().await.conversations.upsert(summary);
        self.publish(vec![StoreChange::ConversationUpdated {
            id: conversation_id.to_string(),
        }]);
        Ok(())
    }

    /// Clear the active conversation, cancelling its older page load
    pub async fn close_conversation(&self) {
        let previous = {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;
            let previous = state.active.take();
            if let Some(previous) = previous.as_deref() {
                state.messages.cancel_older_load(previous);
            }
            previous
        };
        if let Some(previous) = previous {
            tracing::info!("[SYNC] Closed conversation {}", previous);
            self.publish(vec![StoreChange::ActiveConversationChanged(None)]);
        }
    }

    /// Drop the loaded messages of a conversation. Results still in flight
    /// for it are discarded when they land. The summary is kept.
    pub async fn forget_conversation(&self, conversation_id: &str) -> bool {
        let removed = self.inner.state.write().await.messages.remove(conversation_id);
        if removed {
            tracing::debug!("[SYNC] Forgot messages of {}", conversation_id);
            self.publish(vec![StoreChange::MessagesChanged {
                conversation_id: conversation_id.to_string(),
            }]);
        }
        removed
    }

    /// Fetch page 1 and replace the conversation's sequence with it.
    ///
    /// Live messages that arrive while the fetch is in flight are merged
    /// again on top of the page, so none of them is lost to the replace.
    pub async fn load_initial_page(&self, conversation_id: &str) -> Result<PageOutcome, SyncError> {
        let generation = {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;
            if state.messages.cancel_older_load(conversation_id) {
                tracing::debug!("[SYNC] Reload of {} cancelled an older page load", conversation_id);
            }
            let thread = state.messages.thread_mut(conversation_id);
            if thread.initial_in_flight == 0 {
                thread.arrived_during_initial.clear();
            }
            thread.initial_in_flight += 1;
            thread.generation
        };

        let result = self
            .timed(self.inner.rest.fetch_page(conversation_id, 1, self.inner.settings.page_limit))
            .await;

        let mut changes = Vec::new();
        let outcome = {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;
            let Some(thread) = state.messages.thread_mut_if(conversation_id, generation) else {
                tracing::warn!("[SYNC] Discarding initial page for forgotten conversation {}", conversation_id);
                return Ok(PageOutcome::Discarded);
            };

            thread.initial_in_flight = thread.initial_in_flight.saturating_sub(1);
            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    if thread.initial_in_flight == 0 {
                        thread.arrived_during_initial.clear();
                    }
                    tracing::error!("[SYNC] Initial page of {} failed: {}", conversation_id, e);
                    return Err(SyncError::Fetch(e));
                }
            };

            merge::replace_with_page(&mut thread.messages, page.messages);
            let replay = if thread.initial_in_flight == 0 {
                std::mem::take(&mut thread.arrived_during_initial)
            } else {
                thread.arrived_during_initial.clone()
            };
            for message in replay {
                merge::insert_ordered(&mut thread.messages, message);
            }
            thread.cursor = Some(PageCursor {
                page: 1,
                has_more: page.has_more,
            });

            let added = thread.messages.len();
            let newest = thread.messages.last().cloned();
            changes.push(StoreChange::MessagesChanged {
                conversation_id: conversation_id.to_string(),
            });

            if let Some(newest) = newest {
                if state.conversations.entry_for_message(&newest).update_last_message(&newest) {
                    changes.push(StoreChange::ConversationUpdated {
                        id: conversation_id.to_string(),
                    });
                }
            }

            tracing::debug!(
                "[SYNC] Initial page of {}: {} messages, has_more={}",
                conversation_id,
                added,
                page.has_more
            );
            PageOutcome::Applied {
                added,
                has_more: page.has_more,
            }
        };

        self.publish(changes);
        Ok(outcome)
    }

    /// Fetch the next older page and merge it in front of the sequence.
    ///
    /// Fails with a precondition error, without touching the network, when
    /// the initial page was never loaded, there are no more pages, or a
    /// page load for this conversation is already running.
    pub async fn load_older_page(&self, conversation_id: &str) -> Result<PageOutcome, SyncError> {
        let (generation, token, next_page) = {
            let mut guard = self.inner.state.write().await;
            let thread = guard
                .messages
                .existing_mut(conversation_id)
                .ok_or_else(|| PreconditionError::NotLoaded(conversation_id.to_string()))?;
            let cursor = thread
                .cursor
                .ok_or_else(|| PreconditionError::NotLoaded(conversation_id.to_string()))?;
            if thread.older_in_flight || thread.initial_in_flight > 0 {
                return Err(PreconditionError::LoadInFlight(conversation_id.to_string()).into());
            }
            if !cursor.has_more {
                return Err(PreconditionError::NoMorePages(conversation_id.to_string()).into());
            }
            thread.older_in_flight = true;
            (thread.generation, thread.older_token, cursor.page + 1)
        };

        tracing::debug!("[SYNC] Loading page {} of {}", next_page, conversation_id);
        let result = self
            .timed(
                self.inner
                    .rest
                    .fetch_page(conversation_id, next_page, self.inner.settings.page_limit),
            )
            .await;

        let outcome = {
            let mut guard = self.inner.state.write().await;
            let thread = match guard.messages.thread_mut_if(conversation_id, generation) {
                Some(thread) if thread.older_token == token => thread,
                _ => {
                    tracing::warn!(
                        "[SYNC] Discarding page {} of {}: load was cancelled",
                        next_page,
                        conversation_id
                    );
                    return Ok(PageOutcome::Discarded);
                }
            };
            thread.older_in_flight = false;

            let page = result.map_err(|e| {
                tracing::error!("[SYNC] Page {} of {} failed: {}", next_page, conversation_id, e);
                SyncError::Fetch(e)
            })?;

            let added = merge::prepend_page(&mut thread.messages, page.messages);
            thread.cursor = Some(PageCursor {
                page: next_page,
                has_more: page.has_more,
            });
            tracing::debug!(
                "[SYNC] Page {} of {}: {} new messages, has_more={}",
                next_page,
                conversation_id,
                added,
                page.has_more
            );
            PageOutcome::Applied {
                added,
                has_more: page.has_more,
            }
        };

        self.publish(vec![StoreChange::MessagesChanged {
            conversation_id: conversation_id.to_string(),
        }]);
        Ok(outcome)
    }

    /// Merge one pushed message. Returns whether the state changed.
    ///
    /// Repeats of a known id are ignored, except that a more advanced
    /// status is taken over. A new incoming message bumps the unread count
    /// unless its conversation is the active one.
    pub async fn receive_live_message(&self, message: Message) -> bool {
        let conversation_id = message.conversation_id.clone();
        let mut changes = Vec::new();
        {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;
            let is_active = state.active.as_deref() == Some(conversation_id.as_str());

            let thread = state.messages.thread_mut(&conversation_id);
            if thread.initial_in_flight > 0 {
                thread.arrived_during_initial.push(message.clone());
            }
            let outcome = merge::insert_ordered(&mut thread.messages, message.clone());

            match outcome {
                MergeOutcome::Inserted { index } => {
                    tracing::debug!("[SYNC] Merged {} into {} at {}", message.id, conversation_id, index);
                    changes.push(StoreChange::MessagesChanged {
                        conversation_id: conversation_id.clone(),
                    });

                    let conversation = state.conversations.entry_for_message(&message);
                    conversation.update_last_message(&message);
                    if !message.is_outgoing && !is_active {
                        conversation.unread_count = conversation.unread_count.saturating_add(1);
                    }
                    changes.push(StoreChange::ConversationUpdated {
                        id: conversation_id.clone(),
                    });
                }
                MergeOutcome::StatusAdvanced => {
                    tracing::debug!("[SYNC] {} advanced to {}", message.id, message.status.as_str());
                    changes.push(StoreChange::MessagesChanged {
                        conversation_id: conversation_id.clone(),
                    });
                }
                MergeOutcome::Duplicate => {
                    tracing::debug!("[SYNC] Ignoring duplicate {}", message.id);
                }
            }
        }

        let changed = !changes.is_empty();
        self.publish(changes);
        changed
    }

    /// Send a text message. No optimistic insert: the message appears in
    /// the store once the server acknowledges it with its id.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send_outgoing(&self, conversation_id: &str, text: &str) -> Result<PendingSend, SyncError> {
        let text = validate_text(text)
            .map_err(PreconditionError::from)?
            .to_string();
        let id = Uuid::new_v4();
        let controller = self.clone();
        let target = conversation_id.to_string();
        let handle = tokio::spawn(async move { controller.deliver(target, text).await });

        tracing::debug!("[SYNC] Sending {} to {}", id, conversation_id);
        Ok(PendingSend {
            id,
            conversation_id: conversation_id.to_string(),
            handle,
        })
    }

    async fn deliver(&self, conversation_id: String, text: String) -> Result<Message, SyncError> {
        let contact_name = self
            .conversation(&conversation_id)
            .await
            .map(|c| c.contact_name)
            .filter(|name| !name.is_empty());
        let mut message = self
            .timed(
                self.inner
                    .rest
                    .post_message(&conversation_id, &text, contact_name.as_deref()),
            )
            .await
            .map_err(|e| {
                tracing::error!("[SYNC] Send to {} failed: {}", conversation_id, e);
                SyncError::Send(e)
            })?;

        message.is_outgoing = true;
        self.receive_live_message(message.clone()).await;
        Ok(message)
    }

    /// Acknowledge a conversation as read. Local unread count is reset only
    /// after the server accepted the acknowledgement.
    pub async fn mark_read(&self, conversation_id: &str) -> Result<(), SyncError> {
        self.timed(self.inner.rest.mark_read(conversation_id))
            .await
            .map_err(|e| {
                tracing::error!("[SYNC] Mark read of {} failed: {}", conversation_id, e);
                SyncError::Send(e)
            })?;

        let changed = {
            let mut state = self.inner.state.write().await;
            match state.conversations.get_mut(conversation_id) {
                Some(conversation) if conversation.unread_count > 0 => {
                    conversation.unread_count = 0;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.publish(vec![StoreChange::ConversationUpdated {
                id: conversation_id.to_string(),
            }]);
        }
        Ok(())
    }

    /// Advance the status of a known message. Unknown ids are ignored.
    pub async fn apply_status_update(&self, update: StatusUpdate) -> bool {
        let advanced = {
            let mut state = self.inner.state.write().await;
            state
                .messages
                .existing_mut(&update.conversation_id)
                .and_then(|thread| thread.messages.iter_mut().find(|m| m.id == update.message_id))
                .is_some_and(|message| message.status.advance(update.status))
        };
        if advanced {
            tracing::debug!("[SYNC] {} is now {}", update.message_id, update.status.as_str());
            self.publish(vec![StoreChange::MessagesChanged {
                conversation_id: update.conversation_id,
            }]);
        } else {
            tracing::trace!("[SYNC] Status update for {} not applied", update.message_id);
        }
        advanced
    }

    /// Record a contact going online or offline. Unknown ids are ignored.
    pub async fn set_presence(&self, conversation_id: &str, online: bool) -> bool {
        let changed = {
            let mut state = self.inner.state.write().await;
            match state.conversations.get_mut(conversation_id) {
                Some(conversation) if conversation.is_online != online => {
                    conversation.is_online = online;
                    if !online {
                        conversation.last_seen = Some(Timestamp::now().to_rfc3339());
                    }
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.publish(vec![StoreChange::ConversationUpdated {
                id: conversation_id.to_string(),
            }]);
        }
        changed
    }

    /// Apply one event from the live channel
    pub async fn handle_live_event(&self, event: LiveEvent) {
        match event {
            LiveEvent::Connected => self.set_connectivity(ConnectionStatus::Connected).await,
            LiveEvent::Disconnected => self.set_connectivity(ConnectionStatus::Disconnected).await,
            LiveEvent::AuthError(reason) => {
                tracing::error!("[SYNC] Live channel rejected credentials: {}", reason);
                self.set_connectivity(ConnectionStatus::AuthFailed(reason)).await
            }
            LiveEvent::MessageReceived(message) => {
                self.receive_live_message(message).await;
            }
            LiveEvent::StatusUpdated(update) => {
                self.apply_status_update(update).await;
            }
            LiveEvent::Presence { user_id, online } => {
                self.set_presence(&user_id, online).await;
            }
            LiveEvent::Typing { user_id, typing } => {
                tracing::trace!("[SYNC] {} typing={}", user_id, typing);
                self.publish(vec![StoreChange::Typing {
                    conversation_id: user_id,
                    typing,
                }]);
            }
        }
    }

    /// Drain a live subscription into the stores until it ends
    pub async fn run_live(&self, subscription: &mut LiveSubscription) {
        self.set_connectivity(ConnectionStatus::Connecting).await;
        while let Some(event) = subscription.recv().await {
            self.handle_live_event(event).await;
        }
        if !matches!(self.connectivity().await, ConnectionStatus::AuthFailed(_)) {
            self.set_connectivity(ConnectionStatus::Disconnected).await;
        }
        tracing::info!("[SYNC] Live subscription ended");
    }

    async fn set_connectivity(&self, status: ConnectionStatus) {
        let changed = {
            let mut state = self.inner.state.write().await;
            if state.connectivity == status {
                false
            } else {
                state.connectivity = status.clone();
                true
            }
        };
        if changed {
            tracing::info!("[SYNC] Connectivity: {:?}", status);
            self.publish(vec![StoreChange::ConnectivityChanged(status)]);
        }
    }

    fn publish(&self, changes: Vec<StoreChange>) {
        for change in changes {
            self.inner.notifier.notify(change);
        }
    }

    async fn timed<T, F>(&self, call: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        with_timeout(self.inner.settings.request_timeout, call).await
    }
}

async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}
