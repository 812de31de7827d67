use std::collections::HashMap;

use crate::shared::messaging::Message;

/// Pagination position of a conversation's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    /// Last page fetched, 1-indexed
    pub page: u32,
    pub has_more: bool,
}

/// Per-conversation state held by the message store
#[derive(Debug, Clone, Default)]
pub(crate) struct Thread {
    /// Identifies this incarnation of the thread; a forgotten and recreated
    /// thread gets a new value, so late results for the old one are dropped
    pub(crate) generation: u64,
    pub(crate) messages: Vec<Message>,
    /// `None` until the initial page has been applied
    pub(crate) cursor: Option<PageCursor>,
    pub(crate) older_in_flight: bool,
    /// Bumped to cancel an in-flight older page load
    pub(crate) older_token: u64,
    pub(crate) initial_in_flight: u32,
    /// Live messages merged while an initial page was in flight; replayed
    /// over the page once it lands
    pub(crate) arrived_during_initial: Vec<Message>,
}

impl Thread {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }
}

/// Conversation id to ordered message sequence plus pagination cursor
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    threads: HashMap<String, Thread>,
    next_generation: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages of a conversation, oldest first
    pub fn get(&self, conversation_id: &str) -> Option<&[Message]> {
        self.threads.get(conversation_id).map(|t| t.messages.as_slice())
    }

    /// Messages of a conversation matching `predicate`, oldest first
    pub fn list<F>(&self, conversation_id: &str, predicate: F) -> Vec<&Message>
    where
        F: Fn(&Message) -> bool,
    {
        self.get(conversation_id)
            .map(|messages| messages.iter().filter(|m| predicate(m)).collect())
            .unwrap_or_default()
    }

    pub fn cursor(&self, conversation_id: &str) -> Option<PageCursor> {
        self.thread(conversation_id).and_then(|t| t.cursor)
    }

    pub fn is_loading_older(&self, conversation_id: &str) -> bool {
        self.thread(conversation_id).is_some_and(|t| t.older_in_flight)
    }

    pub fn contains(&self, conversation_id: &str, message_id: &str) -> bool {
        self.get(conversation_id)
            .is_some_and(|messages| messages.iter().any(|m| m.id == message_id))
    }

    pub fn newest(&self, conversation_id: &str) -> Option<&Message> {
        self.get(conversation_id).and_then(|messages| messages.last())
    }

    pub(crate) fn thread(&self, conversation_id: &str) -> Option<&Thread> {
        self.threads.get(conversation_id)
    }

    /// Thread for `conversation_id`, created on first use
    pub(crate) fn thread_mut(&mut self, conversation_id: &str) -> &mut Thread {
        let next_generation = &mut self.next_generation;
        self.threads
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                *next_generation += 1;
                Thread::new(*next_generation)
            })
    }

    pub(crate) fn existing_mut(&mut self, conversation_id: &str) -> Option<&mut Thread> {
        self.threads.get_mut(conversation_id)
    }

    /// Thread for `conversation_id` only if it is still the incarnation
    /// identified by `generation`
    pub(crate) fn thread_mut_if(&mut self, conversation_id: &str, generation: u64) -> Option<&mut Thread> {
        self.threads
            .get_mut(conversation_id)
            .filter(|t| t.generation == generation)
    }

    /// Cancel an in-flight older page load. Returns whether one was running.
    pub(crate) fn cancel_older_load(&mut self, conversation_id: &str) -> bool {
        match self.threads.get_mut(conversation_id) {
            Some(thread) if thread.older_in_flight => {
                thread.older_in_flight = false;
                thread.older_token += 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove(&mut self, conversation_id: &str) -> bool {
        self.threads.remove(conversation_id).is_some()
    }
}
