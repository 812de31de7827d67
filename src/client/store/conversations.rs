use std::collections::HashMap;

use crate::shared::messaging::{Conversation, ConversationFilter, Message};

/// Conversation id to summary. At most one entry per id; entries are
/// never removed.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    entries: HashMap<String, Conversation>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Conversations matching `filter`, most recent message first.
    /// Conversations without messages come last, ordered by id.
    pub fn list(&self, filter: ConversationFilter) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> =
            self.entries.values().filter(|c| filter.matches(c)).collect();
        list.sort_by(|a, b| {
            b.last_message_time
                .cmp(&a.last_message_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        list
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_unread(&self) -> u32 {
        self.entries.values().map(|c| c.unread_count).sum()
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.entries.get_mut(id)
    }

    /// Merge a server summary into the store.
    ///
    /// The server is authoritative for the contact, unread count and
    /// presence. The local last message wins when it is strictly newer,
    /// since a live message may have landed after the server built its
    /// response.
    pub(crate) fn upsert(&mut self, incoming: Conversation) {
        match self.entries.get_mut(&incoming.id) {
            Some(existing) => {
                let local_newer = match (existing.last_message_time, incoming.last_message_time) {
                    (Some(local), Some(remote)) => local > remote,
                    (Some(_), None) => true,
                    _ => false,
                };
                let (last_message, last_message_time) = if local_newer {
                    (std::mem::take(&mut existing.last_message), existing.last_message_time)
                } else {
                    (incoming.last_message, incoming.last_message_time)
                };
                if !incoming.contact_name.is_empty() {
                    existing.contact_name = incoming.contact_name;
                }
                existing.last_message = last_message;
                existing.last_message_time = last_message_time;
                existing.unread_count = incoming.unread_count;
                existing.is_online = incoming.is_online;
                existing.last_seen = incoming.last_seen;
            }
            None => {
                self.entries.insert(incoming.id.clone(), incoming);
            }
        }
    }

    pub(crate) fn merge_all(&mut self, conversations: Vec<Conversation>) -> usize {
        let count = conversations.len();
        for conversation in conversations {
            self.upsert(conversation);
        }
        count
    }

    /// Summary for the message's conversation, created on first sight
    pub(crate) fn entry_for_message(&mut self, message: &Message) -> &mut Conversation {
        self.entries
            .entry(message.conversation_id.clone())
            .or_insert_with(|| {
                tracing::debug!("[STORE] new conversation {}", message.conversation_id);
                Conversation::from_message(message)
            })
    }
}
