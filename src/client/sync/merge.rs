//! Message Sequence Merge Rules
//!
//! Every function here preserves the two sequence invariants:
//!
//! - sorted non-decreasing by timestamp
//! - unique by message id
//!
//! Equal timestamps keep arrival order: a new message goes after the last
//! entry with the same timestamp.

use std::collections::{HashMap, HashSet};

use crate::shared::messaging::Message;

/// Result of merging a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New id, inserted at `index`
    Inserted { index: usize },
    /// Known id whose status moved forward
    StatusAdvanced,
    /// Known id, nothing changed
    Duplicate,
}

/// Insert one message at its ordered position, or advance the status of
/// the stored copy if the id is already present.
pub fn insert_ordered(sequence: &mut Vec<Message>, message: Message) -> MergeOutcome {
    if let Some(existing) = sequence.iter_mut().find(|m| m.id == message.id) {
        return if existing.status.advance(message.status) {
            MergeOutcome::StatusAdvanced
        } else {
            MergeOutcome::Duplicate
        };
    }

    let index = sequence.partition_point(|m| m.timestamp <= message.timestamp);
    sequence.insert(index, message);
    MergeOutcome::Inserted { index }
}

/// Replace the whole sequence with a freshly fetched page
pub fn replace_with_page(sequence: &mut Vec<Message>, page: Vec<Message>) {
    *sequence = normalize(page);
}

/// Merge an older page in front of the sequence. Ids already present only
/// advance their status. Returns how many messages were added.
pub fn prepend_page(sequence: &mut Vec<Message>, page: Vec<Message>) -> usize {
    let positions: HashMap<String, usize> = sequence
        .iter()
        .enumerate()
        .map(|(index, m)| (m.id.clone(), index))
        .collect();
    let mut fresh = Vec::new();
    for message in page {
        match positions.get(&message.id) {
            Some(&index) => {
                sequence[index].status.advance(message.status);
            }
            None => fresh.push(message),
        }
    }
    let fresh = normalize(fresh);
    let added = fresh.len();

    let fits_in_front = match (fresh.last(), sequence.first()) {
        (Some(last), Some(first)) => last.timestamp <= first.timestamp,
        _ => true,
    };

    if fits_in_front {
        sequence.splice(0..0, fresh);
    } else {
        // Page overlaps the loaded range (live messages raced the fetch)
        for message in fresh {
            insert_ordered(sequence, message);
        }
    }
    added
}

/// Whether a sequence satisfies the ordering and uniqueness invariants
pub fn is_consistent(sequence: &[Message]) -> bool {
    let sorted = sequence.windows(2).all(|w| w[0].timestamp <= w[1].timestamp);
    let mut seen = HashSet::with_capacity(sequence.len());
    sorted && sequence.iter().all(|m| seen.insert(m.id.as_str()))
}

/// Stable sort by timestamp, then drop repeated ids keeping the first
fn normalize(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by_key(|m| m.timestamp);
    let mut seen = HashSet::with_capacity(messages.len());
    messages.retain(|m| seen.insert(m.id.clone()));
    messages
}
