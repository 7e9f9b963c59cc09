// src/message_list.rs
//! Ordered, de-duplicated list of visible messages for one conversation.
//!
//! All three input streams funnel through here: the bulk fetch
//! (`replace_all`), local optimistic sends (`push_provisional`, later
//! `confirm` or `mark_failed`) and realtime creations (`apply_remote`).
//! Identifiers are unique and entries stay in append order.

use crate::models::chat::{Delivery, Message};

#[derive(Debug, Clone, Default)]
pub struct MessageList {
    messages: Vec<Message>,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|message| message.id == id)
    }

    /// Replaces the whole list with a fresh fetch. Repeated ids in the fetch
    /// keep their first occurrence.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages.clear();
        for message in messages {
            if !self.contains(&message.id) {
                self.messages.push(message);
            }
        }
    }

    pub fn push_provisional(&mut self, message: Message) {
        if !self.contains(&message.id) {
            self.messages.push(message);
        }
    }

    /// Appends a realtime creation unless it was written by `local_user_id`
    /// or its id is already visible. Returns whether the list changed.
    pub fn apply_remote(&mut self, message: Message, local_user_id: &str) -> bool {
        if message.user_id == local_user_id {
            tracing::trace!(message_id = %message.id, "Ignoring own realtime message");
            return false;
        }
        if self.contains(&message.id) {
            tracing::trace!(message_id = %message.id, "Ignoring duplicate realtime message");
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Swaps a provisional entry for the stored record in place. If the stored
    /// id is already visible the provisional entry is dropped instead.
    pub fn confirm(&mut self, provisional_id: &str, stored: Message) -> bool {
        let already_visible = self.contains(&stored.id);

        match self.position(provisional_id) {
            Some(index) if already_visible => {
                self.messages.remove(index);
                true
            }
            Some(index) => {
                self.messages[index] = stored;
                true
            }
            // The provisional entry was replaced by a reload in the meantime
            None if !already_visible => {
                self.messages.push(stored);
                true
            }
            None => false,
        }
    }

    pub fn mark_failed(&mut self, provisional_id: &str) -> bool {
        match self.position(provisional_id) {
            Some(index) => {
                self.messages[index].delivery = Delivery::Failed;
                true
            }
            None => false,
        }
    }
}
