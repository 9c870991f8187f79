use serde::{Deserialize, Serialize};

use super::message::Message;

/// An ordered transcript of messages, oldest first. Serializes as a bare JSON
/// array, which is also the layout version-zero records used on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Conversation::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Conversation { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message and return its index, which stays valid until the
    /// conversation is cleared.
    pub fn push(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Message> {
        self.messages.get_mut(index)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Message> {
        self.messages.iter_mut()
    }

    /// Split the transcript into prior turns and the current one. The provider
    /// payload treats the last message as the prompt and everything before it
    /// as history.
    pub fn split_current(&self) -> Option<(&[Message], &Message)> {
        let (current, history) = self.messages.split_last()?;
        Some((history, current))
    }

    /// The turns worth putting on the wire. Replies still in flight are
    /// client-side scaffolding, and messages with neither text nor an
    /// attachment carry nothing the provider could use; both stay home. An
    /// errored reply that did receive fragments is kept, since the patient
    /// saw that text and may refer back to it.
    pub fn sendable(&self) -> Conversation {
        Conversation {
            messages: self
                .messages
                .iter()
                .filter(|message| !message.status.is_in_flight() && message.has_substance())
                .cloned()
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
