//! Ordered message history for one session.
//!
//! Holds at most one system message, always at position 0.

use crate::llm::{Message, Role};

#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a system message at position 0 unless one already exists.
    /// An existing system message is never rewritten; an empty prompt is a
    /// no-op.
    pub fn ensure_system_prompt(&mut self, prompt: &str) {
        if prompt.is_empty() || self.has_system() {
            return;
        }
        self.messages.insert(0, Message::system(prompt));
    }

    /// Append a message.
    ///
    /// A system message goes to position 0 when the store has none and is
    /// dropped when it already has one.
    pub fn append(&mut self, message: Message) {
        if message.role == Role::System {
            if self.has_system() {
                log::warn!("dropping second system message, conversation already has one");
                return;
            }
            self.messages.insert(0, message);
            return;
        }
        self.messages.push(message);
    }

    /// Messages the UI may show: everything except the system prompt.
    /// Ephemeral turns are pruned by the loop before a turn completes.
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// Remove messages matching `predicate`, keeping relative order of the
    /// rest. Returns the removed messages.
    pub fn prune_ephemeral<F>(&mut self, predicate: F) -> Vec<Message>
    where
        F: Fn(&Message) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.messages).into_iter().partition(|m| predicate(m));
        self.messages = kept;
        removed
    }

    pub fn prune_ephemeral_turns(&mut self) -> Vec<Message> {
        self.prune_ephemeral(|m| m.ephemeral)
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[must_use]
    pub fn has_system(&self) -> bool {
        self.messages.first().is_some_and(Message::is_system)
    }

    #[must_use]
    pub fn has_ephemeral(&self) -> bool {
        self.messages.iter().any(|m| m.ephemeral)
    }
}
