//! Per-user chat session: history plus the settings that shape each call.

use crate::conversation::ConversationStore;
use crate::error::ConfigError;
use crate::llm::Message;
use crate::models::ModelCatalog;
use crate::types::{ChatConfig, SamplingParams};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a chat session
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns the conversation history exclusively. A turn borrows the session
/// mutably for its whole duration.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    conversation: ConversationStore,
    model: String,
    system_prompt: String,
    sampling: SamplingParams,
}

impl Session {
    #[must_use]
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            id: SessionId::new(),
            conversation: ConversationStore::new(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            sampling: config.sampling,
        }
    }

    /// Discard the history and start over under a fresh id. The selected
    /// model, sampling parameters and system prompt are kept.
    pub fn reset(&mut self) {
        let previous = std::mem::replace(&mut self.id, SessionId::new());
        self.conversation = ConversationStore::new();
        log::info!("session reset previous={previous} new={}", self.id);
    }

    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// # Errors
    /// Returns `ConfigError::UnknownModel` if the catalog does not list `id`.
    pub fn set_model(&mut self, id: &str, catalog: &ModelCatalog) -> Result<(), ConfigError> {
        if !catalog.contains(id) {
            return Err(ConfigError::UnknownModel(id.to_string()));
        }
        self.model = id.to_string();
        Ok(())
    }

    #[must_use]
    pub const fn sampling(&self) -> SamplingParams {
        self.sampling
    }

    /// # Errors
    /// Returns `ConfigError::OutOfRange` if any parameter is out of bounds.
    pub fn set_sampling(&mut self, sampling: SamplingParams) -> Result<(), ConfigError> {
        sampling.validate()?;
        self.sampling = sampling;
        Ok(())
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Takes effect for conversations that do not have a system message yet.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    pub fn sync_system_prompt(&mut self) {
        self.conversation.ensure_system_prompt(&self.system_prompt);
    }

    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.conversation.visible_messages()
    }

    #[must_use]
    pub const fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub const fn conversation_mut(&mut self) -> &mut ConversationStore {
        &mut self.conversation
    }
}
