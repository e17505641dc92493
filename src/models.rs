//! Known models and their capabilities.

use std::collections::BTreeMap;

pub const MODEL_OPEN_MISTRAL_7B: &str = "open-mistral-7b";
pub const MODEL_OPEN_MIXTRAL_8X22B: &str = "open-mixtral-8x22b";
pub const MODEL_MISTRAL_SMALL: &str = "mistral-small-latest";
pub const MODEL_MISTRAL_LARGE: &str = "mistral-large-latest";

pub const DEFAULT_MODEL: &str = MODEL_OPEN_MISTRAL_7B;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    /// Whether the endpoint accepts `tools` / `tool_choice` for this model.
    pub supports_tools: bool,
}

impl ModelInfo {
    #[must_use]
    pub fn new(id: impl Into<String>, supports_tools: bool) -> Self {
        Self {
            id: id.into(),
            supports_tools,
        }
    }
}

/// Model id to capability lookup.
#[derive(Clone, Debug)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelInfo>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::empty()
            .with_model(ModelInfo::new(MODEL_OPEN_MISTRAL_7B, false))
            .with_model(ModelInfo::new(MODEL_OPEN_MIXTRAL_8X22B, true))
            .with_model(ModelInfo::new(MODEL_MISTRAL_SMALL, true))
            .with_model(ModelInfo::new(MODEL_MISTRAL_LARGE, true))
    }
}

impl ModelCatalog {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }

    /// Add a model, replacing any existing entry with the same id.
    #[must_use]
    pub fn with_model(mut self, info: ModelInfo) -> Self {
        self.models.insert(info.id.clone(), info);
        self
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ModelInfo> {
        self.models.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    /// Unlisted models are treated as tool-less.
    #[must_use]
    pub fn supports_tools(&self, id: &str) -> bool {
        self.get(id).is_some_and(|m| m.supports_tools)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}
