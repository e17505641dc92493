//! Declarative tool descriptions in the endpoint's wire format.
//!
//! The document is a JSON array of
//! `{"type": "function", "function": {name, description, parameters}}`
//! entries. It is loaded and validated once, before a session exists.

use crate::error::SchemaLoadError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_SCHEMA: &str = include_str!("../tools.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: Value,
}

/// One entry of the `tools` array sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolDescriptor,
}

impl From<ToolDescriptor> for ToolSpec {
    fn from(function: ToolDescriptor) -> Self {
        Self {
            kind: "function".to_string(),
            function,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolSchemaProvider {
    descriptors: Vec<ToolDescriptor>,
}

impl ToolSchemaProvider {
    /// The schema for the four built-in tools.
    ///
    /// # Errors
    /// Only fails if the embedded document is itself invalid.
    pub fn builtin() -> Result<Self, SchemaLoadError> {
        Self::from_json_str(BUILTIN_SCHEMA)
    }

    /// # Errors
    /// Returns `SchemaLoadError` if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaLoadError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let provider = Self::from_json_str(&raw)?;
        log::info!(
            "loaded tool schema path={} tools={}",
            path.display(),
            provider.descriptors.len()
        );
        Ok(provider)
    }

    /// # Errors
    /// Returns `SchemaLoadError` if `raw` is not a valid schema document.
    pub fn from_json_str(raw: &str) -> Result<Self, SchemaLoadError> {
        let document: Value = serde_json::from_str(raw)?;
        let Value::Array(entries) = document else {
            return Err(SchemaLoadError::InvalidEntry {
                index: 0,
                reason: "schema document must be a JSON array".to_string(),
            });
        };

        let descriptors = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| parse_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_descriptors(descriptors)
    }

    /// # Errors
    /// Returns `SchemaLoadError` on an invalid or duplicate descriptor.
    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Result<Self, SchemaLoadError> {
        let mut seen = HashSet::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            validate_descriptor(index, descriptor)?;
            if !seen.insert(descriptor.name.as_str()) {
                return Err(SchemaLoadError::Duplicate(descriptor.name.clone()));
            }
        }
        Ok(Self { descriptors })
    }

    /// The descriptor list converted to the endpoint's `tools` array.
    #[must_use]
    pub fn schema(&self) -> Vec<ToolSpec> {
        self.descriptors.iter().cloned().map(ToolSpec::from).collect()
    }

    #[must_use]
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn parse_entry(index: usize, entry: Value) -> Result<ToolDescriptor, SchemaLoadError> {
    let invalid = |reason: &str| SchemaLoadError::InvalidEntry {
        index,
        reason: reason.to_string(),
    };

    let kind = entry.get("type").and_then(Value::as_str);
    if kind != Some("function") {
        return Err(invalid("\"type\" must be \"function\""));
    }
    let function = entry
        .get("function")
        .cloned()
        .ok_or_else(|| invalid("missing \"function\" object"))?;
    if function
        .get("description")
        .is_some_and(|d| !d.is_string())
    {
        return Err(invalid("\"description\" must be a string"));
    }
    serde_json::from_value(function).map_err(|e| invalid(&e.to_string()))
}

fn validate_descriptor(index: usize, descriptor: &ToolDescriptor) -> Result<(), SchemaLoadError> {
    let invalid = |reason: String| SchemaLoadError::InvalidEntry { index, reason };

    if descriptor.name.trim().is_empty() {
        return Err(invalid("tool name must not be empty".to_string()));
    }
    let Some(parameters) = descriptor.parameters.as_object() else {
        return Err(invalid(format!(
            "parameters of '{}' must be a JSON object",
            descriptor.name
        )));
    };
    if parameters.get("type").and_then(Value::as_str) != Some("object") {
        return Err(invalid(format!(
            "parameters of '{}' must declare \"type\": \"object\"",
            descriptor.name
        )));
    }
    Ok(())
}
