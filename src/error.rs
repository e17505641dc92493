//! Error taxonomy.
//!
//! Tool errors never leave the dispatcher: they become tool-result text the
//! model can react to. Turn errors end the current turn but not the session.
//! Schema and config errors are fatal at startup.

use std::path::PathBuf;

/// Failure resolving or running a tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    pub fn execution(tool: impl Into<String>, source: &anyhow::Error) -> Self {
        Self::Execution {
            tool: tool.into(),
            message: format!("{source:#}"),
        }
    }
}

/// The tool schema document could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SchemaLoadError {
    #[error("failed to read tool schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tool schema is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("tool schema entry {index} is invalid: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("tool '{0}' is declared more than once")]
    Duplicate(String),
}

/// An unrecoverable failure of a single user turn.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("malformed response stream: {0}")]
    StreamProtocol(String),

    #[error("model endpoint error: {message}")]
    Endpoint { message: String, retryable: bool },

    #[error("tool loop exceeded {limit} iterations")]
    ToolLoopLimit { limit: usize },
}

impl TurnError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Endpoint { retryable: true, .. })
    }

    /// The final form of a retryable error once the retry budget is spent.
    #[must_use]
    pub fn into_exhausted(self, retries: u32) -> Self {
        match self {
            Self::Endpoint { message, .. } => Self::Endpoint {
                message: format!("{message} (after {retries} retries)"),
                retryable: false,
            },
            other => other,
        }
    }

    /// Text suitable for showing to the end user. Endpoint details stay in
    /// the logs.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::StreamProtocol(_) => "The model returned a response I could not understand.",
            Self::Endpoint { .. } => "The model service is unavailable right now.",
            Self::ToolLoopLimit { .. } => "I could not finish this request with the tools available.",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    MissingVar(&'static str),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}
