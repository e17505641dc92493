//! Tasuku - a tool-calling chat assistant.
//!
//! This crate provides:
//! - A response loop that alternates between model calls and tool dispatch
//! - A streaming provider for the Mistral chat completions API
//! - A tool registry with stock quote, web search and to-do tools
//! - Sessions whose history hides tool traffic once a turn is done
//!
//! # Example
//!
//! ```ignore
//! use tasuku::{ChatConfig, ResponseLoop, ToolRegistry, ToolSchemaProvider};
//! use tasuku::providers::MistralProvider;
//!
//! let chat = ResponseLoop::builder(MistralProvider::new(api_key))
//!     .tools(ToolRegistry::new())
//!     .schema(ToolSchemaProvider::builtin()?)
//!     .config(ChatConfig::default())
//!     .build();
//!
//! let mut session = chat.new_session();
//! let outcome = chat.run_turn(&mut session, "Hello!", None).await?;
//! println!("{}", outcome.text);
//! ```

#![forbid(unsafe_code)]

mod chat_loop;
pub mod config;
mod conversation;
mod dispatch;
mod error;
mod events;
pub mod llm;
mod models;
pub mod providers;
mod schema;
mod session;
pub mod stocks;
pub mod todo;
mod tools;
mod types;
pub mod web;

pub use chat_loop::{ResponseLoop, ResponseLoopBuilder, TurnOutcome};
pub use conversation::ConversationStore;
pub use dispatch::ToolCallDispatcher;
pub use error::{ConfigError, SchemaLoadError, ToolError, TurnError};
pub use events::ChatEvent;
pub use llm::LlmProvider;
pub use models::{
    DEFAULT_MODEL, MODEL_MISTRAL_LARGE, MODEL_MISTRAL_SMALL, MODEL_OPEN_MISTRAL_7B,
    MODEL_OPEN_MIXTRAL_8X22B, ModelCatalog, ModelInfo,
};
pub use schema::{ToolDescriptor, ToolSchemaProvider, ToolSpec};
pub use session::{Session, SessionId};
pub use tools::{
    BuiltinToolName, DynamicToolName, ErasedTool, Tool, ToolArgs, ToolName, ToolRegistry,
    decode_args,
};
pub use types::{ChatConfig, RetryConfig, SamplingParams, TokenUsage, ToolResult};
