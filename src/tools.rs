//! Tool definition and registry.
//!
//! - [`Tool`] trait - Define tools the model can call
//! - [`ToolName`] trait - Strongly-typed tool names
//! - [`BuiltinToolName`] - Names of the bundled tools
//! - [`DynamicToolName`] - Names created at runtime
//! - [`ToolRegistry`] - Collection of available tools
//!
//! # Implementing a Tool
//!
//! ```ignore
//! use tasuku::{DynamicToolName, Tool, ToolArgs};
//!
//! struct Echo;
//!
//! // No #[async_trait] needed - Rust 1.75+ supports native async traits
//! impl Tool for Echo {
//!     type Name = DynamicToolName;
//!
//!     fn name(&self) -> DynamicToolName { DynamicToolName::new("echo") }
//!     fn description(&self) -> &'static str { "Repeats its input" }
//!     fn input_schema(&self) -> Value { json!({ "type": "object" }) }
//!
//!     async fn execute(&self, args: ToolArgs) -> anyhow::Result<String> {
//!         Ok(Value::Object(args).to_string())
//!     }
//! }
//! ```

use crate::error::ToolError;
use crate::schema::ToolDescriptor;
use crate::stocks::{StockPriceTool, YahooFinanceProvider};
use crate::todo::{ReadTodosTool, SaveTodoTool, TodoStore};
use crate::web::{BingSearchProvider, BingSearchTool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

pub use crate::llm::ToolArgs;

// ============================================================================
// Tool Name Types
// ============================================================================

/// Marker trait for tool names.
pub trait ToolName: Send + Sync + 'static {
    /// The name the model uses to call the tool.
    fn as_str(&self) -> &str;
}

/// Names of the tools shipped with the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinToolName {
    GetStockPrice,
    BingSearch,
    SaveTodo,
    ReadTodos,
}

impl ToolName for BuiltinToolName {
    fn as_str(&self) -> &str {
        match self {
            Self::GetStockPrice => "get_stock_price",
            Self::BingSearch => "bing_search",
            Self::SaveTodo => "save_todo",
            Self::ReadTodos => "read_todos",
        }
    }
}

/// Tool name for tools created at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DynamicToolName(String);

impl DynamicToolName {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl ToolName for DynamicToolName {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Decode the argument map into the tool's typed parameters.
///
/// # Errors
/// Returns an error naming the tool when the arguments do not match.
pub fn decode_args<T: DeserializeOwned>(tool: &str, args: ToolArgs) -> Result<T> {
    serde_json::from_value(Value::Object(args))
        .with_context(|| format!("invalid arguments for {tool}"))
}

// ============================================================================
// Tool Trait
// ============================================================================

/// A function the model can call.
///
/// Every tool has the same shape: a JSON argument map in, a string out.
/// Each implementation decodes its own typed parameters.
///
/// This trait uses Rust's native async functions in traits.
/// You do NOT need the `async_trait` crate to implement this trait.
pub trait Tool: Send + Sync {
    /// The type of name for this tool.
    type Name: ToolName;

    /// Returns the tool's strongly-typed name.
    fn name(&self) -> Self::Name;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &'static str;

    /// JSON schema for the tool's input parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// # Errors
    /// Returns an error if tool execution fails.
    fn execute(&self, args: ToolArgs) -> impl Future<Output = Result<String>> + Send;
}

// ============================================================================
// Type-Erased Tool (for Registry)
// ============================================================================

/// Type-erased tool trait for registry storage.
#[async_trait]
pub trait ErasedTool: Send + Sync {
    fn name_str(&self) -> &str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    /// Execute the tool, converting failures to `ToolError::Execution`.
    async fn call(&self, args: ToolArgs) -> Result<String, ToolError>;
}

/// Wrapper that erases the Name associated type from a Tool.
struct ToolWrapper<T: Tool> {
    inner: T,
    name_cache: String,
}

impl<T: Tool> ToolWrapper<T> {
    fn new(tool: T) -> Self {
        let name_cache = tool.name().as_str().to_string();
        Self {
            inner: tool,
            name_cache,
        }
    }
}

#[async_trait]
impl<T> ErasedTool for ToolWrapper<T>
where
    T: Tool + 'static,
{
    fn name_str(&self) -> &str {
        &self.name_cache
    }

    fn description(&self) -> &'static str {
        self.inner.description()
    }

    fn input_schema(&self) -> Value {
        self.inner.input_schema()
    }

    async fn call(&self, args: ToolArgs) -> Result<String, ToolError> {
        self.inner
            .execute(args)
            .await
            .map_err(|e| ToolError::execution(&self.name_cache, &e))
    }
}

// ============================================================================
// Tool Registry
// ============================================================================

/// Name to callable lookup.
///
/// The registry does not validate arguments against the schema; shape
/// mismatches surface as execution errors from the tool's own decoding.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ErasedTool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The four bundled tools. Both todo tools share `todos`.
    #[must_use]
    pub fn builtin(bing_api_key: Option<String>, todos: Arc<RwLock<TodoStore>>) -> Self {
        let mut registry = Self::new();
        registry
            .register(StockPriceTool::new(YahooFinanceProvider::new()))
            .register(BingSearchTool::new(BingSearchProvider::new(bing_api_key)))
            .register(SaveTodoTool::new(Arc::clone(&todos)))
            .register(ReadTodosTool::new(todos));
        registry
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register<T>(&mut self, tool: T) -> &mut Self
    where
        T: Tool + 'static,
    {
        let wrapper = ToolWrapper::new(tool);
        let name = wrapper.name_str().to_string();
        if self.tools.insert(name.clone(), Arc::new(wrapper)).is_some() {
            log::warn!("replacing already registered tool name={name}");
        }
        self
    }

    /// # Errors
    /// Returns `ToolError::Unknown` if no tool has this name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ErasedTool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::Unknown(name.to_string()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ErasedTool>> {
        self.tools.get(name)
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Removes tools for which the predicate returns false.
    /// The predicate receives the tool name.
    ///
    /// ```ignore
    /// registry.filter(|name| name != "bing_search");
    /// ```
    pub fn filter<F>(&mut self, predicate: F)
    where
        F: Fn(&str) -> bool,
    {
        self.tools.retain(|name, _| predicate(name));
    }

    /// Descriptors derived from the registered tools, sorted by name.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<_> = self
            .tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name_str().to_string(),
                description: tool.description().to_string(),
                parameters: tool.input_schema(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }
}
