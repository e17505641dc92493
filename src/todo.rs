//! Daily to-do list tools.
//!
//! Tasks are stored with the date they were saved on. `read_todos` only
//! reports the tasks of the current day.
//!
//! # Example
//!
//! ```no_run
//! use tasuku::todo::{ReadTodosTool, SaveTodoTool, TodoStore};
//! use std::sync::Arc;
//! use tokio::sync::RwLock;
//!
//! let store = Arc::new(RwLock::new(TodoStore::with_storage("todos.json".into())));
//! let save_tool = SaveTodoTool::new(Arc::clone(&store));
//! let read_tool = ReadTodosTool::new(store);
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::tools::{BuiltinToolName, Tool, ToolArgs, decode_args};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::{Date, OffsetDateTime};
use tokio::sync::RwLock;

/// A saved task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Day the task was saved, `YYYY-MM-DD`.
    pub date: String,
    pub task: String,
}

impl TodoItem {
    #[must_use]
    pub fn new(date: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            task: task.into(),
        }
    }
}

/// To-do items, optionally persisted as a JSON array.
#[derive(Debug, Default)]
pub struct TodoStore {
    items: Vec<TodoItem>,
    storage_path: Option<PathBuf>,
}

impl TodoStore {
    /// Creates an in-memory store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            storage_path: None,
        }
    }

    /// Creates a store backed by the given file.
    #[must_use]
    pub const fn with_storage(path: PathBuf) -> Self {
        Self {
            items: Vec::new(),
            storage_path: Some(path),
        }
    }

    /// Loads items from storage. A missing file leaves the store empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(&mut self) -> Result<()> {
        if let Some(path) = self.storage_path.as_ref().filter(|p| p.exists()) {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read todos file {}", path.display()))?;
            self.items = serde_json::from_str(&content).context("Failed to parse todos file")?;
            log::debug!("loaded {} todos from {}", self.items.len(), path.display());
        }
        Ok(())
    }

    /// Saves items to storage if a path is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(ref path) = self.storage_path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).context("Failed to create todos directory")?;
            }
            let content =
                serde_json::to_string_pretty(&self.items).context("Failed to serialize todos")?;
            std::fs::write(path, content).context("Failed to write todos file")?;
        }
        Ok(())
    }

    /// Adds an item and persists the store. The item is not kept if saving
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be saved.
    pub fn add(&mut self, item: TodoItem) -> Result<()> {
        self.items.push(item);
        if let Err(e) = self.save() {
            self.items.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Tasks saved on `date`, in insertion order.
    pub fn tasks_for<'a>(&'a self, date: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.items
            .iter()
            .filter(move |i| i.date == date)
            .map(|i| i.task.as_str())
    }

    #[must_use]
    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }
}

/// Today's date in local time, falling back to UTC when the local offset is
/// unknown.
#[must_use]
pub fn today() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_date(now.date())
}

fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Saves a task for today.
pub struct SaveTodoTool {
    store: Arc<RwLock<TodoStore>>,
}

impl SaveTodoTool {
    #[must_use]
    pub const fn new(store: Arc<RwLock<TodoStore>>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct SaveTodoInput {
    task: String,
}

impl Tool for SaveTodoTool {
    type Name = BuiltinToolName;

    fn name(&self) -> BuiltinToolName {
        BuiltinToolName::SaveTodo
    }

    fn description(&self) -> &'static str {
        "Save a to-do task for today."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task to remember."
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<String> {
        let input: SaveTodoInput = decode_args("save_todo", args)?;
        let task = input.task.trim();
        if task.is_empty() {
            anyhow::bail!("task must not be empty");
        }

        let date = today();
        self.store
            .write()
            .await
            .add(TodoItem::new(date.clone(), task))?;

        Ok(format!(
            "Message from DB: Successfully saved task {task} for {date}."
        ))
    }
}

/// Lists the tasks saved today.
pub struct ReadTodosTool {
    store: Arc<RwLock<TodoStore>>,
}

impl ReadTodosTool {
    #[must_use]
    pub const fn new(store: Arc<RwLock<TodoStore>>) -> Self {
        Self { store }
    }
}

impl Tool for ReadTodosTool {
    type Name = BuiltinToolName;

    fn name(&self) -> BuiltinToolName {
        BuiltinToolName::ReadTodos
    }

    fn description(&self) -> &'static str {
        "Read all to-do tasks saved for today."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: ToolArgs) -> Result<String> {
        let date = today();
        let store = self.store.read().await;
        let tasks: Vec<&str> = store.tasks_for(&date).collect();

        if tasks.is_empty() {
            return Ok("no current to dos".to_string());
        }
        Ok(tasks.join(", "))
    }
}
