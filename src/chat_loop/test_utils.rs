use crate::llm::{ChatRequest, LlmProvider, StreamBox, StreamDelta, ToolArgs, Usage};
use crate::tools::{DynamicToolName, Tool};
use anyhow::Result;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// ===================
// Mock LLM Provider
// ===================

/// Plays back one scripted delta sequence per model call and records every
/// request it receives.
pub struct MockProvider {
    responses: Mutex<VecDeque<Vec<StreamDelta>>>,
    requests: Mutex<Vec<ChatRequest>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<Vec<StreamDelta>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn text_response(parts: &[&str]) -> Vec<StreamDelta> {
        let mut deltas: Vec<_> = parts
            .iter()
            .map(|p| StreamDelta::TextDelta {
                delta: (*p).to_string(),
            })
            .collect();
        deltas.push(StreamDelta::Usage(Usage {
            input_tokens: 10,
            output_tokens: 20,
        }));
        deltas.push(StreamDelta::Done { stop_reason: None });
        deltas
    }

    pub fn tool_call_response(id: &str, name: &str, arguments: Value) -> Vec<StreamDelta> {
        Self::raw_tool_call_response(id, name, &arguments.to_string())
    }

    pub fn raw_tool_call_response(id: &str, name: &str, arguments: &str) -> Vec<StreamDelta> {
        vec![
            StreamDelta::ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
            StreamDelta::Usage(Usage {
                input_tokens: 10,
                output_tokens: 5,
            }),
        ]
    }

    pub fn error_response(message: &str, recoverable: bool) -> Vec<StreamDelta> {
        vec![StreamDelta::Error {
            message: message.to_string(),
            recoverable,
        }]
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

impl LlmProvider for MockProvider {
    fn chat_stream(&self, request: ChatRequest) -> StreamBox<'_> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().expect("lock poisoned").push(request);
        let deltas = self
            .responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Self::text_response(&["Done"]));
        Box::pin(futures::stream::iter(deltas.into_iter().map(Ok)))
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}

// ===================
// Test Tools
// ===================

/// Returns a fixed closing price for any ticker.
pub struct StubStockTool;

impl Tool for StubStockTool {
    type Name = DynamicToolName;

    fn name(&self) -> DynamicToolName {
        DynamicToolName::new("get_stock_price")
    }

    fn description(&self) -> &'static str {
        "Get the latest closing price of a stock"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "ticker": { "type": "string" } },
            "required": ["ticker"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<String> {
        let ticker = args
            .get("ticker")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("missing ticker"))?;
        if ticker.is_empty() {
            anyhow::bail!("empty ticker");
        }
        Ok("The latest closing price is 123.45 USD".to_string())
    }
}

/// Accepts any task and reports it as saved.
pub struct StubTodoTool;

impl Tool for StubTodoTool {
    type Name = DynamicToolName;

    fn name(&self) -> DynamicToolName {
        DynamicToolName::new("save_todo")
    }

    fn description(&self) -> &'static str {
        "Save a to-do task for today"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "task": { "type": "string" } },
            "required": ["task"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<String> {
        let task = args
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("missing task"))?;
        Ok(format!("Saved task {task}"))
    }
}
