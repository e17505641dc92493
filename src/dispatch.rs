//! Resolves and executes a detected tool call.
//!
//! Dispatch never fails: unknown tools, execution errors and timeouts all
//! become tool-result text so the model can react to them.

use crate::error::ToolError;
use crate::llm::{Message, ToolCall};
use crate::tools::ToolRegistry;
use crate::types::ToolResult;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Convert u128 milliseconds to u64, capping at `u64::MAX`
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn millis_to_u64(millis: u128) -> u64 {
    if millis > u64::MAX as u128 {
        u64::MAX
    } else {
        millis as u64
    }
}

#[derive(Clone, Debug)]
pub struct ToolCallDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolCallDispatcher {
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run the call and report the outcome.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let start = Instant::now();
        let result = match self.run(call).await {
            Ok(output) => ToolResult::success(output),
            Err(err) => {
                log::warn!("tool call failed name={} id={} error={err}", call.name, call.id);
                ToolResult::error(self.error_text(&err))
            }
        };
        let result = result.with_duration(millis_to_u64(start.elapsed().as_millis()));
        log::debug!(
            "tool call finished name={} success={} duration_ms={:?}",
            call.name,
            result.success,
            result.duration_ms
        );
        result
    }

    /// Run the call and wrap its output as an ephemeral tool-role message.
    pub async fn dispatch(&self, call: &ToolCall) -> Message {
        let result = self.execute(call).await;
        Message::tool_result(call, result.output)
    }

    async fn run(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self.registry.resolve(&call.name)?;
        let future = tool.call(call.arguments.clone());
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| ToolError::Execution {
                    tool: call.name.clone(),
                    message: format!("timed out after {}s", limit.as_secs_f32()),
                })?,
            None => future.await,
        }
    }

    fn error_text(&self, err: &ToolError) -> String {
        match err {
            ToolError::Unknown(_) => format!(
                "Error: {err}. Available tools: {}",
                self.registry.names().join(", ")
            ),
            ToolError::Execution { .. } => format!("Error: {err}"),
        }
    }
}
