use crate::llm::ToolCall;
use crate::types::TokenUsage;
use std::time::Duration;

/// States of a single user turn.
#[derive(Debug)]
pub(super) enum LoopState {
    /// Waiting for the model's streamed response.
    AwaitingResponse,
    /// The model asked for a tool.
    ToolDispatch(ToolCall),
    /// The model answered with text.
    Finalizing(String),
    Done(Box<TurnOutcome>),
}

/// Result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The permanent assistant message appended to the history.
    pub text: String,
    pub tool_calls: usize,
    pub model_calls: usize,
    pub usage: TokenUsage,
    pub duration: Duration,
    /// The text repeats the output of a tool called during this turn. The
    /// text is still recorded; a UI may choose not to render it.
    pub echoed_tool_result: bool,
}
