//! Streaming types for chat completion responses.
//!
//! Providers translate their wire protocol into [`StreamDelta`] events.
//! [`StreamingResponseConsumer`] drains such a stream and decides whether the
//! model asked for a tool or finished with plain text.

use crate::error::TurnError;
use crate::events::{ChatEvent, send_event};
use crate::llm::{StopReason, ToolArgs, ToolCall, Usage};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use tokio::sync::mpsc;

/// Events yielded during a streaming response.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A fragment of assistant text, in stream order.
    TextDelta { delta: String },

    /// A complete tool invocation. `arguments` is the raw JSON text as
    /// delivered by the endpoint; it is decoded by the accumulator.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    /// Usage information (typically at stream end).
    Usage(Usage),

    /// Stream completed with stop reason.
    Done { stop_reason: Option<StopReason> },

    /// Error reported by the endpoint.
    Error {
        message: String,
        /// Whether retrying the request may succeed (rate limit, 5xx)
        recoverable: bool,
    },

    /// A chunk that could not be interpreted.
    Malformed { message: String },
}

/// Type alias for a boxed stream of stream deltas.
pub type StreamBox<'a> = Pin<Box<dyn Stream<Item = anyhow::Result<StreamDelta>> + Send + 'a>>;

/// Per-call accumulation state.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    accumulated_text: String,
    pending_tool_call: Option<ToolCall>,
    usage: Option<Usage>,
    stop_reason: Option<StopReason>,
}

impl StreamAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a stream delta. Returns `Ok(true)` once a tool call is pending.
    ///
    /// # Errors
    /// Returns `TurnError::StreamProtocol` for tool calls whose arguments are
    /// not a JSON object and for malformed chunks.
    pub fn apply(&mut self, delta: StreamDelta) -> Result<bool, TurnError> {
        match delta {
            StreamDelta::TextDelta { delta } => {
                self.accumulated_text.push_str(&delta);
            }
            StreamDelta::ToolCall {
                id,
                name,
                arguments,
            } => {
                if name.trim().is_empty() {
                    return Err(TurnError::StreamProtocol(
                        "tool call without a function name".to_string(),
                    ));
                }
                let arguments = parse_arguments(&name, &arguments)?;
                let id = if id.is_empty() { generate_call_id() } else { id };
                self.pending_tool_call = Some(ToolCall::new(id, name, arguments));
                return Ok(true);
            }
            StreamDelta::Usage(usage) => {
                self.usage = Some(usage);
            }
            StreamDelta::Done { stop_reason } => {
                self.stop_reason = stop_reason;
            }
            StreamDelta::Malformed { message } => {
                return Err(TurnError::StreamProtocol(message));
            }
            StreamDelta::Error { .. } => {}
        }
        Ok(false)
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.accumulated_text
    }

    #[must_use]
    pub const fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    #[must_use]
    pub const fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    pub const fn take_usage(&mut self) -> Option<Usage> {
        self.usage.take()
    }

    /// Resolve the accumulated state. A pending tool call wins over any text
    /// seen in the same pass.
    #[must_use]
    pub fn into_outcome(self) -> StreamOutcome {
        match self.pending_tool_call {
            Some(call) => StreamOutcome::ToolCallDetected(call),
            None => StreamOutcome::TextCompleted(self.accumulated_text),
        }
    }
}

fn parse_arguments(name: &str, raw: &str) -> Result<ToolArgs, TurnError> {
    if raw.trim().is_empty() {
        return Ok(ToolArgs::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(TurnError::StreamProtocol(format!(
            "arguments for '{name}' are not a JSON object: {other}"
        ))),
        Err(e) => Err(TurnError::StreamProtocol(format!(
            "arguments for '{name}' are not valid JSON: {e}"
        ))),
    }
}

/// Mistral call ids are nine alphanumeric characters.
fn generate_call_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}

/// Outcome of a single streamed model call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    ToolCallDetected(ToolCall),
    TextCompleted(String),
}

#[derive(Debug)]
pub struct ConsumedStream {
    pub outcome: StreamOutcome,
    pub usage: Option<Usage>,
    /// Number of stream items consumed before resolving.
    pub fragments: usize,
}

/// Drains a [`StreamBox`] into a [`StreamOutcome`].
///
/// Text deltas are forwarded to the optional observer as they arrive.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamingResponseConsumer<'a> {
    events: Option<&'a mpsc::Sender<ChatEvent>>,
}

impl<'a> StreamingResponseConsumer<'a> {
    #[must_use]
    pub const fn new(events: Option<&'a mpsc::Sender<ChatEvent>>) -> Self {
        Self { events }
    }

    /// Consume the stream until a tool call is detected or it is exhausted.
    ///
    /// # Errors
    /// `TurnError::StreamProtocol` for malformed fragments and
    /// `TurnError::Endpoint` for endpoint-reported or transport errors. An
    /// endpoint error is only flagged retryable when nothing was consumed yet.
    pub async fn consume(&self, mut stream: StreamBox<'_>) -> Result<ConsumedStream, TurnError> {
        let mut acc = StreamAccumulator::new();
        let mut fragments = 0usize;

        while let Some(item) = stream.next().await {
            let delta = match item {
                Ok(delta) => delta,
                Err(e) => {
                    return Err(TurnError::Endpoint {
                        message: format!("{e:#}"),
                        retryable: false,
                    });
                }
            };

            if let StreamDelta::Error {
                message,
                recoverable,
            } = delta
            {
                return Err(TurnError::Endpoint {
                    message,
                    retryable: recoverable && fragments == 0,
                });
            }

            if let StreamDelta::TextDelta { delta: text } = &delta
                && !text.is_empty()
            {
                send_event(self.events, ChatEvent::text_delta(text.clone())).await;
            }

            fragments += 1;
            if acc.apply(delta)? {
                log::debug!("tool call detected after {fragments} fragments, dropping rest of stream");
                break;
            }
        }

        log::debug!(
            "stream consumed fragments={fragments} text_len={} stop_reason={:?} usage={:?}",
            acc.text().len(),
            acc.stop_reason(),
            acc.usage()
        );
        let usage = acc.take_usage();
        Ok(ConsumedStream {
            outcome: acc.into_outcome(),
            usage,
            fragments,
        })
    }
}
