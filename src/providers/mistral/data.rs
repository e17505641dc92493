//! Wire types and SSE chunk parsing for the Mistral chat completions API.

use crate::llm::{ChatRequest, Message, Role, StopReason, StreamDelta, ToolChoice, Usage};
use crate::schema::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// API Request Types
// ============================================================================

#[derive(Serialize)]
pub(crate) struct ApiChatRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: &'a [ApiMessage],
    pub(crate) temperature: f32,
    pub(crate) top_p: f32,
    pub(crate) max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tools: Option<&'a [ToolSpec]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tool_choice: Option<ToolChoice>,
    pub(crate) stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ApiMessage {
    pub(crate) role: Role,
    pub(crate) content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ApiToolCall {
    pub(crate) id: String,
    pub(crate) r#type: &'static str,
    pub(crate) function: ApiFunctionCall,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ApiFunctionCall {
    pub(crate) name: String,
    pub(crate) arguments: String,
}

pub(crate) fn build_api_messages(request: &ChatRequest) -> Vec<ApiMessage> {
    request.messages.iter().map(to_api_message).collect()
}

fn to_api_message(msg: &Message) -> ApiMessage {
    let tool_calls = msg.has_tool_calls().then(|| {
        msg.tool_calls
            .iter()
            .map(|call| ApiToolCall {
                id: call.id.clone(),
                r#type: "function",
                function: ApiFunctionCall {
                    name: call.name.clone(),
                    arguments: Value::Object(call.arguments.clone()).to_string(),
                },
            })
            .collect()
    });

    ApiMessage {
        role: msg.role,
        content: msg.content.clone(),
        name: msg.name.clone().filter(|_| msg.role == Role::Tool),
        tool_call_id: msg.tool_call_id.clone(),
        tool_calls,
    }
}

// ============================================================================
// API Streaming Response Types
// ============================================================================

#[derive(Deserialize)]
struct ApiStreamChunk {
    #[serde(default)]
    choices: Vec<ApiStreamChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiStreamChoice {
    #[serde(default)]
    delta: ApiDelta,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct ApiDelta {
    content: Option<ApiContent>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCallDelta>,
}

/// Newer models may stream content as a list of typed chunks.
#[derive(Deserialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Chunks(Vec<ApiContentChunk>),
}

#[derive(Deserialize)]
struct ApiContentChunk {
    #[serde(default)]
    text: Option<String>,
}

impl ApiContent {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Chunks(chunks) => chunks.into_iter().filter_map(|c| c.text).collect(),
        }
    }
}

#[derive(Deserialize)]
struct ApiToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: ApiFunctionDelta,
}

#[derive(Default, Deserialize)]
struct ApiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    /// A JSON string, or occasionally an already-decoded object.
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

pub(crate) fn map_finish_reason(reason: &str) -> Option<StopReason> {
    match reason {
        "stop" => Some(StopReason::EndTurn),
        "tool_calls" => Some(StopReason::ToolUse),
        "length" | "model_length" => Some(StopReason::MaxTokens),
        "content_filter" => Some(StopReason::ContentFilter),
        _ => None,
    }
}

// ============================================================================
// Chunk parsing
// ============================================================================

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
    emitted: bool,
}

impl PartialToolCall {
    fn is_complete(&self) -> bool {
        !self.name.is_empty()
            && serde_json::from_str::<Value>(&self.arguments).is_ok_and(|v| v.is_object())
    }

    fn to_delta(&mut self) -> StreamDelta {
        self.emitted = true;
        StreamDelta::ToolCall {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// Buffers tool-call fragments by index until their arguments are complete.
#[derive(Debug, Default)]
struct ToolCallAssembler {
    calls: BTreeMap<usize, PartialToolCall>,
}

impl ToolCallAssembler {
    fn push(&mut self, delta: ApiToolCallDelta) {
        let call = self.calls.entry(delta.index).or_default();
        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            call.id = id;
        }
        if let Some(name) = delta.function.name {
            call.name.push_str(&name);
        }
        match delta.function.arguments {
            Some(Value::String(fragment)) => call.arguments.push_str(&fragment),
            Some(Value::Null) | None => {}
            Some(other) => call.arguments = other.to_string(),
        }
    }

    /// Calls whose arguments now form a complete JSON object.
    fn take_complete(&mut self) -> Vec<StreamDelta> {
        self.calls
            .values_mut()
            .filter(|c| !c.emitted && c.is_complete())
            .map(PartialToolCall::to_delta)
            .collect()
    }

    /// Everything still buffered, complete or not. Incomplete arguments are
    /// rejected downstream.
    fn flush(&mut self) -> Vec<StreamDelta> {
        self.calls
            .values_mut()
            .filter(|c| !c.emitted)
            .map(PartialToolCall::to_delta)
            .collect()
    }
}

/// Turns SSE event blocks into stream deltas.
#[derive(Debug, Default)]
pub(crate) struct ChunkParser {
    tool_calls: ToolCallAssembler,
    completed: bool,
}

impl ChunkParser {
    /// Whether a finish reason or `[DONE]` was seen.
    pub(crate) const fn is_completed(&self) -> bool {
        self.completed
    }

    /// Parse one SSE event block (the text between blank lines).
    pub(crate) fn parse_event(&mut self, block: &str) -> Vec<StreamDelta> {
        let data: String = block
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join("\n");

        if data.is_empty() {
            return Vec::new();
        }
        if data.trim() == "[DONE]" {
            self.completed = true;
            return self.tool_calls.flush();
        }

        let value: Value = match serde_json::from_str(&data) {
            Ok(value) => value,
            Err(e) => {
                return vec![StreamDelta::Malformed {
                    message: format!("unparseable stream chunk: {e}"),
                }];
            }
        };

        if value.get("choices").is_none()
            && let Some(message) = value.get("message")
        {
            self.completed = true;
            let message = match message {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return vec![StreamDelta::Error {
                message,
                recoverable: false,
            }];
        }

        let chunk: ApiStreamChunk = match serde_json::from_value(value) {
            Ok(chunk) => chunk,
            Err(e) => {
                return vec![StreamDelta::Malformed {
                    message: format!("unexpected stream chunk shape: {e}"),
                }];
            }
        };

        let mut deltas = Vec::new();
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                let text = content.into_text();
                if !text.is_empty() {
                    deltas.push(StreamDelta::TextDelta { delta: text });
                }
            }
            for call in choice.delta.tool_calls {
                self.tool_calls.push(call);
            }
            deltas.extend(self.tool_calls.take_complete());

            if let Some(reason) = choice.finish_reason {
                self.completed = true;
                deltas.extend(self.tool_calls.flush());
                if reason == "error" {
                    deltas.push(StreamDelta::Error {
                        message: "model reported an error while generating".to_string(),
                        recoverable: false,
                    });
                } else {
                    deltas.push(StreamDelta::Done {
                        stop_reason: map_finish_reason(&reason),
                    });
                }
            }
        }

        if let Some(usage) = chunk.usage {
            deltas.push(StreamDelta::Usage(Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            }));
        }
        deltas
    }
}

/// Reassembles SSE event blocks from raw network chunks.
///
/// Chunk boundaries may fall inside a multi-byte character; the incomplete
/// tail is held back until the next chunk completes it.
#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    pending: Vec<u8>,
    text: String,
}

impl SseBuffer {
    /// Append a chunk and return every event block it completed.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();
        if self.text.contains('\r') {
            self.text = self.text.replace("\r\n", "\n");
        }

        let mut blocks = Vec::new();
        while let Some(pos) = self.text.find("\n\n") {
            blocks.push(self.text[..pos].to_string());
            self.text.drain(..pos + 2);
        }
        blocks
    }

    /// The trailing block of a stream that ended without a blank line.
    pub(crate) fn finish(mut self) -> Option<String> {
        if !self.pending.is_empty() {
            self.text.push(char::REPLACEMENT_CHARACTER);
        }
        let remaining = self.text.trim();
        (!remaining.is_empty()).then(|| remaining.to_string())
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.text.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.pending[..valid_up_to]) {
                        self.text.push_str(valid);
                    }
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid_up_to);
                            return;
                        }
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + len);
                        }
                    }
                }
            }
        }
    }
}
