pub mod streaming;
pub mod types;

pub use streaming::{
    ConsumedStream, StreamAccumulator, StreamBox, StreamDelta, StreamOutcome,
    StreamingResponseConsumer,
};
pub use types::*;

/// A chat completion endpoint that streams its response.
///
/// Implementations turn the wire protocol into [`StreamDelta`]s. A tool call
/// must only be yielded as [`StreamDelta::ToolCall`] once its payload is
/// complete.
pub trait LlmProvider: Send + Sync {
    fn chat_stream(&self, request: ChatRequest) -> StreamBox<'_>;
    fn provider(&self) -> &'static str;
}
