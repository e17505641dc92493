//! The tool-calling response loop.
//!
//! One call to [`ResponseLoop::run_turn`] handles one user message:
//!
//! ```text
//! AwaitingResponse --tool call--> ToolDispatch --result--> AwaitingResponse
//!        |
//!        +--text--> Finalizing --> Done
//! ```
//!
//! Tool invocations and their results are appended to the history as
//! ephemeral messages so the model sees them on the next call. They are
//! pruned when the turn ends, successfully or not.
//!
//! # Example
//!
//! ```ignore
//! let chat = ResponseLoop::builder(MistralProvider::new(api_key))
//!     .tools(registry)
//!     .schema(ToolSchemaProvider::builtin()?)
//!     .config(ChatConfig::default())
//!     .build();
//!
//! let mut session = chat.new_session();
//! let outcome = chat.run_turn(&mut session, "What is AAPL trading at?", None).await?;
//! println!("{}", outcome.text);
//! ```

mod helpers;
mod llm;
mod types;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

pub use types::TurnOutcome;

use crate::dispatch::ToolCallDispatcher;
use crate::error::TurnError;
use crate::events::{ChatEvent, send_event};
use crate::llm::{LlmProvider, Message, StreamOutcome, ToolCall};
use crate::models::ModelCatalog;
use crate::schema::{ToolSchemaProvider, ToolSpec};
use crate::session::Session;
use crate::tools::ToolRegistry;
use crate::types::{ChatConfig, TokenUsage};
use helpers::{build_turn_request, echoes_tool_output};
use llm::stream_with_retry;
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use types::LoopState;

/// Builder for [`ResponseLoop`]. The provider is the only required part.
pub struct ResponseLoopBuilder<P> {
    provider: P,
    tools: ToolRegistry,
    schema: ToolSchemaProvider,
    config: ChatConfig,
}

impl<P: LlmProvider> ResponseLoopBuilder<P> {
    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: ToolSchemaProvider) -> Self {
        self.schema = schema;
        self
    }

    #[must_use]
    pub fn config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn build(mut self) -> ResponseLoop<P> {
        for name in self.schema.names() {
            if self.tools.get(name).is_none() {
                warn!("tool '{name}' is described in the schema but not registered");
            }
        }

        // Only described tools can be called.
        let before = self.tools.len();
        let schema = &self.schema;
        self.tools.filter(|name| schema.names().any(|n| n == name));
        if self.tools.len() < before {
            debug!(
                "dropped {} registered tools missing from the schema",
                before - self.tools.len()
            );
        }

        let dispatcher =
            ToolCallDispatcher::new(Arc::new(self.tools)).with_timeout(self.config.tool_timeout);
        ResponseLoop {
            provider: Arc::new(self.provider),
            dispatcher,
            tool_specs: self.schema.schema(),
            config: self.config,
        }
    }
}

/// Orchestrates model calls and tool dispatch for a session.
pub struct ResponseLoop<P: LlmProvider> {
    provider: Arc<P>,
    dispatcher: ToolCallDispatcher,
    tool_specs: Vec<ToolSpec>,
    config: ChatConfig,
}

impl<P: LlmProvider> ResponseLoop<P> {
    #[must_use]
    pub fn builder(provider: P) -> ResponseLoopBuilder<P> {
        ResponseLoopBuilder {
            provider,
            tools: ToolRegistry::new(),
            schema: ToolSchemaProvider::default(),
            config: ChatConfig::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    #[must_use]
    pub const fn models(&self) -> &ModelCatalog {
        &self.config.models
    }

    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    #[must_use]
    pub fn new_session(&self) -> Session {
        Session::new(&self.config)
    }

    /// Run one user turn to completion.
    ///
    /// On success the history has gained the user message and one permanent
    /// assistant message. On failure it keeps only the user message; every
    /// ephemeral message of the turn is pruned.
    ///
    /// # Errors
    /// Returns `TurnError` for malformed streams, endpoint failures and when
    /// the model keeps calling tools past `max_tool_iterations`.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        text: &str,
        events: Option<&mpsc::Sender<ChatEvent>>,
    ) -> Result<TurnOutcome, TurnError> {
        let start = Instant::now();
        session.sync_system_prompt();
        session.conversation_mut().append(Message::user(text));
        info!(
            "turn started session={} model={} history={}",
            session.id(),
            session.model(),
            session.conversation().len()
        );

        match self.drive(session, events, start).await {
            Ok(outcome) => {
                info!(
                    "turn finished session={} model_calls={} tool_calls={} duration_ms={}",
                    session.id(),
                    outcome.model_calls,
                    outcome.tool_calls,
                    outcome.duration.as_millis()
                );
                send_event(
                    events,
                    ChatEvent::Done {
                        text: outcome.text.clone(),
                        model_calls: outcome.model_calls,
                        usage: outcome.usage,
                        duration: outcome.duration,
                    },
                )
                .await;
                Ok(outcome)
            }
            Err(err) => {
                let pruned = session.conversation_mut().prune_ephemeral_turns();
                warn!(
                    "turn failed session={} pruned={} error={err}",
                    session.id(),
                    pruned.len()
                );
                send_event(events, ChatEvent::error(err.to_string())).await;
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        session: &mut Session,
        events: Option<&mpsc::Sender<ChatEvent>>,
        start: Instant,
    ) -> Result<TurnOutcome, TurnError> {
        let limit = self.config.max_tool_iterations;
        let mut state = LoopState::AwaitingResponse;
        let mut model_calls = 0usize;
        let mut tool_calls = 0usize;
        let mut usage = TokenUsage::default();
        let mut tool_outputs: Vec<String> = Vec::new();

        loop {
            state = match state {
                LoopState::AwaitingResponse => {
                    let request = build_turn_request(session, &self.tool_specs, self.models());
                    model_calls += 1;
                    debug!(
                        "model call={model_calls} messages={} tools={}",
                        request.messages.len(),
                        request.has_tools()
                    );
                    let consumed =
                        stream_with_retry(&self.provider, &request, &self.config.retry, events)
                            .await?;
                    if let Some(u) = consumed.usage {
                        usage.add(&u.into());
                    }
                    match consumed.outcome {
                        StreamOutcome::ToolCallDetected(call) => LoopState::ToolDispatch(call),
                        StreamOutcome::TextCompleted(text) => LoopState::Finalizing(text),
                    }
                }
                LoopState::ToolDispatch(call) => {
                    if tool_calls >= limit {
                        return Err(TurnError::ToolLoopLimit { limit });
                    }
                    tool_calls += 1;
                    let output = self.dispatch(session, call, events).await;
                    tool_outputs.push(output);
                    LoopState::AwaitingResponse
                }
                LoopState::Finalizing(text) => {
                    let conversation = session.conversation_mut();
                    conversation.append(Message::assistant(text.clone()));
                    let pruned = conversation.prune_ephemeral_turns();
                    debug!("finalized turn pruned={}", pruned.len());

                    LoopState::Done(Box::new(TurnOutcome {
                        echoed_tool_result: echoes_tool_output(&text, &tool_outputs),
                        text,
                        tool_calls,
                        model_calls,
                        usage,
                        duration: start.elapsed(),
                    }))
                }
                LoopState::Done(outcome) => return Ok(*outcome),
            };
        }
    }

    /// Execute the call and record it, with its result, as ephemeral turns.
    async fn dispatch(
        &self,
        session: &mut Session,
        call: ToolCall,
        events: Option<&mpsc::Sender<ChatEvent>>,
    ) -> String {
        info!("dispatching tool name={} id={}", call.name, call.id);
        send_event(
            events,
            ChatEvent::ToolCallStart {
                id: call.id.clone(),
                name: call.name.clone(),
                input: Value::Object(call.arguments.clone()),
            },
        )
        .await;

        let result = self.dispatcher.execute(&call).await;

        send_event(
            events,
            ChatEvent::ToolCallEnd {
                id: call.id.clone(),
                name: call.name.clone(),
                result: result.clone(),
            },
        )
        .await;

        let tool_message = Message::tool_result(&call, result.output.clone());
        let conversation = session.conversation_mut();
        conversation.append(Message::assistant_tool_call(call));
        conversation.append(tool_message);
        result.output
    }
}
