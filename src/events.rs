//! Chat events for real-time rendering.
//!
//! A turn emits, in order: any number of `TextDelta` / `ToolCallStart` /
//! `ToolCallEnd`, then either `Done` or `Error`.

use crate::types::{TokenUsage, ToolResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A text delta from the model. Deltas of a discarded pass (text that
    /// preceded a tool call) are sent too; `ToolCallStart` tells the UI to
    /// drop them.
    TextDelta { delta: String },

    ToolCallStart {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    ToolCallEnd {
        id: String,
        name: String,
        result: ToolResult,
    },

    /// The turn finished with a permanent assistant message.
    Done {
        text: String,
        model_calls: usize,
        usage: TokenUsage,
        duration: Duration,
    },

    Error { message: String },
}

impl ChatEvent {
    #[must_use]
    pub fn text_delta(delta: impl Into<String>) -> Self {
        Self::TextDelta {
            delta: delta.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Send an event to the observer, if any, without stalling the turn.
///
/// A full channel is waited on for up to 30 seconds; a closed channel is
/// ignored.
pub(crate) async fn send_event(tx: Option<&mpsc::Sender<ChatEvent>>, event: ChatEvent) {
    let Some(tx) = tx else {
        return;
    };

    match tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            log::debug!("Event channel full, waiting for consumer...");
            match tokio::time::timeout(Duration::from_secs(30), tx.send(event)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    log::warn!("Event channel closed while sending - consumer disconnected");
                }
                Err(_) => {
                    log::error!("Timeout waiting to send event - consumer may be deadlocked");
                }
            }
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            log::debug!("Event channel closed - consumer disconnected");
        }
    }
}
