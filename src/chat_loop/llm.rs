use super::helpers::calculate_backoff_delay;
use crate::error::TurnError;
use crate::events::ChatEvent;
use crate::llm::{ChatRequest, ConsumedStream, LlmProvider, StreamingResponseConsumer};
use crate::types::RetryConfig;
use log::{error, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Stream one model call, retrying endpoint errors that arrive before any
/// fragment was consumed.
pub(super) async fn stream_with_retry<P>(
    provider: &Arc<P>,
    request: &ChatRequest,
    retry: &RetryConfig,
    events: Option<&mpsc::Sender<ChatEvent>>,
) -> Result<ConsumedStream, TurnError>
where
    P: LlmProvider,
{
    let consumer = StreamingResponseConsumer::new(events);
    let max_retries = retry.max_retries;
    let mut attempt = 0u32;

    loop {
        let stream = provider.chat_stream(request.clone());
        match consumer.consume(stream).await {
            Ok(consumed) => return Ok(consumed),
            Err(err) if err.is_retryable() => {
                attempt += 1;
                if attempt > max_retries {
                    error!("Model endpoint error after {max_retries} retries: {err}");
                    return Err(err.into_exhausted(max_retries));
                }
                let delay = calculate_backoff_delay(attempt, retry);
                warn!(
                    "Model endpoint error, retrying (attempt={attempt}, delay_ms={}, provider={}, error={err})",
                    delay.as_millis(),
                    provider.provider()
                );
                sleep(delay).await;
            }
            Err(err) => {
                error!("Model call failed (non-recoverable): {err}");
                return Err(err);
            }
        }
    }
}
