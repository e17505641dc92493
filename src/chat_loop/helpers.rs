use crate::llm::{ChatRequest, ToolChoice};
use crate::models::ModelCatalog;
use crate::schema::ToolSpec;
use crate::session::Session;
use crate::types::RetryConfig;
use std::time::Duration;

/// Calculate exponential backoff delay with jitter.
///
/// Uses exponential backoff with the formula: `base * 2^(attempt-1) + jitter`,
/// capped at the maximum delay.
pub(super) fn calculate_backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = config
        .base_delay_ms
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(63));

    // Jitter up to the base delay, at most one second
    let max_jitter = config.base_delay_ms.min(1000);
    let jitter = if max_jitter > 0 {
        u64::from(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos(),
        ) % max_jitter
    } else {
        0
    };

    let delay_ms = base_delay.saturating_add(jitter).min(config.max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Snapshot the session into a request. Tools and `tool_choice` are omitted
/// when the model cannot use them or there is nothing to offer.
pub(super) fn build_turn_request(
    session: &Session,
    tool_specs: &[ToolSpec],
    models: &ModelCatalog,
) -> ChatRequest {
    let sampling = session.sampling();
    let with_tools = !tool_specs.is_empty() && models.supports_tools(session.model());

    ChatRequest {
        model: session.model().to_string(),
        messages: session.conversation().messages().to_vec(),
        temperature: sampling.temperature,
        top_p: sampling.top_p,
        max_tokens: sampling.max_tokens,
        tools: with_tools.then(|| tool_specs.to_vec()),
        tool_choice: with_tools.then_some(ToolChoice::Auto),
    }
}

/// Whether the final text repeats one of the turn's tool outputs.
pub(super) fn echoes_tool_output(text: &str, outputs: &[String]) -> bool {
    outputs
        .iter()
        .map(|o| o.trim())
        .any(|o| !o.is_empty() && text.contains(o))
}
