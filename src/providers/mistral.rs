//! Mistral chat completions provider.
//!
//! Streams `POST {base_url}/chat/completions` responses as server-sent events
//! and translates them into [`StreamDelta`]s.

mod data;

use crate::llm::{ChatRequest, LlmProvider, StreamBox, StreamDelta};
use data::{ApiChatRequest, ChunkParser, SseBuffer, build_api_messages};
use futures::StreamExt;
use reqwest::StatusCode;

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

#[derive(Clone)]
pub struct MistralProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for MistralProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MistralProvider {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_owned())
    }

    /// Create a provider for a self-hosted or proxied endpoint.
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl LlmProvider for MistralProvider {
    fn chat_stream(&self, request: ChatRequest) -> StreamBox<'_> {
        Box::pin(async_stream::stream! {
            let messages = build_api_messages(&request);
            let api_request = ApiChatRequest {
                model: &request.model,
                messages: &messages,
                temperature: request.temperature,
                top_p: request.top_p,
                max_tokens: request.max_tokens,
                tools: request.tools.as_deref(),
                tool_choice: request.tool_choice,
                stream: true,
            };

            tracing::debug!(
                model = %request.model,
                messages = messages.len(),
                tools = request.tools.as_ref().map_or(0, Vec::len),
                max_tokens = request.max_tokens,
                "Mistral streaming request"
            );

            let response = match self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Content-Type", "application/json")
                .header("Accept", "text/event-stream")
                .bearer_auth(&self.api_key)
                .json(&api_request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    yield Ok(StreamDelta::Error {
                        message: format!("request failed: {e}"),
                        recoverable: e.is_timeout() || e.is_connect(),
                    });
                    return;
                }
            };

            let status = response.status();
            tracing::debug!(status = %status, "Mistral response status");

            if status == StatusCode::TOO_MANY_REQUESTS {
                yield Ok(StreamDelta::Error {
                    message: "Rate limited".to_string(),
                    recoverable: true,
                });
                return;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %body, "Mistral server error");
                yield Ok(StreamDelta::Error {
                    message: format!("server error {status}: {body}"),
                    recoverable: true,
                });
                return;
            }

            if status.is_client_error() {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = %status, body = %body, "Mistral client error");
                yield Ok(StreamDelta::Error {
                    message: format!("request rejected {status}: {body}"),
                    recoverable: false,
                });
                return;
            }

            let mut stream = response.bytes_stream();
            let mut buffer = SseBuffer::default();
            let mut parser = ChunkParser::default();
            let mut chunk_count: u64 = 0;

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!(error = %e, chunk_count, "Mistral stream read failed");
                        yield Err(anyhow::anyhow!("stream error: {e}"));
                        return;
                    }
                };
                chunk_count += 1;

                for event_block in buffer.push(&chunk) {
                    for delta in parser.parse_event(&event_block) {
                        yield Ok(delta);
                    }
                }
            }

            if let Some(remaining) = buffer.finish() {
                for delta in parser.parse_event(&remaining) {
                    yield Ok(delta);
                }
            }

            tracing::debug!(chunk_count, completed = parser.is_completed(), "Mistral stream ended");

            if !parser.is_completed() {
                yield Ok(StreamDelta::Error {
                    message: "Stream ended unexpectedly without completion".to_string(),
                    recoverable: true,
                });
            }
        })
    }

    fn provider(&self) -> &'static str {
        "mistral"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_base_url() {
        let provider = MistralProvider::new("test-api-key".to_string());
        assert_eq!(provider.base_url(), DEFAULT_BASE_URL);
        assert_eq!(provider.provider(), "mistral");
    }

    #[test]
    fn test_with_base_url_strips_trailing_slash() {
        let provider =
            MistralProvider::with_base_url("k".to_string(), "http://localhost:8080/v1/".to_string());
        assert_eq!(provider.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_debug_does_not_leak_api_key() {
        let provider = MistralProvider::new("super-secret".to_string());
        let debug = format!("{provider:?}");
        assert!(!debug.contains("super-secret"));
    }
}
