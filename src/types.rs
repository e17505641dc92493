//! Core configuration and result types.
//!
//! - [`SamplingParams`]: temperature / top-p / token budget for a model call
//! - [`ChatConfig`]: configuration for the response loop
//! - [`RetryConfig`]: backoff settings for transient endpoint failures
//! - [`TokenUsage`]: token consumption statistics
//! - [`ToolResult`]: result of a single tool execution

use crate::error::ConfigError;
use crate::models::{DEFAULT_MODEL, ModelCatalog};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TEMPERATURE_RANGE: (f32, f32) = (0.01, 1.0);
pub const TOP_P_RANGE: (f32, f32) = (0.01, 1.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (32, 32_000);

/// Sampling parameters sent with every model call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 1024,
        }
    }
}

impl SamplingParams {
    /// # Errors
    /// Returns `ConfigError::OutOfRange` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("temperature", self.temperature, TEMPERATURE_RANGE)?;
        check_range("top_p", self.top_p, TOP_P_RANGE)?;
        let (min, max) = MAX_TOKENS_RANGE;
        if !(min..=max).contains(&self.max_tokens) {
            return Err(ConfigError::OutOfRange {
                name: "max_tokens",
                min: f64::from(min),
                max: f64::from(max),
                value: f64::from(self.max_tokens),
            });
        }
        Ok(())
    }
}

fn check_range(name: &'static str, value: f32, (min, max): (f32, f32)) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            min: f64::from(min),
            max: f64::from(max),
            value: f64::from(value),
        });
    }
    Ok(())
}

/// Configuration for the response loop
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Model identifier used for new sessions
    pub model: String,
    /// System prompt inserted at the start of each conversation
    pub system_prompt: String,
    pub sampling: SamplingParams,
    /// Maximum tool round-trips within a single user turn
    pub max_tool_iterations: usize,
    /// Upper bound on a single tool execution. `None` disables the timeout.
    pub tool_timeout: Option<Duration>,
    /// Retry configuration for transient endpoint errors
    pub retry: RetryConfig,
    pub models: ModelCatalog,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: String::new(),
            sampling: SamplingParams::default(),
            max_tool_iterations: 8,
            tool_timeout: Some(Duration::from_secs(30)),
            retry: RetryConfig::default(),
            models: ModelCatalog::default(),
        }
    }
}

/// Configuration for retry behavior on transient errors.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Create a retry config with no retries (for testing)
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Create a retry config with fast retries (for testing)
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 10,
        }
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub const fn add(&mut self, other: &Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

impl From<crate::llm::Usage> for TokenUsage {
    fn from(usage: crate::llm::Usage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        }
    }
}

/// Result of a tool execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool execution succeeded
    pub success: bool,
    /// Output content fed back to the model
    pub output: String,
    /// Duration of the tool execution in milliseconds
    pub duration_ms: Option<u64>,
}

impl ToolResult {
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            duration_ms: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
            duration_ms: None,
        }
    }

    #[must_use]
    pub const fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}
