use clap::Parser;
use std::path::PathBuf;
use tasuku::config::DEFAULT_SYSTEM_PROMPT;
use tasuku::{ChatConfig, ConfigError, SamplingParams};

#[derive(Parser, Debug)]
#[command(
    name = "tasuku",
    about = "A small tool-calling chat assistant for the Mistral API",
    version,
    long_about = None,
)]
pub struct Cli {
    /// Model to use, e.g. "mistral-large-latest"
    #[arg(long, short = 'm', env = "TASUKU_MODEL")]
    pub model: Option<String>,

    /// Sampling temperature (0.01 - 1.0)
    #[arg(long, env = "TASUKU_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Nucleus sampling probability mass (0.01 - 1.0)
    #[arg(long, env = "TASUKU_TOP_P")]
    pub top_p: Option<f32>,

    /// Maximum tokens per model response (32 - 32000)
    #[arg(long, env = "TASUKU_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// System prompt placed at the start of every conversation
    #[arg(long, value_name = "TEXT", env = "TASUKU_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Mistral API key. Falls back to MISTRAL_API_KEY, then to a prompt
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Tool schema document (JSON array of function entries)
    #[arg(long, value_name = "PATH")]
    pub tools: Option<PathBuf>,

    /// File the to-do list is stored in
    #[arg(long, value_name = "PATH")]
    pub todo_path: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Loop configuration with the command line overrides applied.
    pub fn chat_config(&self) -> Result<ChatConfig, ConfigError> {
        let defaults = SamplingParams::default();
        let sampling = SamplingParams {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        };
        sampling.validate()?;

        let mut config = ChatConfig {
            system_prompt: self
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            sampling,
            ..ChatConfig::default()
        };

        if let Some(model) = &self.model {
            if !config.models.contains(model) {
                return Err(ConfigError::UnknownModel(model.clone()));
            }
            config.model.clone_from(model);
        }
        Ok(config)
    }
}
