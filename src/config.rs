//! Process configuration read from the environment.

use crate::error::ConfigError;
use std::path::PathBuf;

pub const MISTRAL_API_KEY: &str = "MISTRAL_API_KEY";
pub const MISTRAL_BASE_URL: &str = "MISTRAL_BASE_URL";
pub const BING_SEARCH_API_KEY: &str = "BING_SEARCH_API_KEY";
pub const PASSWORD: &str = "PASSWORD";
pub const TODO_PATH: &str = "TASUKU_TODO_PATH";
pub const TOOLS_PATH: &str = "TASUKU_TOOLS_PATH";

pub const DEFAULT_TODO_PATH: &str = "todos.json";

/// System prompt used by the command line front-end.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant called Tasuku (佑). \
Your job is to be helpful and wait for users instructions. Keep your answer short. \
Do NOT mention your capabilties or tool use unless the user asks for it. \
Do NOT generate any commands yourself.";

/// Secrets and paths for one process.
#[derive(Clone)]
pub struct AppConfig {
    pub mistral_api_key: String,
    pub mistral_base_url: Option<String>,
    pub bing_api_key: Option<String>,
    pub password: Option<String>,
    pub todo_path: PathBuf,
    pub tools_path: Option<PathBuf>,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingVar` if `MISTRAL_API_KEY` is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_key(None)
    }

    /// Like [`from_env`](Self::from_env), but a non-empty `api_key` wins
    /// over `MISTRAL_API_KEY`.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingVar` if neither provides a key.
    pub fn from_env_with_key(api_key: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup_with_key(api_key, |name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingVar` if `MISTRAL_API_KEY` is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup_with_key(None, lookup)
    }

    /// # Errors
    /// Returns `ConfigError::MissingVar` if neither `api_key` nor `lookup`
    /// provides a Mistral key.
    pub fn from_lookup_with_key(
        api_key: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |v: String| Some(v.trim().to_string()).filter(|v| !v.is_empty());
        let get = |name: &str| lookup(name).and_then(non_empty);

        let mistral_api_key = api_key
            .and_then(non_empty)
            .or_else(|| get(MISTRAL_API_KEY))
            .ok_or(ConfigError::MissingVar(MISTRAL_API_KEY))?;

        Ok(Self {
            mistral_api_key,
            mistral_base_url: get(MISTRAL_BASE_URL),
            bing_api_key: get(BING_SEARCH_API_KEY),
            password: get(PASSWORD),
            todo_path: get(TODO_PATH).map_or_else(|| PathBuf::from(DEFAULT_TODO_PATH), PathBuf::from),
            tools_path: get(TOOLS_PATH).map(PathBuf::from),
        })
    }

    #[must_use]
    pub fn access_gate(&self) -> AccessGate {
        AccessGate::new(self.password.clone())
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("mistral_base_url", &self.mistral_base_url)
            .field("bing_search", &self.bing_api_key.is_some())
            .field("password", &self.password.is_some())
            .field("todo_path", &self.todo_path)
            .field("tools_path", &self.tools_path)
            .finish_non_exhaustive()
    }
}

/// Optional shared-password check in front of the REPL.
#[derive(Clone, Default)]
pub struct AccessGate {
    password: Option<String>,
}

impl AccessGate {
    pub const DENIED_MESSAGE: &'static str = "Unauthorized access.";

    #[must_use]
    pub const fn new(password: Option<String>) -> Self {
        Self { password }
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.password.is_some()
    }

    /// An open gate admits anything. Surrounding whitespace is ignored.
    #[must_use]
    pub fn admits(&self, attempt: &str) -> bool {
        self.password
            .as_deref()
            .is_none_or(|expected| expected == attempt.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_api_key_is_required() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(MISTRAL_API_KEY)));

        let err = AppConfig::from_lookup(lookup(&[(MISTRAL_API_KEY, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
    }

    #[test]
    fn test_explicit_api_key() {
        let config = AppConfig::from_lookup_with_key(Some(" typed-key\n".into()), lookup(&[])).unwrap();
        assert_eq!(config.mistral_api_key, "typed-key");

        let config =
            AppConfig::from_lookup_with_key(Some("flag".into()), lookup(&[(MISTRAL_API_KEY, "env")]))
                .unwrap();
        assert_eq!(config.mistral_api_key, "flag");

        let config =
            AppConfig::from_lookup_with_key(Some(String::new()), lookup(&[(MISTRAL_API_KEY, "env")]))
                .unwrap();
        assert_eq!(config.mistral_api_key, "env");

        let err = AppConfig::from_lookup_with_key(Some("   ".into()), lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(MISTRAL_API_KEY)));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[(MISTRAL_API_KEY, "k")])).unwrap();
        assert_eq!(config.mistral_api_key, "k");
        assert_eq!(config.todo_path, PathBuf::from("todos.json"));
        assert!(config.bing_api_key.is_none());
        assert!(config.tools_path.is_none());
        assert!(!config.access_gate().is_required());
    }

    #[test]
    fn test_all_values_read() {
        let config = AppConfig::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "k"),
            (MISTRAL_BASE_URL, "http://localhost:8080/v1"),
            (BING_SEARCH_API_KEY, "bing"),
            (PASSWORD, "hunter2"),
            (TODO_PATH, "/tmp/t.json"),
            (TOOLS_PATH, "tools.json"),
        ]))
        .unwrap();
        assert_eq!(config.mistral_base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.bing_api_key.as_deref(), Some("bing"));
        assert_eq!(config.todo_path, PathBuf::from("/tmp/t.json"));
        assert_eq!(config.tools_path, Some(PathBuf::from("tools.json")));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = AppConfig::from_lookup(lookup(&[
            (MISTRAL_API_KEY, "sk-secret"),
            (PASSWORD, "hunter2"),
        ]))
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_access_gate() {
        let open = AccessGate::default();
        assert!(open.admits("anything"));

        let gate = AccessGate::new(Some("hunter2".into()));
        assert!(gate.is_required());
        assert!(gate.admits("hunter2\n"));
        assert!(!gate.admits("hunter"));
        assert!(!gate.admits(""));
    }
}
