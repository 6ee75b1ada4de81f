//! Configuration loading, validation, and management for Taskloom.
//!
//! Loads configuration from `~/.taskloom/config.toml` with environment
//! variable overrides. Validates all settings at load time so a
//! misconfigured deployment fails before the first run, not during one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.taskloom/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which provider table to use by default
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Provider configurations, keyed by name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Connection settings for one completion-provider backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; `TASKLOOM_API_KEY` fills this for the default provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Max tokens per response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// First-attempt request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Escalated timeout for the retry attempt, in seconds
    #[serde(default = "default_extended_timeout")]
    pub extended_timeout_secs: u64,
}

/// Settings for the agent step loop and its stuck-loop detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard bound on steps per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Truncate each tool observation to this many bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_observe: Option<usize>,

    /// Consecutive empty assistant turns before corrective prompting
    #[serde(default = "default_empty_threshold")]
    pub empty_response_threshold: u32,

    /// Consecutive timeout notices before corrective prompting
    #[serde(default = "default_timeout_threshold")]
    pub timeout_threshold: u32,

    /// Identical assistant turns before corrective prompting
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,

    /// Whether prose-only turns may be mapped to implicit tool calls
    #[serde(default = "default_true")]
    pub inference_enabled: bool,

    /// System prompt sent ahead of the transcript
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Prompt appended before each decision step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_extended_timeout() -> u64 {
    120
}
fn default_max_steps() -> u32 {
    20
}
fn default_empty_threshold() -> u32 {
    3
}
fn default_timeout_threshold() -> u32 {
    2
}
fn default_duplicate_threshold() -> usize {
    2
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_provider", &self.default_provider)
            .field("providers", &self.providers)
            .field("agent", &self.agent)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("extended_timeout_secs", &self.extended_timeout_secs)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: None,
            max_tokens: None,
            request_timeout_secs: default_request_timeout(),
            extended_timeout_secs: default_extended_timeout(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_observe: None,
            empty_response_threshold: default_empty_threshold(),
            timeout_threshold: default_timeout_threshold(),
            duplicate_threshold: default_duplicate_threshold(),
            inference_enabled: true,
            system_prompt: None,
            next_step_prompt: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            providers: HashMap::new(),
            agent: AgentConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.taskloom/config.toml).
    ///
    /// Environment variable overrides, in priority order:
    /// - `TASKLOOM_PROVIDER` — replaces `default_provider`
    /// - `TASKLOOM_MODEL` — replaces the default provider's model
    /// - `TASKLOOM_API_KEY` (or `OPENROUTER_API_KEY`, `OPENAI_API_KEY`) —
    ///   fills the default provider's api key when the file left it unset
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let config = Self::load_from(&config_path)?;
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Merge environment overrides into a loaded config.
    ///
    /// Takes the lookup as a function so tests can drive it without
    /// mutating process environment.
    fn with_env_overrides(mut self, env: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(provider) = env("TASKLOOM_PROVIDER") {
            self.default_provider = provider;
        }

        let entry = self
            .providers
            .entry(self.default_provider.clone())
            .or_default();

        if let Some(model) = env("TASKLOOM_MODEL") {
            entry.model = model;
        }

        if entry.api_key.is_none() {
            entry.api_key = env("TASKLOOM_API_KEY")
                .or_else(|| env("OPENROUTER_API_KEY"))
                .or_else(|| env("OPENAI_API_KEY"));
        }

        self
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".taskloom")
    }

    /// The provider table selected by `default_provider`, if present.
    pub fn default_provider_config(&self) -> Option<&ProviderConfig> {
        self.providers.get(&self.default_provider)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }
        if self.agent.duplicate_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "agent.duplicate_threshold must be at least 1".into(),
            ));
        }

        for (name, provider) in &self.providers {
            if let Some(t) = provider.temperature
                && !(0.0..=2.0).contains(&t)
            {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{name}.temperature must be between 0.0 and 2.0"
                )));
            }
            if provider.extended_timeout_secs < provider.request_timeout_secs {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{name}.extended_timeout_secs must not be shorter than \
                     request_timeout_secs"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for first-run scaffolding).
    pub fn default_toml() -> String {
        let mut config = Self::default();
        config
            .providers
            .insert(default_provider(), ProviderConfig::default());
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.agent.empty_response_threshold, 3);
        assert!(config.agent.inference_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let mut config = AppConfig::default();
        config
            .providers
            .insert("local".into(), ProviderConfig::default());
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert!(parsed.providers.contains_key("local"));
    }

    #[test]
    fn provider_table_parsing() {
        let toml_str = r#"
default_provider = "ollama"

[providers.ollama]
base_url = "http://localhost:11434/v1"
model = "qwen2.5:14b"
temperature = 0.3
request_timeout_secs = 10
extended_timeout_secs = 60

[agent]
max_steps = 12
max_observe = 2000
inference_enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_provider, "ollama");
        let provider = config.default_provider_config().unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
        assert_eq!(provider.temperature, Some(0.3));
        assert_eq!(config.agent.max_steps, 12);
        assert_eq!(config.agent.max_observe, Some(2000));
        assert!(!config.agent.inference_enabled);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "bad".into(),
            ProviderConfig {
                temperature: Some(5.0),
                ..ProviderConfig::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_steps_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_timeouts_rejected() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "bad".into(),
            ProviderConfig {
                request_timeout_secs: 60,
                extended_timeout_secs: 10,
                ..ProviderConfig::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "default_provider = \"openai\"\n[providers.openai]\napi_key = \"sk-test\""
        )
        .unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(
            config.providers["openai"].api_key.as_deref(),
            Some("sk-test")
        );
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_provider_model_and_key() {
        let config = AppConfig::default().with_env_overrides(env_from(&[
            ("TASKLOOM_PROVIDER", "local"),
            ("TASKLOOM_MODEL", "qwen2.5:14b"),
            ("TASKLOOM_API_KEY", "sk-env"),
        ]));

        assert_eq!(config.default_provider, "local");
        let provider = config.default_provider_config().unwrap();
        assert_eq!(provider.model, "qwen2.5:14b");
        assert_eq!(provider.api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn env_key_fallback_order() {
        let config = AppConfig::default().with_env_overrides(env_from(&[
            ("OPENROUTER_API_KEY", "sk-or"),
            ("OPENAI_API_KEY", "sk-oa"),
        ]));
        let provider = config.default_provider_config().unwrap();
        assert_eq!(provider.api_key.as_deref(), Some("sk-or"));
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "openrouter".into(),
            ProviderConfig {
                api_key: Some("sk-file".into()),
                ..ProviderConfig::default()
            },
        );

        let config =
            config.with_env_overrides(env_from(&[("TASKLOOM_API_KEY", "sk-env")]));
        assert_eq!(
            config.providers["openrouter"].api_key.as_deref(),
            Some("sk-file")
        );
    }

    #[test]
    fn no_env_leaves_config_untouched() {
        let config = AppConfig::default().with_env_overrides(|_| None);
        assert_eq!(config.default_provider, "openrouter");
        // The default provider entry is materialized but stays default.
        assert!(config.default_provider_config().unwrap().api_key.is_none());
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let provider = ProviderConfig {
            api_key: Some("sk-secret-value".into()),
            ..ProviderConfig::default()
        };
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("max_steps"));
    }
}
