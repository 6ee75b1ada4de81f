//! Provider registry.
//!
//! Holds the set of constructed providers for one process and names which
//! one is the default. Registration is explicit: providers are built once,
//! up front, from configuration. There is no global lookup table and no
//! lazy construction, so two agents configured differently can coexist in
//! the same process without sharing state.

use crate::openai_compat::OpenAiCompatProvider;
use std::collections::HashMap;
use std::sync::Arc;
use taskloom_config::AppConfig;
use taskloom_core::error::ProviderError;
use taskloom_core::provider::CompletionProvider;
use tracing::info;

/// A named collection of completion providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CompletionProvider>>,
    default_provider: Option<String>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .field("default_provider", &self.default_provider)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with one provider per configured table.
    ///
    /// The config's `default_provider` becomes the registry default; it is
    /// an error for it to name a table that does not exist.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        for (name, provider_config) in &config.providers {
            registry.register(Arc::new(OpenAiCompatProvider::from_config(
                name.clone(),
                provider_config,
            )));
        }

        if !registry.providers.contains_key(&config.default_provider) {
            return Err(ProviderError::NotConfigured(config.default_provider.clone()));
        }
        registry.default_provider = Some(config.default_provider.clone());

        info!(
            providers = registry.providers.len(),
            default = %config.default_provider,
            "Provider registry initialized"
        );
        Ok(registry)
    }

    /// Register a provider under its own name. The first registration also
    /// becomes the default until one is chosen explicitly.
    pub fn register(&mut self, provider: Arc<dyn CompletionProvider>) {
        let name = provider.name().to_string();
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    pub fn set_default(&mut self, name: impl Into<String>) -> Result<(), ProviderError> {
        let name = name.into();
        if !self.providers.contains_key(&name) {
            return Err(ProviderError::NotConfigured(name));
        }
        self.default_provider = Some(name);
        Ok(())
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured(name.to_string()))
    }

    /// The default provider.
    pub fn default_provider(&self) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        let name = self
            .default_provider
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("(no providers registered)".into()))?;
        self.get(name)
    }

    /// Registered provider names, sorted for stable display.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use taskloom_config::ProviderConfig;

    fn config_with(default: &str, tables: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.default_provider = default.into();
        for name in tables {
            config
                .providers
                .insert(name.to_string(), ProviderConfig::default());
        }
        config
    }

    #[test]
    fn from_config_builds_each_table() {
        let registry =
            ProviderRegistry::from_config(&config_with("openrouter", &["openrouter", "local"]))
                .unwrap();
        assert_eq!(registry.names(), vec!["local", "openrouter"]);
        assert_eq!(registry.default_provider().unwrap().name(), "openrouter");
    }

    #[test]
    fn missing_default_table_is_rejected() {
        let err = ProviderRegistry::from_config(&config_with("ghost", &["openrouter"]))
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(name) if name == "ghost"));
    }

    #[test]
    fn first_registration_becomes_default() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(OpenAiCompatProvider::openrouter("k", "m")));
        registry.register(Arc::new(OpenAiCompatProvider::ollama(None, "qwen2.5")));
        assert_eq!(registry.default_provider().unwrap().name(), "openrouter");

        registry.set_default("ollama").unwrap();
        assert_eq!(registry.default_provider().unwrap().name(), "ollama");
    }

    #[test]
    fn unknown_lookup_is_an_error() {
        let registry = ProviderRegistry::new();
        assert!(registry.get("nope").is_err());
        assert!(registry.default_provider().is_err());
    }
}
