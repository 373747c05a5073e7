//! Provider router: selects the completion provider based on config.

use crate::openai_compat::OpenAiCompatProvider;
use personabot_core::error::ProviderError;
use personabot_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;

/// Named provider registry with a default entry.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build the configured provider.
///
/// Remote providers require an API key; Ollama does not.
pub fn build_from_config(
    config: &personabot_config::AppConfig,
) -> Result<ProviderRouter, ProviderError> {
    let mut router = ProviderRouter::new(&config.provider);
    let name = config.provider.as_str();

    let provider: Arc<dyn Provider> = match (name, config.api_key.as_deref()) {
        ("ollama", _) => Arc::new(OpenAiCompatProvider::ollama(config.api_url.as_deref())),
        (_, None) => {
            return Err(ProviderError::NotConfigured(format!(
                "No API key configured for provider '{name}'"
            )));
        }
        (_, Some(api_key)) => {
            let base_url = config
                .api_url
                .clone()
                .or_else(|| default_base_url(name).map(String::from))
                .ok_or_else(|| {
                    ProviderError::NotConfigured(format!(
                        "Provider '{name}' needs api_url to be set"
                    ))
                })?;
            Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
        }
    };

    router.register(name, provider);
    Ok(router)
}

/// Known base URLs for well-known providers.
fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        _ => None,
    }
}
