//! Provider selection from configuration.

use std::sync::Arc;

use agentloop_config::AppConfig;
use agentloop_core::error::ProviderError;
use agentloop_core::provider::ModelProvider;
use tracing::info;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the provider named by `config.provider`.
///
/// Hosted providers need an API key; `ollama` does not. Any other name is
/// treated as an OpenAI-compatible endpoint and needs a base URL, either
/// from `base_url` or from the list of well-known endpoints.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    let name = config.provider.as_str();
    let base_url = config
        .base_url
        .clone()
        .or_else(|| default_base_url(name).map(String::from));

    let provider: Arc<dyn ModelProvider> = match name {
        "anthropic" => {
            let mut p = AnthropicProvider::new(require_key(config)?, &config.model);
            if let Some(url) = &config.base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        "ollama" => Arc::new(OpenAiCompatProvider::ollama(base_url.as_deref(), &config.model)),
        _ => {
            let url = base_url.ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "unknown provider '{name}': set base_url to use it as an OpenAI-compatible endpoint"
                ))
            })?;
            Arc::new(OpenAiCompatProvider::new(name, url, require_key(config)?, &config.model))
        }
    };

    info!(provider = %name, model = %config.model, "Provider configured");
    Ok(provider)
}

fn require_key(config: &AppConfig) -> Result<String, ProviderError> {
    config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(format!(
            "no API key for provider '{}' (set AGENTLOOP_API_KEY or api_key in config.toml)",
            config.provider
        ))
    })
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        _ => None,
    }
}
