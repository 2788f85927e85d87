use crate::config::LlmConfig;
use crate::providers::{GroqProvider, ProviderKind};
use crate::traits::Provider;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider '{0}' is not implemented yet. Set llm.provider = \"groq\".")]
    Unsupported(ProviderKind),

    #[error("No API key found for {kind}. Set llm.api_key or one of: {env_vars}")]
    MissingApiKey {
        kind: ProviderKind,
        env_vars: String,
    },
}

pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn Provider>, ProviderError> {
    match config.provider {
        ProviderKind::Groq => {
            let api_key = resolve_api_key(
                config.provider,
                config.api_key.as_deref(),
                |var| std::env::var(var).ok(),
            )?;
            let mut provider = GroqProvider::new(api_key)
                .with_model(config.model.clone())
                .with_params(config.params.clone());
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Box::new(provider))
        }
        kind @ (ProviderKind::OpenAi | ProviderKind::Ollama) => {
            Err(ProviderError::Unsupported(kind))
        }
    }
}

/// Environment variables are checked before the config file key.
fn resolve_api_key(
    kind: ProviderKind,
    config_key: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ProviderError> {
    for var_name in kind.api_key_env_vars() {
        if let Some(key) = lookup(var_name).filter(|k| !k.trim().is_empty()) {
            return Ok(key);
        }
    }

    match config_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => Ok(key.to_string()),
        None => Err(ProviderError::MissingApiKey {
            kind,
            env_vars: kind.api_key_env_vars().join(", "),
        }),
    }
}
