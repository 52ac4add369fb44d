//! LLM provider factory.
//!
//! Builds a client from the application configuration: resolves the
//! provider, injects secrets and endpoints, applies configured timeouts.

use std::sync::Arc;
use std::time::Duration;

use metalrag_core::config::{AppConfig, ProviderConfig};
use metalrag_core::{AppError, AppResult};

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;

/// Connection settings for a provider.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub timeout: Option<Duration>,
}

impl ClientOptions {
    /// Collect options for `provider` from the loaded configuration.
    pub fn from_config(config: &AppConfig, provider: &str) -> Self {
        let provider_config = config.get_provider_config(provider);

        let organization = match provider_config {
            Some(ProviderConfig::OpenAI {
                organization_env: Some(env),
                ..
            }) => std::env::var(env).ok(),
            _ => None,
        };

        Self {
            endpoint: config.resolve_endpoint(provider),
            api_key: config.resolve_api_key(provider),
            organization,
            timeout: provider_config
                .and_then(|pc| pc.timeout_secs())
                .map(Duration::from_secs),
        }
    }
}

/// Create an LLM client for the named provider.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required
/// secret is missing.
pub fn create_client(provider: &str, options: &ClientOptions) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    match provider_type {
        ProviderType::Ollama => {
            let base_url = options
                .endpoint
                .as_deref()
                .unwrap_or("http://localhost:11434");
            let client = match options.timeout {
                Some(timeout) => OllamaClient::with_timeout(base_url, timeout)?,
                None => OllamaClient::with_base_url(base_url),
            };
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI => {
            let api_key = options.api_key.as_deref().ok_or_else(|| {
                AppError::Config("OpenAI-compatible provider requires an API key".to_string())
            })?;

            let mut client = OpenAiClient::new(options.endpoint.as_deref(), api_key);
            if let Some(org) = &options.organization {
                client = client.with_organization(org.clone());
            }
            if let Some(timeout) = options.timeout {
                client = client.with_timeout(timeout)?;
            }
            Ok(Arc::new(client))
        }
    }
}

/// Create the client for the active provider of `config`.
pub fn client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let options = ClientOptions::from_config(config, &config.provider);
    tracing::debug!(
        provider = %config.provider,
        endpoint = ?options.endpoint,
        "Creating LLM client"
    );
    create_client(&config.provider, &options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", &ClientOptions::default()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint_and_timeout() {
        let options = ClientOptions {
            endpoint: Some("http://localhost:8080".to_string()),
            timeout: Some(Duration::from_secs(120)),
            ..Default::default()
        };
        assert!(create_client("ollama", &options).is_ok());
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", &ClientOptions::default()) {
            Err(AppError::Config(msg)) => assert!(msg.contains("requires an API key")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }

    #[test]
    fn test_openai_with_key() {
        let options = ClientOptions {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let client = create_client("openai", &options).unwrap();
        assert_eq!(client.provider_name(), "openai");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", &ClientOptions::default()) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }

    #[test]
    fn test_client_from_default_config_is_ollama() {
        let client = client_from_config(&AppConfig::default()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }
}
