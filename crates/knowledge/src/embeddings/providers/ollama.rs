//! Ollama Embedding Provider
//!
//! Provides semantic embeddings via Ollama's local API using multilingual
//! models such as `bge-m3` or `multilingual-e5-large`.
//!
//! # Features
//! - Neural semantic embeddings (1024-dim by default)
//! - Local-first (no API costs, privacy-preserving)
//! - Batch embedding through `/api/embed`
//! - Model availability checked once at construction

use crate::embeddings::EmbeddingConfig;
use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use metalrag_core::AppError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Ollama API endpoint for embeddings
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBED_ENDPOINT: &str = "/api/embed";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Ollama embedding provider using local API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// HTTP client for API requests
    client: Client,
    /// Ollama API base URL
    base_url: String,
    /// Model name (e.g., "bge-m3")
    model: String,
    /// Expected embedding dimensions
    dimensions: usize,
}

/// Request payload for Ollama embed API
#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from Ollama embed API
#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Error response from Ollama API
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a provider and verify that the model is installed and
    /// produces vectors of the configured size.
    ///
    /// # Errors
    /// * `AppError::MissingArtifact` - the model is not available
    /// * `AppError::Config` - the model's dimensions differ from the config
    /// * `AppError::Llm` - Ollama is not reachable
    pub async fn new(config: &EmbeddingConfig) -> Result<Self, AppError> {
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let provider = Self::unverified(&base_url, &config.model, config.dimensions)?;

        provider.verify_connection().await?;

        Ok(provider)
    }

    /// Build a provider without contacting the server.
    pub fn unverified(base_url: &str, model: &str, dimensions: usize) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Llm(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions,
        })
    }

    /// Verify Ollama connection and model availability
    #[instrument(skip(self), fields(model = %self.model))]
    async fn verify_connection(&self) -> Result<(), AppError> {
        debug!("Verifying Ollama connection at {}", self.base_url);

        let probe = vec!["connection check".to_string()];
        match self.request_embeddings(&probe).await {
            Ok(mut embeddings) => {
                let embedding = embeddings.pop().unwrap_or_default();
                if embedding.len() != self.dimensions {
                    return Err(AppError::Config(format!(
                        "Ollama model '{}' returned {} dimensions, expected {}",
                        self.model,
                        embedding.len(),
                        self.dimensions
                    )));
                }
                debug!("Ollama connection verified, model '{}' ready", self.model);
                Ok(())
            }
            Err(e @ AppError::MissingArtifact(_)) => Err(e),
            Err(e) => {
                error!("Failed to connect to Ollama: {}", e);
                Err(AppError::Llm(format!(
                    "Ollama not available at {}: {}",
                    self.base_url, e
                )))
            }
        }
    }

    /// One `/api/embed` call, no retries.
    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let url = format!("{}{}", self.base_url, EMBED_ENDPOINT);

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|r| r.error)
                .unwrap_or(error_text);

            if status == StatusCode::NOT_FOUND {
                return Err(AppError::MissingArtifact(format!(
                    "embedding model '{}' ({}). Run: ollama pull {}",
                    self.model, message, self.model
                )));
            }

            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(body.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "ollama", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let embeddings = self.request_embeddings(texts).await?;

        if embeddings.len() != texts.len() {
            return Err(AppError::Knowledge(format!(
                "Ollama returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
