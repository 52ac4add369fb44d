//! Embedding configuration (`embedding` section of `pipeline.yaml`).

use metalrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Embedding model settings shared by indexing and querying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "ollama" or "trigram"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Whether to normalize embeddings to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Texts per provider request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Provider base URL; Ollama defaults to `http://localhost:11434`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Prepended to queries before embedding (e.g. `query: `)
    #[serde(default)]
    pub query_prefix: String,

    /// Prepended to chunk texts before embedding (e.g. `passage: `)
    #[serde(default)]
    pub passage_prefix: String,
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "bge-m3".to_string()
}

fn default_dimensions() -> usize {
    1024
}

fn default_normalize() -> bool {
    true
}

fn default_batch_size() -> usize {
    16
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            normalize: default_normalize(),
            batch_size: default_batch_size(),
            endpoint: None,
            query_prefix: String::new(),
            passage_prefix: String::new(),
        }
    }
}

impl EmbeddingConfig {
    /// Offline configuration backed by the trigram provider.
    pub fn trigram(dimensions: usize) -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(AppError::Config("embedding.model must be set".to_string()));
        }
        Ok(())
    }

    /// Check that an index built with `provider`/`model`/`dimensions` can be
    /// queried with this configuration.
    pub fn validate_consistency(
        &self,
        provider: &str,
        model: &str,
        dimensions: usize,
    ) -> AppResult<()> {
        if self.provider != provider {
            return Err(AppError::Config(format!(
                "Embedding provider mismatch: index was built with '{}', configured '{}'",
                provider, self.provider
            )));
        }

        if self.model != model {
            return Err(AppError::Config(format!(
                "Embedding model mismatch: index was built with '{}', configured '{}'",
                model, self.model
            )));
        }

        if self.dimensions != dimensions {
            return Err(AppError::Config(format!(
                "Dimension mismatch: index has {}, configured {}",
                dimensions, self.dimensions
            )));
        }

        Ok(())
    }
}
