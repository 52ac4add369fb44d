//! Embedding engine.
//!
//! One provider is created at startup and reused for every passage and
//! query, so corpus and question vectors always come from the same model.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use crate::progress::ProgressReporter;
use metalrag_core::{AppError, AppResult};
use std::sync::Arc;

/// Batched, normalizing front end for a single embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
}

impl EmbeddingEngine {
    /// Create the configured provider and wrap it.
    pub async fn from_config(config: &EmbeddingConfig) -> AppResult<Self> {
        let provider = create_provider(config).await?;
        Self::new(provider, config.clone())
    }

    /// Wrap an existing provider.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> AppResult<Self> {
        config.validate()?;
        if provider.dimensions() != config.dimensions {
            return Err(AppError::Config(format!(
                "Provider '{}' yields {} dimensions, configured {}",
                provider.provider_name(),
                provider.dimensions(),
                config.dimensions
            )));
        }

        tracing::debug!(
            provider = provider.provider_name(),
            model = provider.model_name(),
            dimensions = config.dimensions,
            "Embedding engine ready"
        );

        Ok(Self { provider, config })
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub fn normalizes(&self) -> bool {
        self.config.normalize
    }

    /// Embed corpus passages in batches; output order matches input.
    pub async fn embed_passages(
        &self,
        texts: &[String],
        progress: &ProgressReporter,
    ) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Embedding {} passages using provider '{}' (model: {})",
            texts.len(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        let total = texts.len() as u64;
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.batch_size) {
            let prefixed: Vec<String> = batch
                .iter()
                .map(|t| format!("{}{}", self.config.passage_prefix, t))
                .collect();
            let embedded = self.embed_checked(&prefixed).await?;
            vectors.extend(embedded);

            progress.embed(vectors.len() as u64, Some(total), self.provider.model_name());
        }

        tracing::debug!(
            "Generated {} embeddings of dimension {}",
            vectors.len(),
            self.config.dimensions
        );

        Ok(vectors)
    }

    /// Embed one query with the same model as the corpus.
    pub async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>> {
        let text = vec![format!("{}{}", self.config.query_prefix, query)];
        let mut vectors = self.embed_checked(&text).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }

    async fn embed_checked(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut vectors = self.provider.embed_batch(texts).await?;

        if vectors.len() != texts.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding count mismatch: {} texts, {} vectors",
                texts.len(),
                vectors.len()
            )));
        }

        for vector in vectors.iter_mut() {
            if vector.len() != self.config.dimensions {
                return Err(AppError::Knowledge(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.config.dimensions,
                    vector.len()
                )));
            }
            if self.config.normalize {
                l2_normalize(vector);
            }
        }

        Ok(vectors)
    }
}

/// Scale `vector` to unit length; zero vectors stay zero.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
