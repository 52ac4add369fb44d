//! Loaded index plus the embedding engine that queries it.
//!
//! Immutable after construction and shared between requests by `Arc`.

use crate::embeddings::{EmbeddingConfig, EmbeddingEngine};
use crate::index::store::read_manifest;
use crate::index::{load_index, IndexManifest, LoadedIndex, VectorIndex};
use crate::rag::types::SearchHit;
use crate::types::Chunk;
use metalrag_core::{AppError, AppResult};
use std::path::Path;

#[derive(Debug)]
pub struct KnowledgeService {
    index: Box<dyn VectorIndex>,
    metadata: Vec<Chunk>,
    manifest: IndexManifest,
    engine: EmbeddingEngine,
}

impl KnowledgeService {
    /// Pair a loaded index with an engine; the engine must produce vectors
    /// in the same space the index was built in.
    pub fn new(loaded: LoadedIndex, engine: EmbeddingEngine) -> AppResult<Self> {
        let manifest = &loaded.manifest;

        if engine.provider_name() != manifest.embedding_provider
            || engine.model_name() != manifest.embedding_model
        {
            return Err(AppError::Config(format!(
                "Embedding model mismatch: index was built with {}/{}, engine uses {}/{}",
                manifest.embedding_provider,
                manifest.embedding_model,
                engine.provider_name(),
                engine.model_name()
            )));
        }
        if engine.dimensions() != manifest.dimensions {
            return Err(AppError::Config(format!(
                "Dimension mismatch: index has {}, engine produces {}",
                manifest.dimensions,
                engine.dimensions()
            )));
        }
        if engine.normalizes() != manifest.normalized {
            tracing::warn!(
                index_normalized = manifest.normalized,
                engine_normalized = engine.normalizes(),
                "Normalization differs between index and query engine"
            );
        }

        Ok(Self {
            index: loaded.index,
            metadata: loaded.metadata,
            manifest: loaded.manifest,
            engine,
        })
    }

    /// Load the index at `index_dir` and start the configured embedding
    /// provider. The manifest is checked before anything heavy is loaded.
    pub async fn open(index_dir: &Path, config: &EmbeddingConfig) -> AppResult<Self> {
        let manifest = read_manifest(index_dir)?;
        config.validate_consistency(
            &manifest.embedding_provider,
            &manifest.embedding_model,
            manifest.dimensions,
        )?;

        let loaded = load_index(index_dir).await?;
        let engine = EmbeddingEngine::from_config(config).await?;
        Self::new(loaded, engine)
    }

    /// Embed `query` and return the `k` nearest chunks.
    pub async fn search(&self, query: &str, k: usize) -> AppResult<Vec<SearchHit>> {
        if query.trim().is_empty() || k == 0 {
            tracing::debug!(k, "Empty query or k = 0, no results");
            return Ok(Vec::new());
        }

        let vector = self.engine.embed_query(query).await?;
        self.search_vector(&vector, k).await
    }

    /// Nearest chunks for an already embedded query.
    pub async fn search_vector(&self, vector: &[f32], k: usize) -> AppResult<Vec<SearchHit>> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let neighbors = self.index.search(vector, k).await?;
        let mut hits = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            match self.metadata.get(neighbor.ordinal) {
                Some(chunk) => hits.push(SearchHit::from_chunk(
                    chunk,
                    neighbor.ordinal,
                    neighbor.distance,
                )),
                None => tracing::warn!(
                    ordinal = neighbor.ordinal,
                    "Index returned an ordinal without metadata"
                ),
            }
        }

        if hits.is_empty() {
            tracing::info!("Search returned no results");
        } else {
            tracing::debug!(
                hits = hits.len(),
                best = hits[0].distance,
                "Search finished"
            );
        }
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn engine(&self) -> &EmbeddingEngine {
        &self.engine
    }

    /// Chunk stored at `ordinal`.
    pub fn chunk(&self, ordinal: usize) -> Option<&Chunk> {
        self.metadata.get(ordinal)
    }

    /// Stored vector at `ordinal`.
    pub async fn vector(&self, ordinal: usize) -> AppResult<Option<Vec<f32>>> {
        self.index.vector(ordinal).await
    }
}
