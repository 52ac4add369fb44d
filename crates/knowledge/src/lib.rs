//! Metallurgy literature knowledge base.
//!
//! The offline pipeline runs fetch -> ingest -> index and leaves its
//! artifacts under `.metalrag/`. At query time a [`KnowledgeService`] holds
//! the loaded index and embedding engine, and a [`RagAssistant`] answers
//! questions and generates research hypotheses over it.

pub mod chunker;
pub mod clean;
pub mod config;
pub mod embeddings;
pub mod fetch;
pub mod index;
pub mod indexer;
pub mod ingest;
pub mod jsonl;
pub mod progress;
pub mod rag;
pub mod tokenizer;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::{Chunker, ChunkingConfig};
pub use config::{PipelineConfig, RetrievalConfig};
pub use embeddings::{EmbeddingConfig, EmbeddingEngine};
pub use fetch::{fetch_corpus, FetchConfig, FetchReport};
pub use index::{IndexChoice, IndexConfig, IndexKind};
pub use indexer::{build_index, BuildReport};
pub use ingest::{ingest_corpus, IngestReport};
pub use progress::{ProgressEvent, ProgressReporter};
pub use rag::{HypothesisOutcome, KnowledgeService, RagAnswer, RagAssistant, SearchHit};
pub use types::{Article, Chunk};

use chrono::{DateTime, Utc};
use metalrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

/// Snapshot of the workspace artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeStats {
    /// Valid records in the raw corpus, if it exists
    pub raw_articles: Option<usize>,
    /// Valid records in the chunk store, if it exists
    pub chunks: Option<usize>,
    pub indexed_vectors: Option<usize>,
    pub index_kind: Option<IndexKind>,
    pub embedding_model: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    /// Total size of the files under the index directory
    pub index_size_bytes: u64,
}

/// Collect counts for whatever artifacts exist in the workspace.
///
/// Missing artifacts are reported as `None`, not as errors.
pub fn stats(workspace: &Path) -> AppResult<KnowledgeStats> {
    tracing::info!("Collecting knowledge base stats");

    let raw_path = config::raw_corpus_path(workspace);
    let raw_articles = if raw_path.exists() {
        Some(jsonl::read_jsonl::<Article>(&raw_path)?.records.len())
    } else {
        None
    };

    let chunk_path = config::chunk_store_path(workspace);
    let chunks = if chunk_path.exists() {
        Some(jsonl::read_jsonl::<Chunk>(&chunk_path)?.records.len())
    } else {
        None
    };

    let index_dir = config::index_dir(workspace);
    let manifest = if index_dir.join(index::store::MANIFEST_FILE).exists() {
        Some(index::store::read_manifest(&index_dir)?)
    } else {
        None
    };

    let mut index_size_bytes = 0;
    if index_dir.is_dir() {
        for entry in WalkDir::new(&index_dir) {
            let entry = entry.map_err(|e| {
                AppError::Knowledge(format!("Failed to walk {}: {}", index_dir.display(), e))
            })?;
            if entry.file_type().is_file() {
                index_size_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
    }

    Ok(KnowledgeStats {
        raw_articles,
        chunks,
        indexed_vectors: manifest.as_ref().map(|m| m.count),
        index_kind: manifest.as_ref().map(|m| m.kind),
        embedding_model: manifest.as_ref().map(|m| m.embedding_model.clone()),
        built_at: manifest.map(|m| m.built_at),
        index_size_bytes,
    })
}
