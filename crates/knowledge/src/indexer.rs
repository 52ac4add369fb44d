//! Chunk store to persisted vector index.

use crate::embeddings::EmbeddingEngine;
use crate::index::store::{sha256_file, FORMAT_VERSION};
use crate::index::{save_index, IndexConfig, IndexKind, IndexManifest};
use crate::jsonl::read_jsonl;
use crate::progress::ProgressReporter;
use crate::types::Chunk;
use chrono::Utc;
use metalrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Outcome of one index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub chunks_read: usize,
    pub malformed_lines: usize,
    pub vectors_indexed: usize,
    pub kind: IndexKind,
    pub dimensions: usize,
    pub embedding_model: String,
    pub index_dir: PathBuf,
    pub duration_secs: f64,
}

/// Embed every chunk of the chunk store and write the index directory.
///
/// Fails when the chunk store holds no valid chunks. Nothing is written
/// unless every chunk was embedded.
pub async fn build_index(
    chunks_path: &Path,
    index_dir: &Path,
    engine: &EmbeddingEngine,
    config: &IndexConfig,
    progress: &ProgressReporter,
) -> AppResult<BuildReport> {
    let started = Instant::now();
    let read = read_jsonl::<Chunk>(chunks_path)?;
    let chunks = read.records;

    if chunks.is_empty() {
        return Err(AppError::Knowledge(format!(
            "No valid chunks in {}; ingest a corpus before building the index",
            chunks_path.display()
        )));
    }

    tracing::info!(
        chunks = chunks.len(),
        malformed = read.malformed,
        model = engine.model_name(),
        "Building index"
    );

    let texts: Vec<String> = chunks.iter().map(|c| c.chunk_text.clone()).collect();
    let vectors = engine.embed_passages(&texts, progress).await?;

    let count = vectors.len();
    let kind = config.resolve_kind(count);
    let manifest = IndexManifest {
        format_version: FORMAT_VERSION,
        kind,
        dimensions: engine.dimensions(),
        count,
        nlist: (kind == IndexKind::Ivf).then(|| config.resolve_nlist(count)),
        nprobe: config.nprobe,
        embedding_provider: engine.provider_name().to_string(),
        embedding_model: engine.model_name().to_string(),
        normalized: engine.normalizes(),
        chunk_store_sha256: sha256_file(chunks_path)?,
        built_at: Utc::now(),
    };

    save_index(index_dir, &chunks, vectors, &manifest, config).await?;
    progress.index(count as u64, Some(count as u64), kind.as_str());

    Ok(BuildReport {
        chunks_read: chunks.len(),
        malformed_lines: read.malformed,
        vectors_indexed: manifest.count,
        kind: manifest.kind,
        dimensions: manifest.dimensions,
        embedding_model: manifest.embedding_model,
        index_dir: index_dir.to_path_buf(),
        duration_secs: started.elapsed().as_secs_f64(),
    })
}
