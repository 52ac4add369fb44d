//! Index command handler.
//!
//! Embeds the chunk store and writes the vector index.

use super::runtime::{load_pipeline, print_json, progress_reporter};
use clap::Args;
use metalrag_core::{config::AppConfig, AppResult};
use metalrag_knowledge::config::{chunk_store_path, index_dir};
use metalrag_knowledge::{build_index, EmbeddingEngine, IndexChoice};
use std::path::PathBuf;

/// Embed all chunks and build the vector index
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Chunk store (default: .metalrag/data/chunks.jsonl)
    #[arg(long)]
    pub chunks: Option<PathBuf>,

    /// Index layout: auto, flat or ivf
    #[arg(long)]
    pub kind: Option<IndexChoice>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command");

        let pipeline = load_pipeline(config)?;
        let mut index_config = pipeline.index.clone();
        if let Some(kind) = self.kind {
            index_config.kind = kind;
        }

        let chunks = self
            .chunks
            .clone()
            .unwrap_or_else(|| chunk_store_path(&config.workspace));
        let engine = EmbeddingEngine::from_config(&pipeline.embedding).await?;

        let report = build_index(
            &chunks,
            &index_dir(&config.workspace),
            &engine,
            &index_config,
            &progress_reporter(self.json),
        )
        .await?;

        if self.json {
            print_json(&report)?;
        } else {
            println!(
                "Indexed {} chunks ({} index, {} dimensions, model {}) in {:.1}s",
                report.vectors_indexed,
                report.kind,
                report.dimensions,
                report.embedding_model,
                report.duration_secs
            );
            if report.malformed_lines > 0 {
                println!("  Skipped {} malformed lines", report.malformed_lines);
            }
            println!("Index: {}", report.index_dir.display());
        }

        Ok(())
    }
}
