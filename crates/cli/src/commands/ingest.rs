//! Ingest command handler.
//!
//! Cleans and chunks the raw corpus into the chunk store.

use super::runtime::{load_pipeline, print_json, progress_reporter};
use clap::Args;
use metalrag_core::{config::AppConfig, AppResult};
use metalrag_knowledge::config::{chunk_store_path, raw_corpus_path};
use metalrag_knowledge::{ingest_corpus, Chunker};
use std::path::PathBuf;

/// Chunk the raw corpus into token windows
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Raw corpus (default: .metalrag/data/raw.jsonl)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Chunk store (default: .metalrag/data/chunks.jsonl)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let pipeline = load_pipeline(config)?;
        let input = self
            .input
            .clone()
            .unwrap_or_else(|| raw_corpus_path(&config.workspace));
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| chunk_store_path(&config.workspace));

        let chunker = Chunker::from_config(&pipeline.chunking)?;
        let report = ingest_corpus(&input, &output, &chunker, &progress_reporter(self.json))?;

        if self.json {
            print_json(&report)?;
        } else {
            println!(
                "Wrote {} chunks from {} articles in {:.1}s",
                report.chunks_written, report.articles_read, report.duration_secs
            );
            println!(
                "  Skipped: {} malformed, {} duplicate, {} incomplete, {} too short; {} short chunks discarded",
                report.malformed_lines,
                report.duplicate_sources,
                report.incomplete_articles,
                report.skipped_short,
                report.chunks_discarded
            );
            println!("Chunk store: {}", report.output.display());
        }

        Ok(())
    }
}
