//! Raw corpus to chunk store.

use crate::chunker::{ArticleChunks, Chunker};
use crate::jsonl::{read_jsonl, write_jsonl_atomic};
use crate::progress::ProgressReporter;
use crate::types::{Article, Chunk};
use metalrag_core::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Counters from one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub articles_read: usize,
    pub malformed_lines: usize,
    pub duplicate_sources: usize,
    pub incomplete_articles: usize,
    pub skipped_short: usize,
    pub chunks_written: usize,
    pub chunks_discarded: usize,
    pub output: PathBuf,
    pub duration_secs: f64,
}

/// Chunk every article of the raw corpus and write the chunk store.
///
/// Malformed lines are skipped and counted. The first complete record wins
/// when two share a `source`; incomplete records never claim a source. The output file is replaced atomically, so an
/// interrupted run leaves the previous chunk store untouched, and running
/// twice on the same corpus produces the same chunks.
pub fn ingest_corpus(
    raw_path: &Path,
    output_path: &Path,
    chunker: &Chunker,
    progress: &ProgressReporter,
) -> AppResult<IngestReport> {
    let started = Instant::now();
    let read = read_jsonl::<Article>(raw_path)?;

    tracing::info!(
        input = %raw_path.display(),
        articles = read.records.len(),
        malformed = read.malformed,
        tokenizer = chunker.tokenizer_name(),
        "Ingesting corpus"
    );

    let mut report = IngestReport {
        articles_read: read.records.len(),
        malformed_lines: read.malformed,
        output: output_path.to_path_buf(),
        ..Default::default()
    };

    let total = read.records.len() as u64;
    let mut seen = HashSet::new();
    let mut chunks: Vec<Chunk> = Vec::new();

    for (idx, article) in read.records.iter().enumerate() {
        if !article.is_complete() {
            report.incomplete_articles += 1;
            continue;
        }
        if !seen.insert(article.source.clone()) {
            report.duplicate_sources += 1;
            continue;
        }

        match chunker.chunk_article(article)? {
            ArticleChunks::Chunks {
                chunks: article_chunks,
                discarded,
            } => {
                report.chunks_discarded += discarded;
                chunks.extend(article_chunks);
            }
            ArticleChunks::TooShort { chars } => {
                tracing::debug!(source = %article.source, chars, "Skipping short article");
                report.skipped_short += 1;
            }
        }

        progress.chunk(idx as u64 + 1, Some(total), chunks.len());
    }

    if chunks.is_empty() {
        tracing::warn!("Ingestion produced no chunks; an index cannot be built from this corpus");
    }

    write_jsonl_atomic(output_path, &chunks)?;

    report.chunks_written = chunks.len();
    report.duration_secs = started.elapsed().as_secs_f64();

    tracing::info!(
        chunks = report.chunks_written,
        skipped_short = report.skipped_short,
        duplicates = report.duplicate_sources,
        output = %output_path.display(),
        "Ingestion complete"
    );

    Ok(report)
}
