//! Fetch command handler.
//!
//! Collects article metadata from the literature APIs into the raw corpus.

use super::runtime::{load_pipeline, print_json, progress_reporter};
use clap::Args;
use metalrag_core::{config::AppConfig, AppResult};
use metalrag_knowledge::config::raw_corpus_path;
use metalrag_knowledge::fetch::create_sources;
use metalrag_knowledge::fetch_corpus;
use std::path::PathBuf;

/// Search arXiv and OpenAlex and write the raw corpus
#[derive(Args, Debug)]
pub struct FetchCommand {
    /// Search keyword (repeatable; replaces the configured list)
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    /// Maximum number of articles to keep
    #[arg(long)]
    pub max_articles: Option<usize>,

    /// Output file (default: .metalrag/data/raw.jsonl)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl FetchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing fetch command");

        let mut fetch = load_pipeline(config)?.fetch;
        if !self.keywords.is_empty() {
            fetch.keywords = self.keywords.clone();
        }
        if let Some(max) = self.max_articles {
            fetch.max_articles = max;
            fetch.stop_after = fetch.stop_after.min(max);
        }

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| raw_corpus_path(&config.workspace));
        let sources = create_sources(&fetch)?;
        let report = fetch_corpus(&sources, &fetch, &output, &progress_reporter(self.json)).await?;

        if self.json {
            print_json(&report)?;
        } else {
            println!(
                "Fetched {} articles ({} received, {} duplicates, {} incomplete, {} source errors) in {:.1}s",
                report.articles_written,
                report.articles_received,
                report.duplicates,
                report.incomplete,
                report.source_errors,
                report.duration_secs
            );
            println!("Corpus: {}", report.output.display());
        }

        Ok(())
    }
}
