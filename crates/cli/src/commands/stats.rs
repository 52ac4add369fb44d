//! Stats command handler.
//!
//! Reports what the workspace currently holds.

use super::runtime::print_json;
use clap::Args;
use metalrag_core::{config::AppConfig, AppResult};

/// Show corpus and index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = metalrag_knowledge::stats(&config.workspace)?;

        if self.json {
            return print_json(&stats);
        }

        let count = |value: Option<usize>| match value {
            Some(n) => n.to_string(),
            None => "-".to_string(),
        };

        println!("Workspace: {}", config.workspace.display());
        println!("  Raw articles: {}", count(stats.raw_articles));
        println!("  Chunks: {}", count(stats.chunks));
        println!("  Indexed vectors: {}", count(stats.indexed_vectors));
        if let Some(kind) = stats.index_kind {
            println!("  Index kind: {}", kind);
        }
        if let Some(model) = &stats.embedding_model {
            println!("  Embedding model: {}", model);
        }
        if let Some(built_at) = stats.built_at {
            println!("  Built at: {}", built_at.to_rfc3339());
        }
        println!("  Index size: {} bytes", stats.index_size_bytes);

        Ok(())
    }
}
