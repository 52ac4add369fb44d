//! Search command handler.

use super::runtime::{load_pipeline, open_service, print_json};
use clap::Args;
use metalrag_core::{config::AppConfig, AppResult};

/// Show the nearest chunks for a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of chunks to retrieve (default: QA retrieval size)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let pipeline = load_pipeline(config)?;
        let service = open_service(config, &pipeline).await?;
        let k = self.top_k.unwrap_or(pipeline.retrieval.qa_top_k);
        let hits = service.search(&self.query, k).await?;

        if self.json {
            return print_json(&hits);
        }

        if hits.is_empty() {
            println!("No results.");
            return Ok(());
        }

        for (rank, hit) in hits.iter().enumerate() {
            let year = hit.year.map(|y| format!(", {}", y)).unwrap_or_default();
            println!("{}. {} [{}{}] d={:.4}", rank + 1, hit.title, hit.source, year, hit.distance);
            if let Some(url) = &hit.pdf_url {
                println!("   {}", url);
            }
        }

        Ok(())
    }
}
