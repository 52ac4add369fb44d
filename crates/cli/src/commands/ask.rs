//! Ask command handler.
//!
//! Answers a question from the indexed articles.

use super::runtime::{load_pipeline, open_assistant, print_json};
use clap::Args;
use metalrag_core::{config::AppConfig, AppResult};
use metalrag_knowledge::rag::RagSourceRef;

/// Answer a question using the article base
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let pipeline = load_pipeline(config)?;
        let assistant = open_assistant(config, &pipeline).await?;
        let answer = assistant.ask(&self.question, self.top_k).await?;

        if self.json {
            return print_json(&answer);
        }

        println!("{}", answer.answer);
        if !answer.sources.is_empty() {
            println!();
            println!("Sources:");
            print_sources(&answer.sources);
        }

        Ok(())
    }
}

/// One line per source: title, year, link.
pub(crate) fn print_sources(sources: &[RagSourceRef]) {
    for (n, source) in sources.iter().enumerate() {
        let year = source.year.map(|y| format!(" ({})", y)).unwrap_or_default();
        let link = source.pdf_url.as_deref().unwrap_or(&source.source);
        println!("  {}. {}{} - {}", n + 1, source.title, year, link);
    }
}
