//! Hypothesize command handler.
//!
//! Runs the generate -> critique workflow for a research problem.

use super::ask::print_sources;
use super::runtime::{load_pipeline, open_assistant, print_json};
use clap::Args;
use metalrag_core::{config::AppConfig, AppResult};

/// Propose research hypotheses for a problem
#[derive(Args, Debug)]
pub struct HypothesizeCommand {
    /// Problem statement
    pub problem: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Also print the generator's candidates before critique
    #[arg(long)]
    pub show_raw: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HypothesizeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing hypothesize command");

        let pipeline = load_pipeline(config)?;
        let assistant = open_assistant(config, &pipeline).await?;
        let outcome = assistant
            .generate_hypotheses(&self.problem, self.top_k)
            .await?;

        if self.json {
            return print_json(&outcome);
        }

        if self.show_raw {
            println!("Candidates ({}):", outcome.raw_items);
            println!("{}", outcome.raw_text);
            println!();
        }

        println!("Hypotheses:");
        println!("{}", outcome.final_text);

        if !outcome.sources_used.is_empty() {
            println!();
            println!("Sources used:");
            print_sources(&outcome.sources_used);
        }

        Ok(())
    }
}
