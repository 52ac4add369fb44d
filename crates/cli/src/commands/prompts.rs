//! Prompts command handler.
//!
//! Lists the prompt templates in effect and where each one comes from.

use super::runtime::print_json;
use clap::Args;
use metalrag_core::{config::AppConfig, AppResult};
use metalrag_prompt::{list_prompts, resolve_prompt, BUILTIN_PROMPT_IDS};
use serde::Serialize;

/// List prompt templates
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct PromptEntry {
    id: String,
    title: String,
    variables: Vec<String>,
    /// "workspace" or "builtin"
    origin: &'static str,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompts command");

        let overrides = list_prompts(&config.workspace)?;
        let mut ids: Vec<String> = BUILTIN_PROMPT_IDS.iter().map(|id| id.to_string()).collect();
        for id in &overrides {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            let definition = resolve_prompt(&config.workspace, &id)?;
            entries.push(PromptEntry {
                origin: if overrides.contains(&id) {
                    "workspace"
                } else {
                    "builtin"
                },
                id,
                title: definition.title,
                variables: definition.input.variables,
            });
        }

        if self.json {
            return print_json(&entries);
        }

        for entry in &entries {
            println!(
                "{} [{}] - {} ({})",
                entry.id,
                entry.origin,
                entry.title,
                entry.variables.join(", ")
            );
        }

        Ok(())
    }
}
