//! Helpers shared by the command handlers.

use metalrag_core::{config::AppConfig, AppError, AppResult};
use metalrag_knowledge::config::index_dir;
use metalrag_knowledge::{KnowledgeService, PipelineConfig, ProgressReporter, RagAssistant};
use metalrag_llm::{client_from_config, LlmClient};
use metalrag_prompt::PromptSet;
use serde::Serialize;
use std::sync::Arc;

/// Load `pipeline.yaml` for the configured workspace.
pub fn load_pipeline(config: &AppConfig) -> AppResult<PipelineConfig> {
    PipelineConfig::load(&config.workspace)
}

/// Progress lines go to stderr; JSON runs stay quiet so stdout parses cleanly.
pub fn progress_reporter(json: bool) -> ProgressReporter {
    if json {
        return ProgressReporter::noop();
    }
    ProgressReporter::new(Arc::new(|event| eprintln!("{}", event.format_simple())))
}

/// Open the index and connect the chat model.
pub async fn open_assistant(
    config: &AppConfig,
    pipeline: &PipelineConfig,
) -> AppResult<RagAssistant> {
    let service = open_service(config, pipeline).await?;
    let llm = client_from_config(config)?;
    let prompts = PromptSet::load(&config.workspace)?;

    tracing::debug!(
        provider = llm.provider_name(),
        model = %config.model,
        vectors = service.len(),
        "Assistant ready"
    );

    Ok(RagAssistant::new(
        Arc::new(service),
        llm,
        prompts,
        pipeline,
        &config.model,
    ))
}

/// Open the index without a chat model.
pub async fn open_service(
    config: &AppConfig,
    pipeline: &PipelineConfig,
) -> AppResult<KnowledgeService> {
    KnowledgeService::open(&index_dir(&config.workspace), &pipeline.embedding).await
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(format!("JSON serialization failed: {}", e)))?;
    println!("{}", output);
    Ok(())
}
