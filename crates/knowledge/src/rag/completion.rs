//! One prompt -> one model call.

use crate::rag::types::RoleSettings;
use metalrag_core::{AppError, AppResult};
use metalrag_llm::{LlmClient, LlmRequest};
use metalrag_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;

/// Render `prompt` with `variables` and send it with the role's settings.
///
/// Model failures stay `AppError::Llm` with `stage` prefixed; an empty
/// completion counts as a model failure.
pub(crate) async fn complete_prompt(
    llm: &dyn LlmClient,
    prompt: &PromptDefinition,
    variables: &HashMap<String, String>,
    role: &RoleSettings,
    stage: &str,
) -> AppResult<String> {
    let built = build_prompt(prompt, variables)?;

    let mut request =
        LlmRequest::new(built.user, role.model.clone()).with_temperature(role.temperature);
    if let Some(system) = built.system {
        request = request.with_system(system);
    }
    if let Some(max_tokens) = role.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }

    tracing::debug!(
        stage,
        provider = llm.provider_name(),
        model = %role.model,
        temperature = role.temperature,
        "Calling model"
    );

    let response = llm.complete(&request).await.map_err(|e| match e {
        AppError::Llm(msg) => AppError::Llm(format!("{}: {}", stage, msg)),
        other => other,
    })?;

    let content = response.content.trim();
    if content.is_empty() {
        return Err(AppError::Llm(format!("{}: model returned an empty response", stage)));
    }

    tracing::debug!(stage, chars = content.len(), "Model call finished");
    Ok(content.to_string())
}
