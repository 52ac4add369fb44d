//! Prompt loader for YAML prompt definitions.

use crate::defaults::{builtin_prompt, CRITIC_PROMPT_ID, GENERATOR_PROMPT_ID, QA_PROMPT_ID};
use crate::types::PromptDefinition;
use metalrag_core::config::STATE_DIR;
use metalrag_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(STATE_DIR).join("prompts")
}

/// Load a prompt definition by ID from the workspace.
///
/// Looks for `<id>.yml` in `.metalrag/prompts/`.
///
/// # Example
/// ```no_run
/// use metalrag_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "metalrag.qa")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}'",
            prompt_file, definition.id
        )));
    }

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load a workspace override if present, otherwise the built-in prompt.
pub fn resolve_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let override_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));
    if override_file.exists() {
        return load_prompt(workspace_path, prompt_id);
    }

    let definition = builtin_prompt(prompt_id)?.ok_or_else(|| {
        AppError::Prompt(format!(
            "No prompt '{}' in workspace and no built-in default",
            prompt_id
        ))
    })?;
    validate_prompt(&definition)?;
    Ok(definition)
}

/// List all prompt override IDs in the workspace, sorted.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = prompts_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.api_version.is_empty() {
        return Err(AppError::Prompt(
            "Prompt apiVersion cannot be empty".to_string(),
        ));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

/// The three prompts the retrieval assistant runs with.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub qa: PromptDefinition,
    pub generator: PromptDefinition,
    pub critic: PromptDefinition,
}

impl PromptSet {
    /// Resolve every prompt against the workspace overrides.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        Ok(Self {
            qa: resolve_prompt(workspace_path, QA_PROMPT_ID)?,
            generator: resolve_prompt(workspace_path, GENERATOR_PROMPT_ID)?,
            critic: resolve_prompt(workspace_path, CRITIC_PROMPT_ID)?,
        })
    }

    /// Built-in prompts only.
    pub fn builtin() -> AppResult<Self> {
        let get = |id: &str| {
            builtin_prompt(id)?
                .ok_or_else(|| AppError::Prompt(format!("Missing built-in prompt '{}'", id)))
        };
        Ok(Self {
            qa: get(QA_PROMPT_ID)?,
            generator: get(GENERATOR_PROMPT_ID)?,
            critic: get(CRITIC_PROMPT_ID)?,
        })
    }
}
