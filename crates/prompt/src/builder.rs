//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use metalrag_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Every variable listed in `input.variables` must be supplied. Rendering
/// runs in strict mode, so a template that references an unknown variable
/// fails instead of silently producing an empty slot.
///
/// # Example
/// ```no_run
/// use metalrag_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "Как титан влияет на включения?".to_string());
/// vars.insert("context".to_string(), "...".to_string());
///
/// let built = build_prompt(&def, &vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: &HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let missing: Vec<&str> = definition
        .input
        .variables
        .iter()
        .filter(|name| !variables.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' is missing variables: {}",
            definition.id,
            missing.join(", ")
        )));
    }

    let handlebars = renderer();

    let user = render_template(&handlebars, &definition.template, variables)?;
    let system = definition
        .system
        .as_deref()
        .map(|s| render_template(&handlebars, s, variables))
        .transpose()?;

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables.keys().cloned().collect(),
    ))
}

fn renderer() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);
    handlebars
}

/// Render a Handlebars template with variables.
fn render_template(
    handlebars: &Handlebars<'_>,
    template: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    handlebars
        .render_template(template, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
