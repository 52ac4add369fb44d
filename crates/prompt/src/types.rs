//! Prompt types for metalrag.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Behavioral settings
    #[serde(default)]
    pub behavior: PromptBehavior,

    /// Persona sent as the system message, rendered like the template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Input specification
    #[serde(default)]
    pub input: PromptInputSpec,

    /// Template string with Handlebars syntax
    pub template: String,

    /// Output specification
    #[serde(default)]
    pub output: PromptOutputSpec,
}

/// Behavioral settings for prompt execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBehavior {
    /// Tone (e.g., "professional", "technical")
    pub tone: String,

    /// Style (e.g., "concise", "detailed")
    pub style: String,
}

impl Default for PromptBehavior {
    fn default() -> Self {
        Self {
            tone: "technical".to_string(),
            style: "concise".to_string(),
        }
    }
}

/// Input specification for the prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptInputSpec {
    /// Variables the template requires; rendering fails if any is absent
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Output specification for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format (e.g., "text", "markdown", "numbered-list")
    pub format: String,
}

impl Default for PromptOutputSpec {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
        }
    }
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Names of the template variables that were supplied
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: Vec<String>,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        source_prompt_id: String,
        mut resolved_variables: Vec<String>,
    ) -> Self {
        resolved_variables.sort();
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id,
                resolved_variables,
            },
        }
    }
}
