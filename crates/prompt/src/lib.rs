//! Prompt system for metalrag.
//!
//! Structured prompt management with:
//! - YAML-based prompt definitions
//! - Built-in defaults for question answering and the hypothesis workflow
//! - Workspace overrides under `.metalrag/prompts/`
//! - Strict Handlebars rendering

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use defaults::{builtin_prompt, BUILTIN_PROMPT_IDS, CRITIC_PROMPT_ID, GENERATOR_PROMPT_ID, QA_PROMPT_ID};
pub use loader::{list_prompts, load_prompt, resolve_prompt, PromptSet};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptInputSpec,
    PromptOutputSpec,
};
