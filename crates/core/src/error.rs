//! Error types for metalrag.
//!
//! A single error enum covers every failure category of the pipeline:
//! configuration, I/O, model calls, retrieval, missing artifacts, prompts
//! and serialization.

use thiserror::Error;

/// Unified error type for metalrag.
///
/// All fallible functions return `Result<T, AppError>`.
/// Errors are represented and propagated, never panicked on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Corpus, index and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// A required model, tokenizer or index file is absent
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the caller may reasonably retry the same request.
    ///
    /// Only model-call failures qualify; everything else needs a fix to
    /// configuration or data first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Llm(_))
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Llm(_) => {
                "The language model request failed. Please try again in a moment.".to_string()
            }
            AppError::MissingArtifact(what) => {
                format!("A required file is missing: {}", what)
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_llm_errors_are_retryable() {
        assert!(AppError::Llm("timeout".into()).is_retryable());
        assert!(!AppError::Config("bad".into()).is_retryable());
        assert!(!AppError::MissingArtifact("index".into()).is_retryable());
    }

    #[test]
    fn test_user_message_hides_provider_details() {
        let err = AppError::Llm("HTTP 502 from upstream".into());
        let msg = err.user_message();
        assert!(msg.contains("try again"));
        assert!(!msg.contains("502"));
    }

    #[test]
    fn test_serde_errors_convert() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
