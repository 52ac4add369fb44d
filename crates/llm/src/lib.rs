//! LLM integration crate for metalrag.
//!
//! Provider-agnostic access to chat models through the [`LlmClient`] trait.
//!
//! # Providers
//! - **Ollama**: local runtime (default)
//! - **OpenAI-compatible**: any hosted `/chat/completions` endpoint
//!
//! # Example
//! ```no_run
//! use metalrag_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Что такое раскисление стали?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{client_from_config, create_client, ClientOptions};
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
