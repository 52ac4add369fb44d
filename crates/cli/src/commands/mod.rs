//! Command handlers for the metalrag CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod fetch;
pub mod hypothesize;
pub mod index;
pub mod ingest;
pub mod prompts;
pub mod runtime;
pub mod search;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use fetch::FetchCommand;
pub use hypothesize::HypothesizeCommand;
pub use index::IndexCommand;
pub use ingest::IngestCommand;
pub use prompts::PromptsCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;
