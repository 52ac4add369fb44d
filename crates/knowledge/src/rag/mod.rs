//! Retrieval-augmented answering and hypothesis generation.

pub mod assistant;
mod completion;
pub mod context;
pub mod hypothesis;
pub mod service;
pub mod types;

pub use assistant::RagAssistant;
pub use context::{build_context, format_segment};
pub use hypothesis::{
    parse_numbered_items, CritiqueInput, FinalHypotheses, HypothesisWorkflow, RawHypotheses,
};
pub use service::KnowledgeService;
pub use types::{
    HypothesisOutcome, QueryContext, RagAnswer, RagSourceRef, RoleSettings, SearchHit,
    NO_INFORMATION_ANSWER,
};
