//! RAG request and response types.

use crate::types::Chunk;
use serde::{Deserialize, Serialize};

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub title: String,
    pub source: String,
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub text: String,
    /// Squared L2 distance to the query; smaller is closer
    pub distance: f32,
    /// Position in the index
    #[serde(skip_serializing, default)]
    pub ordinal: usize,
}

impl SearchHit {
    pub fn from_chunk(chunk: &Chunk, ordinal: usize, distance: f32) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            title: chunk.title.clone(),
            source: chunk.source.clone(),
            pdf_url: chunk.pdf_url.clone(),
            year: chunk.year,
            country: chunk.country.clone(),
            text: chunk.chunk_text.clone(),
            distance,
            ordinal,
        }
    }
}

/// A single source reference shown next to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSourceRef {
    pub title: String,
    pub source: String,
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub distance: f32,
}

impl From<&SearchHit> for RagSourceRef {
    fn from(hit: &SearchHit) -> Self {
        Self {
            title: hit.title.clone(),
            source: hit.source.clone(),
            pdf_url: hit.pdf_url.clone(),
            year: hit.year,
            distance: hit.distance,
        }
    }
}

/// Retrieved chunks rendered for a prompt.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Segments joined by blank lines
    pub text: String,
    /// Hits in ascending-distance order
    pub hits: Vec<SearchHit>,
    /// Per-chunk character budget used for `text`
    pub chunk_chars: usize,
}

impl QueryContext {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Answer to a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub request_id: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<RagSourceRef>,
    /// Retrieval found nothing and no model was called
    pub no_information: bool,
}

/// Answer text used when retrieval returns nothing.
pub const NO_INFORMATION_ANSWER: &str =
    "В базе статей не найдено информации по этому вопросу.";

impl RagAnswer {
    /// Create a "no information" response when no chunks are found.
    pub fn no_information(request_id: &str, question: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            question: question.to_string(),
            answer: NO_INFORMATION_ANSWER.to_string(),
            sources: Vec::new(),
            no_information: true,
        }
    }
}

/// Result of the generate -> critique workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisOutcome {
    pub request_id: String,
    pub problem: String,
    /// Critic output, the terminal result
    pub final_text: String,
    /// Generator output before critique
    pub raw_text: String,
    pub final_items: usize,
    pub raw_items: usize,
    pub sources_used: Vec<RagSourceRef>,
}

/// Model and sampling settings resolved for one role.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}
