//! Trigram embedding provider using character trigram-based content-aware embeddings.

use crate::embeddings::provider::EmbeddingProvider;
use metalrag_core::AppResult;
use std::collections::{BTreeMap, HashSet};

/// English and Russian function words that carry no topical signal.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "an", "as", "are", "was", "were", "for", "to", "of", "in",
    "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had", "it",
    "its", "their", "they", "them", "как", "что", "это", "для", "при", "или", "его", "она",
    "они", "так", "также", "был", "была", "были", "быть", "над", "под", "без", "после",
    "между", "который", "которые", "которая",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Generates deterministic embeddings based on text content using
/// character trigrams and word frequencies. While not semantically
/// accurate like neural embedding models, it produces consistent,
/// content-dependent vectors suitable for development and offline use.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
    model: String,
    stop_words: HashSet<&'static str>,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self::with_model(dimensions, "trigram-v1")
    }

    /// Same vectors, recorded under a different model label.
    pub fn with_model(dimensions: usize, model: &str) -> Self {
        Self {
            dimensions,
            model: model.to_string(),
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Generate a trigram-based embedding for text.
    fn generate_trigram_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        let lower = text.to_lowercase();

        let words: Vec<&str> = lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !self.stop_words.contains(w) && w.chars().count() > 2)
            .collect();

        let mut word_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for word in &words {
            *word_freq.entry(*word).or_insert(0) += 1;
        }

        // Each word contributes to one bucket per character trigram plus one for itself
        for (word, freq) in word_freq.iter() {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let trigram_hash = trigram
                    .bytes()
                    .fold(0u64, |acc, b| acc.wrapping_mul(37).wrapping_add(b as u64));

                let dim_idx = (trigram_hash as usize) % self.dimensions;
                embedding[dim_idx] += (*freq as f32).sqrt();
            }

            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            let base_dim = (word_hash as usize) % self.dimensions;
            embedding[base_dim] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_trigram_embedding(text))
            .collect())
    }
}
