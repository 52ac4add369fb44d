//! Token-window chunking of articles.

use crate::clean::TextCleaner;
use crate::tokenizer::{create_tokenizer, decode_window, TextTokenizer, TokenizerConfig};
use crate::types::{Article, Chunk};
use metalrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Chunking settings (`chunking` section of `pipeline.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per window
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Tokens shared by consecutive windows
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Articles whose cleaned text is shorter than this are skipped
    #[serde(default = "default_min_article_chars")]
    pub min_article_chars: usize,

    /// Windows after the first whose text is shorter than this are dropped
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,

    /// Titles are cut to this many characters on each chunk
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    #[serde(default)]
    pub tokenizer: TokenizerConfig,
}

fn default_max_tokens() -> usize {
    800
}

fn default_overlap_tokens() -> usize {
    200
}

fn default_min_article_chars() -> usize {
    100
}

fn default_min_chunk_chars() -> usize {
    200
}

fn default_title_max_chars() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
            min_article_chars: default_min_article_chars(),
            min_chunk_chars: default_min_chunk_chars(),
            title_max_chars: default_title_max_chars(),
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.max_tokens == 0 {
            return Err(AppError::Config("chunking.max_tokens must be positive".to_string()));
        }
        if self.overlap_tokens >= self.max_tokens {
            return Err(AppError::Config(format!(
                "chunking.overlap_tokens ({}) must be smaller than max_tokens ({})",
                self.overlap_tokens, self.max_tokens
            )));
        }
        Ok(())
    }
}

/// Half-open token range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenWindow {
    pub start: usize,
    pub end: usize,
}

/// Window layout for a stream of `n_tokens` tokens.
///
/// Windows hold at most `max_tokens`; each window after the first starts
/// `overlap` tokens before the previous one ended. The last window is the
/// one that reaches the end of the stream. Requires `overlap < max_tokens`.
pub fn token_windows(n_tokens: usize, max_tokens: usize, overlap: usize) -> Vec<TokenWindow> {
    let mut windows = Vec::new();
    if n_tokens == 0 || max_tokens == 0 || overlap >= max_tokens {
        return windows;
    }

    let mut start = 0;
    loop {
        let end = (start + max_tokens).min(n_tokens);
        windows.push(TokenWindow { start, end });
        if end >= n_tokens {
            break;
        }
        start = end - overlap;
    }
    windows
}

/// Outcome of chunking one article.
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleChunks {
    /// The article produced chunks; `discarded` windows were too short.
    Chunks { chunks: Vec<Chunk>, discarded: usize },
    /// The cleaned text was below the minimum article length.
    TooShort { chars: usize },
}

/// Cleans, tokenizes and windows articles.
#[derive(Debug, Clone)]
pub struct Chunker {
    cleaner: TextCleaner,
    tokenizer: Arc<dyn TextTokenizer>,
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig, tokenizer: Arc<dyn TextTokenizer>) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            cleaner: TextCleaner::new()?,
            tokenizer,
            config,
        })
    }

    /// Build a chunker with the tokenizer named in `config`.
    pub fn from_config(config: &ChunkingConfig) -> AppResult<Self> {
        config.validate()?;
        let tokenizer = create_tokenizer(&config.tokenizer)?;
        Self::new(config.clone(), tokenizer)
    }

    pub fn tokenizer_name(&self) -> &str {
        self.tokenizer.name()
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split one article into chunks.
    ///
    /// The first window is always kept so every article that passes the
    /// length gate contributes at least one chunk. Later windows shorter than
    /// `min_chunk_chars` are dropped; sequence numbers of the kept windows do
    /// not shift, which keeps chunk ids stable.
    pub fn chunk_article(&self, article: &Article) -> AppResult<ArticleChunks> {
        let full_text = format!("{} {}", article.title, article.abstract_text);
        let cleaned = self.cleaner.clean(&full_text);

        let chars = cleaned.chars().count();
        if chars < self.config.min_article_chars {
            return Ok(ArticleChunks::TooShort { chars });
        }

        let tokens = self.tokenizer.tokenize(&cleaned)?;
        let windows = token_windows(tokens.len(), self.config.max_tokens, self.config.overlap_tokens);

        let title = truncate_chars(&collapse_whitespace(&article.title), self.config.title_max_chars);

        let mut chunks = Vec::with_capacity(windows.len());
        let mut discarded = 0;

        for (seq, window) in windows.iter().enumerate() {
            let text = decode_window(&cleaned, &tokens[window.start..window.end]);
            if seq > 0 && text.chars().count() < self.config.min_chunk_chars {
                discarded += 1;
                continue;
            }

            chunks.push(Chunk {
                chunk_id: format!("{}_{}", article.source, seq),
                title: title.clone(),
                source: article.source.clone(),
                pdf_url: article.pdf_url.clone(),
                chunk_text: text.to_string(),
                chunk_tokens: window.end - window.start,
                start_token: window.start,
                end_token: window.end,
                country: article.country.clone(),
                year: article.year,
            });
        }

        Ok(ArticleChunks::Chunks { chunks, discarded })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
