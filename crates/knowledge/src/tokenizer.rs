//! Subword tokenizers used to measure and cut chunk windows.
//!
//! Tokenizers return byte spans into the text they were given. A window of
//! tokens is decoded by slicing the text from the first span's start to the
//! last span's end, so chunk text is always a verbatim substring of the
//! cleaned article.

use metalrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// Byte range of one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

/// Deterministic text to token-span mapping.
pub trait TextTokenizer: Send + Sync + std::fmt::Debug {
    /// Identifier recorded in logs and reports.
    fn name(&self) -> &str;

    /// Split `text` into ordered, non-overlapping token spans.
    fn tokenize(&self, text: &str) -> AppResult<Vec<TokenSpan>>;
}

/// Text covered by a run of consecutive tokens.
pub fn decode_window<'a>(text: &'a str, tokens: &[TokenSpan]) -> &'a str {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => text.get(first.start..last.end).unwrap_or(""),
        _ => "",
    }
}

/// Tokenizer selection in `pipeline.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TokenizerConfig {
    /// OpenAI byte-pair encoding shipped with `tiktoken-rs`
    Tiktoken {
        #[serde(default = "default_encoding")]
        encoding: String,
    },
    /// Unicode word segmentation with long words split into pieces; an
    /// approximation for environments without a BPE vocabulary
    Segment {
        #[serde(default = "default_max_piece_chars")]
        max_piece_chars: usize,
    },
    /// A HuggingFace `tokenizer.json`
    HuggingFace { path: PathBuf },
}

fn default_encoding() -> String {
    "o200k_base".to_string()
}

fn default_max_piece_chars() -> usize {
    6
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        TokenizerConfig::Tiktoken {
            encoding: default_encoding(),
        }
    }
}

/// Build the configured tokenizer.
pub fn create_tokenizer(config: &TokenizerConfig) -> AppResult<Arc<dyn TextTokenizer>> {
    match config {
        TokenizerConfig::Tiktoken { encoding } => {
            Ok(Arc::new(TiktokenTokenizer::new(encoding)?))
        }
        TokenizerConfig::Segment { max_piece_chars } => {
            Ok(Arc::new(SegmentTokenizer::new(*max_piece_chars)?))
        }
        TokenizerConfig::HuggingFace { path } => Ok(Arc::new(HfTokenizer::from_file(path)?)),
    }
}

/// Byte-pair encoder from `tiktoken-rs` (`o200k_base` or `cl100k_base`).
///
/// BPE tokens are byte sequences, so one Cyrillic letter can span two
/// tokens. Tokens are decoded in the smallest groups that form valid UTF-8;
/// the last token of a group carries the group's bytes and the others get
/// empty spans at the group start. Window sizes stay in real token counts.
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
    name: String,
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer")
            .field("name", &self.name)
            .finish()
    }
}

impl TiktokenTokenizer {
    pub fn new(encoding: &str) -> AppResult<Self> {
        let bpe = match encoding {
            "o200k_base" => tiktoken_rs::o200k_base(),
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            other => {
                return Err(AppError::Config(format!(
                    "Unknown tiktoken encoding '{}'. Expected o200k_base or cl100k_base",
                    other
                )))
            }
        }
        .map_err(|e| AppError::Config(format!("Failed to load {} encoding: {}", encoding, e)))?;

        tracing::debug!(encoding, "Loaded tiktoken encoding");

        Ok(Self {
            bpe,
            name: format!("tiktoken:{}", encoding),
        })
    }
}

impl TextTokenizer for TiktokenTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn tokenize(&self, text: &str) -> AppResult<Vec<TokenSpan>> {
        let tokens = self.bpe.encode_ordinary(text);
        let mut spans = Vec::with_capacity(tokens.len());
        let mut offset = 0;
        let mut group = Vec::new();

        for token in tokens {
            group.push(token);
            let Ok(piece) = self.bpe.decode(group.clone()) else {
                continue;
            };

            let end = offset + piece.len();
            if text.get(offset..end) != Some(piece.as_str()) {
                return Err(AppError::Knowledge(format!(
                    "Token bytes diverge from the input text at byte {}",
                    offset
                )));
            }
            for _ in 1..group.len() {
                spans.push(TokenSpan {
                    start: offset,
                    end: offset,
                });
            }
            spans.push(TokenSpan { start: offset, end });
            offset = end;
            group.clear();
        }

        if !group.is_empty() || offset != text.len() {
            return Err(AppError::Knowledge(format!(
                "Tokenizer left {} bytes undecoded",
                text.len() - offset
            )));
        }

        Ok(spans)
    }
}

/// Word-boundary tokenizer that needs no model files.
///
/// Whitespace is not a token. Punctuation marks are single tokens. Words
/// longer than `max_piece_chars` characters are cut into pieces of at most
/// that many characters, which approximates subword vocabularies closely
/// enough for window sizing.
#[derive(Debug, Clone)]
pub struct SegmentTokenizer {
    max_piece_chars: usize,
}

impl SegmentTokenizer {
    pub fn new(max_piece_chars: usize) -> AppResult<Self> {
        if max_piece_chars == 0 {
            return Err(AppError::Config(
                "tokenizer max_piece_chars must be at least 1".to_string(),
            ));
        }
        Ok(Self { max_piece_chars })
    }
}

impl TextTokenizer for SegmentTokenizer {
    fn name(&self) -> &str {
        "segment"
    }

    fn tokenize(&self, text: &str) -> AppResult<Vec<TokenSpan>> {
        let mut spans = Vec::new();

        for (offset, word) in text.split_word_bound_indices() {
            if word.chars().all(char::is_whitespace) {
                continue;
            }

            let mut piece_start = offset;
            let mut piece_chars = 0;
            for (i, _) in word.char_indices() {
                if piece_chars == self.max_piece_chars {
                    spans.push(TokenSpan {
                        start: piece_start,
                        end: offset + i,
                    });
                    piece_start = offset + i;
                    piece_chars = 0;
                }
                piece_chars += 1;
            }
            spans.push(TokenSpan {
                start: piece_start,
                end: offset + word.len(),
            });
        }

        Ok(spans)
    }
}

/// Tokenizer backed by a HuggingFace `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    name: String,
}

impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer").field("name", &self.name).finish()
    }
}

impl HfTokenizer {
    /// Load a tokenizer file; a missing file is fatal.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::MissingArtifact(format!(
                "tokenizer file {}",
                path.display()
            )));
        }

        let mut inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            AppError::Config(format!("Failed to load tokenizer {}: {}", path.display(), e))
        })?;

        // Chunk windows are cut by us, never by the tokenizer.
        inner
            .with_truncation(None)
            .map_err(|e| AppError::Config(format!("Failed to disable truncation: {}", e)))?;
        inner.with_padding(None);

        tracing::info!(path = %path.display(), "Loaded HuggingFace tokenizer");

        Ok(Self {
            inner,
            name: format!("huggingface:{}", path.display()),
        })
    }
}

impl TextTokenizer for HfTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn tokenize(&self, text: &str) -> AppResult<Vec<TokenSpan>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| AppError::Knowledge(format!("Tokenization failed: {}", e)))?;

        let mut spans: Vec<TokenSpan> = Vec::with_capacity(encoding.len());
        for &(start, end) in encoding.get_offsets() {
            let start = floor_char_boundary(text, start);
            let end = ceil_char_boundary(text, end);
            if end <= start {
                continue;
            }
            // Byte-level vocabularies can emit several tokens for one character.
            if let Some(prev) = spans.last_mut() {
                if start < prev.end {
                    prev.end = prev.end.max(end);
                    continue;
                }
            }
            spans.push(TokenSpan { start, end });
        }

        Ok(spans)
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces(text: &str, max: usize) -> Vec<String> {
        let tokenizer = SegmentTokenizer::new(max).unwrap();
        tokenizer
            .tokenize(text)
            .unwrap()
            .iter()
            .map(|s| text[s.start..s.end].to_string())
            .collect()
    }

    #[test]
    fn test_segment_skips_whitespace_and_splits_punctuation() {
        assert_eq!(pieces("Ti, Al and N.", 6), vec!["Ti", ",", "Al", "and", "N", "."]);
    }

    #[test]
    fn test_segment_splits_long_words() {
        assert_eq!(pieces("deoxidation", 4), vec!["deox", "idat", "ion"]);
    }

    #[test]
    fn test_segment_respects_cyrillic_char_boundaries() {
        assert_eq!(
            pieces("неметаллические включения", 6),
            vec!["немета", "лличес", "кие", "включе", "ния"]
        );
    }

    #[test]
    fn test_segment_is_deterministic() {
        let tokenizer = SegmentTokenizer::new(6).unwrap();
        let text = "Calcium treatment modifies alumina inclusions.";
        assert_eq!(tokenizer.tokenize(text).unwrap(), tokenizer.tokenize(text).unwrap());
    }

    #[test]
    fn test_decode_window_is_verbatim_substring() {
        let text = "Titanium   nitride forms early.";
        let tokenizer = SegmentTokenizer::new(10).unwrap();
        let spans = tokenizer.tokenize(text).unwrap();
        assert_eq!(decode_window(text, &spans[0..2]), "Titanium   nitride");
        assert_eq!(decode_window(text, &[]), "");
    }

    fn tiktoken_pieces(text: &str) -> Vec<String> {
        let tokenizer = TiktokenTokenizer::new("o200k_base").unwrap();
        tokenizer
            .tokenize(text)
            .unwrap()
            .iter()
            .map(|s| text[s.start..s.end].to_string())
            .collect()
    }

    #[test]
    fn test_tiktoken_spans_cover_text() {
        let text = "Calcium treatment modifies alumina inclusions in Al-killed steel.";
        let pieces = tiktoken_pieces(text);
        assert!(pieces.len() > 5);
        assert!(pieces.len() < text.split_whitespace().count() * 3);
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_tiktoken_handles_cyrillic() {
        let text = "Неметаллические включения в стали, 0,05% Ti.";
        let tokenizer = TiktokenTokenizer::new("o200k_base").unwrap();
        let spans = tokenizer.tokenize(text).unwrap();
        assert!(spans.windows(2).all(|w| w[0].end <= w[1].start));
        assert_eq!(decode_window(text, &spans), text);
        assert_eq!(tokenizer.tokenize(text).unwrap(), spans);
    }

    #[test]
    fn test_tiktoken_unknown_encoding() {
        let err = TiktokenTokenizer::new("p50k_edit").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_default_tokenizer_is_bpe() {
        let tokenizer = create_tokenizer(&TokenizerConfig::default()).unwrap();
        assert_eq!(tokenizer.name(), "tiktoken:o200k_base");
    }

    #[test]
    fn test_zero_piece_size_rejected() {
        assert!(SegmentTokenizer::new(0).is_err());
    }

    #[test]
    fn test_missing_hf_file_is_missing_artifact() {
        let err = HfTokenizer::from_file(Path::new("/nonexistent/tokenizer.json")).unwrap_err();
        assert!(matches!(err, AppError::MissingArtifact(_)));
    }

    #[test]
    fn test_tokenizer_config_yaml() {
        let cfg: TokenizerConfig = serde_yaml::from_str("kind: tiktoken").unwrap();
        assert_eq!(cfg, TokenizerConfig::default());

        let cfg: TokenizerConfig = serde_yaml::from_str("kind: segment").unwrap();
        assert_eq!(
            cfg,
            TokenizerConfig::Segment {
                max_piece_chars: 6
            }
        );

        let cfg: TokenizerConfig =
            serde_yaml::from_str("kind: huggingface\npath: /models/e5/tokenizer.json").unwrap();
        assert!(matches!(cfg, TokenizerConfig::HuggingFace { .. }));
    }
}
