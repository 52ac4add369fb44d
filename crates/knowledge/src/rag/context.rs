//! Prompt context assembly.

use crate::chunker::truncate_chars;
use crate::rag::types::{QueryContext, SearchHit};

const UNTITLED: &str = "Untitled";

/// `<title>:\n<text>`, with the text cut to `chunk_chars` characters and
/// `...` appended when it was cut.
pub fn format_segment(hit: &SearchHit, chunk_chars: usize) -> String {
    let title = if hit.title.trim().is_empty() {
        UNTITLED
    } else {
        hit.title.trim()
    };

    let text = if hit.text.chars().count() > chunk_chars {
        format!("{}...", truncate_chars(&hit.text, chunk_chars))
    } else {
        hit.text.clone()
    };

    format!("{}:\n{}", title, text)
}

/// Render hits (already in ascending-distance order) into one context block.
pub fn build_context(hits: Vec<SearchHit>, chunk_chars: usize) -> QueryContext {
    let text = hits
        .iter()
        .map(|hit| format_segment(hit, chunk_chars))
        .collect::<Vec<_>>()
        .join("\n\n");

    QueryContext {
        text,
        hits,
        chunk_chars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, text: &str) -> SearchHit {
        SearchHit {
            chunk_id: "c_0".to_string(),
            title: title.to_string(),
            source: "c".to_string(),
            pdf_url: None,
            year: None,
            country: None,
            text: text.to_string(),
            distance: 0.0,
            ordinal: 0,
        }
    }

    #[test]
    fn test_segments_joined_by_blank_lines() {
        let ctx = build_context(
            vec![hit("Ti in steel", "First."), hit("Ca treatment", "Second.")],
            1000,
        );
        assert_eq!(ctx.text, "Ti in steel:\nFirst.\n\nCa treatment:\nSecond.");
        assert_eq!(ctx.hits.len(), 2);
    }

    #[test]
    fn test_long_text_is_truncated_with_ellipsis() {
        let text = "ж".repeat(1200);
        let segment = format_segment(&hit("Сталь", &text), 1000);
        let body = segment.strip_prefix("Сталь:\n").unwrap();
        assert_eq!(body.chars().count(), 1003);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn test_text_at_budget_is_untouched() {
        let text = "a".repeat(800);
        let segment = format_segment(&hit("T", &text), 800);
        assert!(!segment.ends_with("..."));
    }

    #[test]
    fn test_empty_title_placeholder() {
        assert!(format_segment(&hit("  ", "x"), 10).starts_with("Untitled:\n"));
    }

    #[test]
    fn test_empty_hits_give_empty_context() {
        let ctx = build_context(Vec::new(), 1000);
        assert!(ctx.is_empty());
        assert_eq!(ctx.text, "");
    }
}
