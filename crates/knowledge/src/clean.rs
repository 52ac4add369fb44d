//! Text cleaning for scientific abstracts.
//!
//! Strips LaTeX math, citation markers and figure/table references, then
//! drops every character outside a small allow-list. Letters of any script
//! count as word characters, so Cyrillic text survives intact.

use metalrag_core::{AppError, AppResult};
use regex::Regex;

/// Compiled cleaning rules, applied in declaration order.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    whitespace: Regex,
    removals: Vec<Regex>,
    disallowed: Regex,
}

const REMOVAL_PATTERNS: &[&str] = &[
    // LaTeX environments and inline/display math
    r"(?s)\\begin\{[^}]*\}.*?\\end\{[^}]*\}",
    r"\$[^$]*\$",
    r"(?s)\\\(.*?\\\)",
    r"(?s)\\\[.*?\\\]",
    // Numeric citations: [3], [1, 4], [2–5]
    r"\[\s*\d+(?:\s*[,–-]\s*\d+)*\s*\]",
    // Author-year citations: (Smith et al., 2019), (Ivanov 2020a)
    r"\([A-ZА-ЯЁ][^()]*?\d{4}[a-z]?\)",
    // Figure, table and equation references
    r"\b(?:Figures?|Figs?\.|Tables?|Eqs?\.|Equations?)\s*[0-9IVX]+(?:\.[0-9]+)*[a-z]?",
];

const DISALLOWED_PATTERN: &str = r"[^\w\s.,;:!?\-()%/°]";

impl TextCleaner {
    /// Compile the cleaning rules.
    pub fn new() -> AppResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| AppError::Other(format!("Invalid cleaning pattern {}: {}", pattern, e)))
        };

        Ok(Self {
            whitespace: compile(r"\s+")?,
            removals: REMOVAL_PATTERNS
                .iter()
                .map(|p| compile(p))
                .collect::<AppResult<Vec<_>>>()?,
            disallowed: compile(DISALLOWED_PATTERN)?,
        })
    }

    /// Clean one text.
    pub fn clean(&self, text: &str) -> String {
        let mut current = self.whitespace.replace_all(text, " ").into_owned();

        for rule in &self.removals {
            current = rule.replace_all(&current, "").into_owned();
        }

        let current = self.disallowed.replace_all(&current, "");
        self.whitespace
            .replace_all(&current, " ")
            .trim()
            .to_string()
    }
}
