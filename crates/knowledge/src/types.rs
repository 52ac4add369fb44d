//! Corpus record types.

use serde::{Deserialize, Serialize};

/// A scientific article as fetched from a literature API.
///
/// One JSON object per line in the raw corpus file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,

    /// Abstract or body text
    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Unique source identifier, e.g. `arxiv:2101.00001v1` or an OpenAlex work URL
    pub source: String,

    #[serde(default)]
    pub pdf_url: Option<String>,

    /// Publication year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    /// Country code of the first affiliated institution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Article {
    /// Whether the record carries the fields every downstream stage needs.
    pub fn is_complete(&self) -> bool {
        !self.source.trim().is_empty()
            && !self.title.trim().is_empty()
            && !self.abstract_text.trim().is_empty()
    }
}

/// A token window of one article, the unit that gets embedded and retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<source>_<window sequence number>`
    pub chunk_id: String,

    pub title: String,
    pub source: String,

    #[serde(default)]
    pub pdf_url: Option<String>,

    pub chunk_text: String,

    /// Number of tokens in the window (`end_token - start_token`)
    pub chunk_tokens: usize,

    /// First token of the window in the article's token stream
    pub start_token: usize,

    /// One past the last token of the window
    pub end_token: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_reads_abstract_field() {
        let line = r#"{"title":"Ti deoxidation","abstract":"Titanium forms oxides.","source":"arxiv:1","pdf_url":null}"#;
        let article: Article = serde_json::from_str(line).unwrap();
        assert_eq!(article.abstract_text, "Titanium forms oxides.");
        assert!(article.pdf_url.is_none());
        assert!(article.is_complete());
    }

    #[test]
    fn test_optional_metadata_is_omitted() {
        let article = Article {
            title: "t".into(),
            abstract_text: "a".into(),
            source: "s".into(),
            pdf_url: Some("https://arxiv.org/pdf/1.pdf".into()),
            year: None,
            country: None,
        };
        let json = serde_json::to_string(&article).unwrap();
        assert!(!json.contains("year"));
        assert!(json.contains("\"abstract\":\"a\""));
    }

    #[test]
    fn test_incomplete_article() {
        let article = Article {
            title: "  ".into(),
            abstract_text: "text".into(),
            source: "s".into(),
            pdf_url: None,
            year: Some(2020),
            country: None,
        };
        assert!(!article.is_complete());
    }
}
