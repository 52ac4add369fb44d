//! arXiv Atom API source.

use super::{http_client, ArticleSource, FetchConfig};
use crate::types::Article;
use async_trait::async_trait;
use metalrag_core::{AppError, AppResult};
use regex::Regex;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 15;

pub struct ArxivSource {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
    delay: Duration,
    parser: AtomParser,
}

impl ArxivSource {
    pub fn new(config: &FetchConfig) -> AppResult<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS))?,
            base_url: config.arxiv_url.clone(),
            page_size: config.arxiv_page_size,
            delay: config.request_delay(),
            parser: AtomParser::new()?,
        })
    }

    #[tracing::instrument(skip(self), fields(source = "arxiv"))]
    async fn fetch_page(&self, keyword: &str, start: usize) -> AppResult<String> {
        let query = format!("all:\"{}\"", keyword);
        let start = start.to_string();
        let page_size = self.page_size.to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", query.as_str()),
                ("start", start.as_str()),
                ("max_results", page_size.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("arXiv request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Knowledge(format!("arXiv returned HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to read arXiv response: {}", e)))
    }
}

#[async_trait]
impl ArticleSource for ArxivSource {
    fn name(&self) -> &str {
        "arxiv"
    }

    async fn search(&self, keyword: &str, limit: usize) -> AppResult<Vec<Article>> {
        let mut articles = Vec::new();
        let mut start = 0;

        while articles.len() < limit {
            let body = match self.fetch_page(keyword, start).await {
                Ok(body) => body,
                Err(e) if !articles.is_empty() => {
                    tracing::warn!(error = %e, "arXiv paging stopped early");
                    break;
                }
                Err(e) => return Err(e),
            };

            let page = self.parser.parse_feed(&body);
            let entries = page.entries;
            for article in page.articles {
                if articles.len() >= limit {
                    break;
                }
                articles.push(article);
            }

            if entries < self.page_size {
                break;
            }
            start += self.page_size;
            tokio::time::sleep(self.delay).await;
        }

        tracing::debug!(keyword, found = articles.len(), "arXiv search finished");
        Ok(articles)
    }
}

/// Articles parsed from one feed page plus the raw entry count.
#[derive(Debug)]
pub struct AtomPage {
    pub entries: usize,
    pub articles: Vec<Article>,
}

/// Regex-based reader for arXiv Atom feeds.
pub struct AtomParser {
    entry: Regex,
    title: Regex,
    summary: Regex,
    id: Regex,
    pdf_link: Regex,
    published: Regex,
}

impl AtomParser {
    pub fn new() -> AppResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| AppError::Other(format!("Invalid feed pattern {}: {}", pattern, e)))
        };
        Ok(Self {
            entry: compile(r"(?s)<entry>(.*?)</entry>")?,
            title: compile(r"(?s)<title[^>]*>(.*?)</title>")?,
            summary: compile(r"(?s)<summary[^>]*>(.*?)</summary>")?,
            id: compile(r"<id>https?://arxiv\.org/abs/([^<]+)</id>")?,
            pdf_link: compile(r#"<link[^>]*title="pdf"[^>]*href="([^"]+)""#)?,
            published: compile(r"<published>(\d{4})")?,
        })
    }

    /// Parse a feed; entries without a title, summary or id are skipped.
    pub fn parse_feed(&self, body: &str) -> AtomPage {
        let mut entries = 0;
        let mut articles = Vec::new();

        for captures in self.entry.captures_iter(body) {
            entries += 1;
            let entry = &captures[1];

            let title = self.title.captures(entry).map(|c| clean_field(&c[1]));
            let summary = self.summary.captures(entry).map(|c| clean_field(&c[1]));
            let id = self.id.captures(entry).map(|c| c[1].trim().to_string());

            let (Some(title), Some(summary), Some(id)) = (title, summary, id) else {
                continue;
            };

            let pdf_url = self
                .pdf_link
                .captures(entry)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}.pdf", id));
            let year = self
                .published
                .captures(entry)
                .and_then(|c| c[1].parse().ok());

            articles.push(Article {
                title,
                abstract_text: summary,
                source: format!("arxiv:{}", id),
                pdf_url: Some(pdf_url),
                year,
                country: None,
            });
        }

        AtomPage { entries, articles }
    }
}

fn clean_field(raw: &str) -> String {
    let unescaped = raw
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    unescaped.split_whitespace().collect::<Vec<_>>().join(" ")
}
