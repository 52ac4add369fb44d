//! Corpus collection from literature APIs.
//!
//! Each configured source is searched keyword by keyword until the article
//! target is reached. Records are deduplicated by `source` and must carry a
//! title and an abstract. A failing source is logged and skipped.

pub mod arxiv;
pub mod openalex;

pub use arxiv::ArxivSource;
pub use openalex::OpenAlexSource;

use crate::jsonl::write_jsonl_atomic;
use crate::progress::ProgressReporter;
use crate::types::Article;
use async_trait::async_trait;
use metalrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_KEYWORDS: &[&str] = &[
    "steel deoxidation",
    "non-metallic inclusions",
    "titanium microalloying",
    "continuous casting inclusions",
    "steel cleanliness",
    "inclusion engineering",
    "calcium treatment steel",
    "secondary metallurgy",
    "slag metal reaction",
    "aluminum killed steel",
    "titanium inclusion",
    "steel refining",
];

/// Fetch settings (`fetch` section of `pipeline.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub keywords: Vec<String>,

    /// Sources to query, in order: "arxiv", "openalex"
    pub sources: Vec<String>,

    /// Articles requested from each source per keyword
    pub per_keyword: usize,

    /// Stop searching once this many unique articles are collected
    pub stop_after: usize,

    /// Hard cap on the written corpus
    pub max_articles: usize,

    /// Pause between API requests
    pub request_delay_ms: u64,

    pub arxiv_url: String,
    pub arxiv_page_size: usize,

    pub openalex_url: String,
    pub openalex_page_size: usize,

    /// Contact address for the OpenAlex polite pool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailto: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            sources: vec!["arxiv".to_string(), "openalex".to_string()],
            per_keyword: 10,
            stop_after: 80,
            max_articles: 90,
            request_delay_ms: 2000,
            arxiv_url: "http://export.arxiv.org/api/query".to_string(),
            arxiv_page_size: 100,
            openalex_url: "https://api.openalex.org/works".to_string(),
            openalex_page_size: 50,
            mailto: None,
        }
    }
}

impl FetchConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::Config("fetch.keywords must not be empty".to_string()));
        }
        if self.per_keyword == 0 || self.max_articles == 0 {
            return Err(AppError::Config(
                "fetch.per_keyword and fetch.max_articles must be positive".to_string(),
            ));
        }
        if self.arxiv_page_size == 0 || self.openalex_page_size == 0 {
            return Err(AppError::Config("fetch page sizes must be positive".to_string()));
        }
        Ok(())
    }
}

/// A searchable literature API.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` articles matching `keyword`, paging as needed.
    async fn search(&self, keyword: &str, limit: usize) -> AppResult<Vec<Article>>;
}

/// Instantiate the sources named in `config.sources`.
pub fn create_sources(config: &FetchConfig) -> AppResult<Vec<Arc<dyn ArticleSource>>> {
    config
        .sources
        .iter()
        .map(|name| -> AppResult<Arc<dyn ArticleSource>> {
            match name.as_str() {
                "arxiv" => Ok(Arc::new(ArxivSource::new(config)?)),
                "openalex" => Ok(Arc::new(OpenAlexSource::new(config)?)),
                other => Err(AppError::Config(format!(
                    "Unknown article source '{}'. Supported sources: arxiv, openalex",
                    other
                ))),
            }
        })
        .collect()
}

/// Counters from one fetch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchReport {
    pub keywords_searched: usize,
    pub articles_received: usize,
    pub articles_written: usize,
    pub duplicates: usize,
    pub incomplete: usize,
    pub source_errors: usize,
    pub output: PathBuf,
    pub duration_secs: f64,
}

/// Search every source for every keyword and write the raw corpus.
///
/// When no article at all could be collected the previous corpus file is
/// left in place and an error is returned.
pub async fn fetch_corpus(
    sources: &[Arc<dyn ArticleSource>],
    config: &FetchConfig,
    output: &Path,
    progress: &ProgressReporter,
) -> AppResult<FetchReport> {
    config.validate()?;
    let started = Instant::now();
    let target = config.stop_after.min(config.max_articles).max(1);

    let mut report = FetchReport {
        output: output.to_path_buf(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut articles: Vec<Article> = Vec::new();
    let mut first_request = true;

    'keywords: for keyword in config.keywords.iter().filter(|k| !k.trim().is_empty()) {
        report.keywords_searched += 1;
        tracing::info!(keyword = %keyword, collected = articles.len(), "Searching keyword");

        for source in sources {
            if !first_request {
                tokio::time::sleep(config.request_delay()).await;
            }
            first_request = false;

            let found = match source.search(keyword, config.per_keyword).await {
                Ok(found) => found,
                Err(e) => {
                    report.source_errors += 1;
                    tracing::warn!(
                        source = source.name(),
                        keyword = %keyword,
                        error = %e,
                        "Source search failed, continuing"
                    );
                    continue;
                }
            };

            report.articles_received += found.len();
            let before = articles.len();
            for article in found {
                if !article.is_complete() {
                    report.incomplete += 1;
                } else if seen.insert(article.source.clone()) {
                    articles.push(article);
                } else {
                    report.duplicates += 1;
                }
            }

            tracing::debug!(
                source = source.name(),
                keyword = %keyword,
                added = articles.len() - before,
                "Source results merged"
            );
            progress.fetch(
                articles.len() as u64,
                Some(target as u64),
                source.name(),
                keyword,
            );
        }

        if articles.len() >= target {
            break 'keywords;
        }
    }

    if articles.is_empty() {
        return Err(AppError::Knowledge(format!(
            "No articles collected ({} source errors); keeping existing corpus",
            report.source_errors
        )));
    }

    articles.truncate(config.max_articles);
    write_jsonl_atomic(output, &articles)?;

    report.articles_written = articles.len();
    report.duration_secs = started.elapsed().as_secs_f64();

    tracing::info!(
        articles = report.articles_written,
        duplicates = report.duplicates,
        errors = report.source_errors,
        output = %output.display(),
        "Fetch complete"
    );

    Ok(report)
}

/// Build the shared HTTP client for a source.
pub(crate) fn http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("metalrag/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Knowledge(format!("Failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonl::read_jsonl;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeSource {
        name: String,
        results: Vec<Article>,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArticleSource for FakeSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search(&self, keyword: &str, limit: usize) -> AppResult<Vec<Article>> {
            self.calls.lock().unwrap().push(keyword.to_string());
            if self.fail {
                return Err(AppError::Knowledge("HTTP 503".to_string()));
            }
            Ok(self.results.iter().take(limit).cloned().collect())
        }
    }

    fn article(source: &str, abstract_text: &str) -> Article {
        Article {
            title: format!("Title {}", source),
            abstract_text: abstract_text.to_string(),
            source: source.to_string(),
            pdf_url: None,
            year: None,
            country: None,
        }
    }

    fn fake(name: &str, results: Vec<Article>, fail: bool) -> Arc<FakeSource> {
        Arc::new(FakeSource {
            name: name.to_string(),
            results,
            fail,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn config() -> FetchConfig {
        FetchConfig {
            keywords: vec!["steel deoxidation".to_string(), "steel refining".to_string()],
            request_delay_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_dedupes_and_survives_failing_source() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("raw.jsonl");
        let good = fake(
            "good",
            vec![
                article("arxiv:1", "abstract one"),
                article("arxiv:1", "abstract one again"),
                article("arxiv:2", ""),
            ],
            false,
        );
        let broken = fake("broken", Vec::new(), true);
        let sources: Vec<Arc<dyn ArticleSource>> = vec![good.clone(), broken.clone()];

        let report = fetch_corpus(&sources, &config(), &out, &ProgressReporter::noop())
            .await
            .unwrap();

        assert_eq!(report.articles_written, 1);
        assert_eq!(report.source_errors, 2);
        assert_eq!(report.incomplete, 2);
        assert_eq!(report.duplicates, 3);
        assert_eq!(good.calls.lock().unwrap().len(), 2);

        let written = read_jsonl::<Article>(&out).unwrap();
        assert_eq!(written.records[0].source, "arxiv:1");
    }

    #[tokio::test]
    async fn test_stops_once_target_reached() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("raw.jsonl");
        let many: Vec<Article> = (0..10)
            .map(|i| article(&format!("W{}", i), "abstract"))
            .collect();
        let source = fake("openalex", many, false);
        let sources: Vec<Arc<dyn ArticleSource>> = vec![source.clone()];

        let cfg = FetchConfig {
            stop_after: 5,
            max_articles: 8,
            ..config()
        };
        let report = fetch_corpus(&sources, &cfg, &out, &ProgressReporter::noop())
            .await
            .unwrap();

        assert_eq!(source.calls.lock().unwrap().len(), 1);
        assert_eq!(report.keywords_searched, 1);
        assert_eq!(report.articles_written, 8);
    }

    #[tokio::test]
    async fn test_nothing_collected_keeps_previous_corpus() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("raw.jsonl");
        std::fs::write(&out, "previous\n").unwrap();

        let sources: Vec<Arc<dyn ArticleSource>> = vec![fake("broken", Vec::new(), true)];
        let result = fetch_corpus(&sources, &config(), &out, &ProgressReporter::noop()).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "previous\n");
    }

    #[test]
    fn test_unknown_source_rejected() {
        let cfg = FetchConfig {
            sources: vec!["scopus".to_string()],
            ..Default::default()
        };
        assert!(create_sources(&cfg).is_err());
    }

    #[test]
    fn test_defaults() {
        let cfg = FetchConfig::default();
        assert_eq!(cfg.keywords.len(), 12);
        assert_eq!(cfg.arxiv_page_size, 100);
        assert_eq!(cfg.openalex_page_size, 50);
        assert!(cfg.validate().is_ok());
    }
}
