//! OpenAlex works API source.

use super::{http_client, ArticleSource, FetchConfig};
use crate::types::Article;
use async_trait::async_trait;
use metalrag_core::{AppError, AppResult};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 20;
const SELECT_FIELDS: &str =
    "id,display_name,abstract_inverted_index,primary_location,publication_year,authorships";

#[derive(Debug, Deserialize)]
pub struct WorksPage {
    #[serde(default)]
    pub results: Vec<Work>,
    #[serde(default)]
    pub meta: PageMeta,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Work {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    pub primary_location: Option<Location>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub authorships: Vec<Authorship>,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub landing_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Authorship {
    #[serde(default)]
    pub countries: Vec<String>,
}

impl Work {
    /// Convert to an article; works without a title or abstract yield `None`.
    pub fn into_article(self) -> Option<Article> {
        let title = self
            .display_name
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())?;
        let abstract_text = self
            .abstract_inverted_index
            .as_ref()
            .map(rebuild_abstract)
            .filter(|a| !a.is_empty())?;

        let pdf_url = self.primary_location.and_then(|loc| {
            loc.pdf_url
                .filter(|u| !u.is_empty())
                .or(loc.landing_page_url.filter(|u| !u.is_empty()))
        });
        let country = self
            .authorships
            .iter()
            .flat_map(|a| a.countries.iter())
            .next()
            .cloned();

        Some(Article {
            title,
            abstract_text,
            source: self.id,
            pdf_url,
            year: self.publication_year,
            country,
        })
    }
}

/// Reassemble abstract text from OpenAlex's word -> positions map.
pub fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut words: BTreeMap<usize, &str> = BTreeMap::new();
    for (word, positions) in index {
        for &pos in positions {
            words.insert(pos, word.as_str());
        }
    }
    words
        .values()
        .filter(|w| !w.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct OpenAlexSource {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
    delay: Duration,
    mailto: Option<String>,
}

impl OpenAlexSource {
    pub fn new(config: &FetchConfig) -> AppResult<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS))?,
            base_url: config.openalex_url.clone(),
            page_size: config.openalex_page_size,
            delay: config.request_delay(),
            mailto: config.mailto.clone(),
        })
    }

    #[tracing::instrument(skip(self), fields(source = "openalex"))]
    async fn fetch_page(&self, keyword: &str, cursor: &str) -> AppResult<WorksPage> {
        let filter = format!("title.search:\"{}\"", keyword);
        let per_page = self.page_size.to_string();
        let mut params = vec![
            ("filter", filter.as_str()),
            ("per-page", per_page.as_str()),
            ("cursor", cursor),
            ("select", SELECT_FIELDS),
        ];
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.as_str()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("OpenAlex request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Knowledge(format!("OpenAlex returned HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to parse OpenAlex response: {}", e)))
    }
}

#[async_trait]
impl ArticleSource for OpenAlexSource {
    fn name(&self) -> &str {
        "openalex"
    }

    async fn search(&self, keyword: &str, limit: usize) -> AppResult<Vec<Article>> {
        let mut articles = Vec::new();
        let mut cursor = "*".to_string();

        while articles.len() < limit {
            let page = match self.fetch_page(keyword, &cursor).await {
                Ok(page) => page,
                Err(e) if !articles.is_empty() => {
                    tracing::warn!(error = %e, "OpenAlex paging stopped early");
                    break;
                }
                Err(e) => return Err(e),
            };

            let received = page.results.len();
            for work in page.results {
                if articles.len() >= limit {
                    break;
                }
                if let Some(article) = work.into_article() {
                    articles.push(article);
                }
            }

            match page.meta.next_cursor {
                Some(next) if !next.is_empty() && received > 0 => cursor = next,
                _ => break,
            }
            tokio::time::sleep(self.delay).await;
        }

        tracing::debug!(keyword, found = articles.len(), "OpenAlex search finished");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
      "meta": {"count": 2, "next_cursor": "IlsxNjA5"},
      "results": [
        {
          "id": "https://openalex.org/W2741809807",
          "display_name": "Effect of Ti on inclusions in  Al-killed steel",
          "abstract_inverted_index": {"Titanium": [0], "modifies": [1], "alumina": [2, 5], "inclusions": [3], "and": [4]},
          "primary_location": {"pdf_url": null, "landing_page_url": "https://doi.org/10.1000/xyz"},
          "publication_year": 2018,
          "authorships": [{"countries": []}, {"countries": ["CN", "JP"]}]
        },
        {
          "id": "https://openalex.org/W1",
          "display_name": "No abstract",
          "abstract_inverted_index": null
        }
      ]
    }"#;

    #[test]
    fn test_parse_page_and_convert() {
        let page: WorksPage = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.meta.next_cursor.as_deref(), Some("IlsxNjA5"));

        let articles: Vec<Article> = page.results.into_iter().filter_map(Work::into_article).collect();
        assert_eq!(articles.len(), 1);

        let a = &articles[0];
        assert_eq!(a.title, "Effect of Ti on inclusions in Al-killed steel");
        assert_eq!(a.abstract_text, "Titanium modifies alumina inclusions and alumina");
        assert_eq!(a.source, "https://openalex.org/W2741809807");
        assert_eq!(a.pdf_url.as_deref(), Some("https://doi.org/10.1000/xyz"));
        assert_eq!(a.year, Some(2018));
        assert_eq!(a.country.as_deref(), Some("CN"));
    }

    #[test]
    fn test_rebuild_abstract_skips_gaps() {
        let mut index = HashMap::new();
        index.insert("steel".to_string(), vec![3]);
        index.insert("Clean".to_string(), vec![0]);
        assert_eq!(rebuild_abstract(&index), "Clean steel");
    }

    #[test]
    fn test_pdf_url_preferred_over_landing_page() {
        let work: Work = serde_json::from_str(
            r#"{"id":"W2","display_name":"T","abstract_inverted_index":{"a":[0]},
                "primary_location":{"pdf_url":"https://x.org/a.pdf","landing_page_url":"https://x.org/a"}}"#,
        )
        .unwrap();
        assert_eq!(
            work.into_article().unwrap().pdf_url.as_deref(),
            Some("https://x.org/a.pdf")
        );
    }
}
