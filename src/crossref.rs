//! Crossref API client.
//!
//! Bibliographic registry at the head of the DOI chain. A `/works/{doi}` record
//! carries full metadata plus `is-referenced-by-count`, which is used as the
//! citation count.

use crate::config::ServiceConfig;
use crate::error::{CiteError, Result};
use crate::model::{PublicationQuery, ResolutionResult};
use crate::provider::Provider;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const PROVIDER_ID: &str = "crossref";

#[derive(Debug, Clone)]
pub struct CrossrefProvider {
    client: reqwest::Client,
    base_url: String,
    mailto: String,
    interval: Duration,
}

impl CrossrefProvider {
    pub fn new(client: reqwest::Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            base_url: config.crossref_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            interval: config.api_interval,
        }
    }

    fn check_status(response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CiteError::RateLimited(5));
        }
        if !status.is_success() {
            return Err(CiteError::Api {
                code: status.as_u16() as i32,
                message: format!("Crossref API error: {}", status),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for CrossrefProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    /// The registry is consulted by DOI only.
    async fn search(&self, _query: &PublicationQuery) -> Result<Option<ResolutionResult>> {
        Ok(None)
    }

    fn supports_doi(&self) -> bool {
        true
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<ResolutionResult>> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(doi));
        let response = self
            .client
            .get(&url)
            .query(&[("mailto", self.mailto.as_str())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(doi = doi, "DOI not registered with Crossref");
            return Ok(None);
        }
        Self::check_status(&response)?;

        let data: CrossrefWorkResponse = response.json().await?;
        let result = parse_crossref_item(data.message);
        info!(doi = doi, citations = result.citations, "Crossref hit");
        Ok(Some(result))
    }
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefWorkResponse {
    message: CrossrefItem,
}

#[derive(Debug, Deserialize)]
struct CrossrefItem {
    #[serde(rename = "DOI", default)]
    doi: String,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(default)]
    published: Option<CrossrefDate>,
    #[serde(default)]
    issued: Option<CrossrefDate>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(rename = "URL", default)]
    url: Option<String>,
    #[serde(rename = "is-referenced-by-count", default)]
    referenced_by: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    #[serde(default)]
    given: String,
    #[serde(default)]
    family: String,
}

#[derive(Debug, Deserialize)]
struct CrossrefDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl CrossrefDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.first()?.first().copied().flatten()
    }
}

/// Parse Crossref API item into a resolution result
fn parse_crossref_item(item: CrossrefItem) -> ResolutionResult {
    let authors = item
        .author
        .iter()
        .map(|a| format!("{} {}", a.given, a.family).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let year = item
        .published
        .as_ref()
        .and_then(CrossrefDate::year)
        .or_else(|| item.issued.as_ref().and_then(CrossrefDate::year));

    ResolutionResult {
        citations: item.referenced_by.unwrap_or(0),
        found: true,
        year,
        venue: item.container_title.into_iter().next(),
        authors_normalized: Some(authors).filter(|a| !a.is_empty()),
        doi: Some(item.doi).filter(|d| !d.is_empty()),
        url: item.url,
        title: item.title.into_iter().next(),
        publisher: item.publisher,
        ..ResolutionResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORK_FIXTURE: &str = r#"{
        "status": "ok",
        "message": {
            "DOI": "10.1038/nature14539",
            "title": ["Deep learning"],
            "author": [
                {"given": "Yann", "family": "LeCun"},
                {"given": "Yoshua", "family": "Bengio"},
                {"family": "Hinton"}
            ],
            "container-title": ["Nature"],
            "published": {"date-parts": [[2015, 5, 27]]},
            "publisher": "Springer Science and Business Media LLC",
            "URL": "https://doi.org/10.1038/nature14539",
            "is-referenced-by-count": 61234
        }
    }"#;

    #[test]
    fn test_parse_work() {
        let data: CrossrefWorkResponse = serde_json::from_str(WORK_FIXTURE).expect("fixture");
        let result = parse_crossref_item(data.message);
        assert!(result.found);
        assert_eq!(result.citations, 61234);
        assert_eq!(result.year, Some(2015));
        assert_eq!(result.venue.as_deref(), Some("Nature"));
        assert_eq!(
            result.authors_normalized.as_deref(),
            Some("Yann LeCun, Yoshua Bengio, Hinton")
        );
        assert_eq!(result.publisher.as_deref(), Some("Springer Science and Business Media LLC"));
        assert_eq!(result.title.as_deref(), Some("Deep learning"));
    }

    #[test]
    fn test_year_falls_back_to_issued() {
        let item: CrossrefItem = serde_json::from_str(
            r#"{"DOI": "10.1/x", "issued": {"date-parts": [[2019]]}}"#,
        )
        .expect("fixture");
        let result = parse_crossref_item(item);
        assert_eq!(result.year, Some(2019));
        assert_eq!(result.citations, 0);
        assert_eq!(result.authors_normalized, None);
    }

    #[test]
    fn test_null_date_part() {
        let item: CrossrefItem =
            serde_json::from_str(r#"{"published": {"date-parts": [[null]]}}"#).expect("fixture");
        assert_eq!(parse_crossref_item(item).year, None);
    }

    #[tokio::test]
    async fn test_search_is_doi_only() {
        let config = ServiceConfig {
            crossref_url: "http://127.0.0.1:9".to_string(),
            ..ServiceConfig::default()
        };
        let provider = CrossrefProvider::new(reqwest::Client::new(), &config);
        let query = PublicationQuery::new("Deep learning", "Y LeCun", None);
        assert_eq!(provider.search(&query).await.expect("no call"), None);
        assert!(provider.supports_doi());
    }
}
