//! Semantic Scholar API Client
//!
//! Structured metadata provider. Title/author search takes the top hit of a
//! `limit=1` query as authoritative; DOI lookup hits the `DOI:` paper endpoint.
//!
//! API Details:
//! - Search endpoint: GET /graph/v1/paper/search
//! - Paper endpoint: GET /graph/v1/paper/DOI:{doi}
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use crate::config::ServiceConfig;
use crate::error::{CiteError, Result};
use crate::model::{PublicationQuery, ResolutionResult};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Provider id, also reported by the health check as `providerA`
pub const PROVIDER_ID: &str = "semanticscholar";

/// Field set requested from both endpoints
const FIELDS: &str = "title,authors,year,venue,citationCount,externalIds,url";

#[derive(Debug, Deserialize)]
struct SSSearchResponse {
    #[serde(default)]
    data: Vec<SSPaper>,
}

#[derive(Debug, Deserialize)]
struct SSPaper {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<SSAuthor>,
    year: Option<i32>,
    venue: Option<String>,
    #[serde(rename = "citationCount")]
    citation_count: Option<u64>,
    #[serde(rename = "externalIds")]
    external_ids: Option<SSExternalIds>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SemanticScholarProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    interval: Duration,
}

impl SemanticScholarProvider {
    pub fn new(client: Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            base_url: config.semantic_scholar_url.trim_end_matches('/').to_string(),
            api_key: config.semantic_scholar_key.clone(),
            interval: config.api_interval,
        }
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<reqwest::Response>> {
        let mut request = self.client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CiteError::RateLimited(1));
        }
        if !status.is_success() {
            return Err(CiteError::Api {
                code: status.as_u16() as i32,
                message: format!("Semantic Scholar API error: {}", status),
            });
        }

        Ok(Some(response))
    }
}

#[async_trait]
impl Provider for SemanticScholarProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    async fn search(&self, query: &PublicationQuery) -> Result<Option<ResolutionResult>> {
        let search = query.search_string();
        let url = format!("{}/paper/search", self.base_url);
        debug!(query = %search, "Semantic Scholar search");

        let Some(response) = self
            .get(&url, &[("query", search.as_str()), ("limit", "1"), ("fields", FIELDS)])
            .await?
        else {
            return Ok(None);
        };

        let body: SSSearchResponse = response.json().await.map_err(|e| {
            CiteError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
        })?;

        let result = body.data.into_iter().next().map(parse_paper);
        if let Some(found) = &result {
            info!(citations = found.citations, "Semantic Scholar hit");
        }
        Ok(result)
    }

    fn supports_doi(&self) -> bool {
        true
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<ResolutionResult>> {
        let url = format!("{}/paper/DOI:{}", self.base_url, doi);
        let Some(response) = self.get(&url, &[("fields", FIELDS)]).await? else {
            debug!(doi = doi, "DOI unknown to Semantic Scholar");
            return Ok(None);
        };

        let paper: SSPaper = response.json().await.map_err(|e| {
            CiteError::Parse(format!("Failed to parse Semantic Scholar paper: {}", e))
        })?;
        Ok(Some(parse_paper(paper)))
    }
}

fn parse_paper(paper: SSPaper) -> ResolutionResult {
    let authors = paper
        .authors
        .into_iter()
        .filter_map(|a| a.name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    ResolutionResult {
        citations: paper.citation_count.unwrap_or(0),
        found: true,
        year: paper.year,
        venue: paper.venue.filter(|v| !v.trim().is_empty()),
        authors_normalized: Some(authors).filter(|a| !a.is_empty()),
        doi: paper.external_ids.and_then(|ids| ids.doi),
        url: paper.url,
        title: paper.title,
        ..ResolutionResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_FIXTURE: &str = r#"{
        "total": 1, "offset": 0,
        "data": [{
            "paperId": "abc",
            "title": "Cost Effective and Energy Efficient Drip Irrigation System",
            "authors": [{"authorId": "1", "name": "M. Fuhad"}, {"authorId": "2", "name": "S. George"}],
            "year": 2020,
            "venue": "",
            "citationCount": 2,
            "externalIds": {"DOI": "10.1109/example.2020.1"},
            "url": "https://www.semanticscholar.org/paper/abc"
        }]
    }"#;

    #[test]
    fn test_parse_search_hit() {
        let body: SSSearchResponse = serde_json::from_str(SEARCH_FIXTURE).expect("fixture");
        let result = parse_paper(body.data.into_iter().next().expect("one hit"));
        assert!(result.found);
        assert_eq!(result.citations, 2);
        assert_eq!(result.year, Some(2020));
        assert_eq!(result.venue, None);
        assert_eq!(result.authors_normalized.as_deref(), Some("M. Fuhad, S. George"));
        assert_eq!(result.doi.as_deref(), Some("10.1109/example.2020.1"));
    }

    #[test]
    fn test_parse_empty_search() {
        let body: SSSearchResponse =
            serde_json::from_str(r#"{"total": 0, "offset": 0}"#).expect("fixture");
        assert!(body.data.is_empty());
    }

    #[test]
    fn test_missing_citation_count_is_zero() {
        let paper: SSPaper = serde_json::from_str(r#"{"title": "X", "authors": []}"#).expect("fixture");
        let result = parse_paper(paper);
        assert!(result.found);
        assert_eq!(result.citations, 0);
        assert_eq!(result.authors_normalized, None);
    }
}
