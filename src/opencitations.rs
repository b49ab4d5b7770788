//! OpenCitations COCI client.
//!
//! Citation-graph provider keyed by DOI only. Without a DOI it answers
//! NotFound without touching the network.

use crate::config::ServiceConfig;
use crate::error::{CiteError, OptionExt, Result};
use crate::model::{normalize_doi, PublicationQuery, ResolutionResult};
use crate::provider::Provider;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Provider id, reported by the health check as `providerB`
pub const PROVIDER_ID: &str = "opencitations";

#[derive(Debug, Deserialize)]
struct CountRow {
    count: String,
}

#[derive(Debug, Clone)]
pub struct OpenCitationsProvider {
    client: reqwest::Client,
    base_url: String,
    interval: Duration,
}

impl OpenCitationsProvider {
    pub fn new(client: reqwest::Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            base_url: config.opencitations_url.trim_end_matches('/').to_string(),
            interval: config.api_interval,
        }
    }

    async fn citation_count(&self, doi: &str) -> Result<Option<ResolutionResult>> {
        let url = format!("{}/citation-count/{}", self.base_url, doi);
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CiteError::RateLimited(1));
        }
        if !status.is_success() {
            return Err(CiteError::Api {
                code: status.as_u16() as i32,
                message: format!("OpenCitations API error: {}", status),
            });
        }

        let rows: Vec<CountRow> = response.json().await?;
        let count = parse_count(&rows)?;
        debug!(doi = doi, count = count, "OpenCitations count");

        // COCI reports 0 for DOIs it has never indexed
        if count == 0 {
            return Ok(None);
        }

        Ok(Some(ResolutionResult {
            doi: Some(doi.to_string()),
            ..ResolutionResult::found(count)
        }))
    }
}

fn parse_count(rows: &[CountRow]) -> Result<u64> {
    let row = rows.first().ok_or_parse("empty citation-count response")?;
    row.count
        .trim()
        .parse::<u64>()
        .map_err(|e| CiteError::Parse(format!("bad citation count '{}': {}", row.count, e)))
}

#[async_trait]
impl Provider for OpenCitationsProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    async fn search(&self, query: &PublicationQuery) -> Result<Option<ResolutionResult>> {
        match query.doi() {
            Some(doi) => self.citation_count(&doi).await,
            None => Ok(None),
        }
    }

    fn supports_doi(&self) -> bool {
        true
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<ResolutionResult>> {
        self.citation_count(&normalize_doi(doi)).await
    }
}
