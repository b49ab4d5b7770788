//! Provider chain resolution with caching.
//!
//! A query with a DOI runs the DOI chain; a query without one runs the search
//! chain. Within a chain the first positive hit wins and later providers are
//! never called. When every DOI-chain provider is negative and the query also
//! has a title and author, the search chain gets a turn. Whatever comes out,
//! positive or negative, is cached under the query's normalized key.

use crate::browser::BrowserSession;
use crate::cache::ResolutionCache;
use crate::config::ServiceConfig;
use crate::crossref::CrossrefProvider;
use crate::error::{CiteError, Result};
use crate::gscholar::GoogleScholarProvider;
use crate::model::{normalize_doi, PublicationQuery, ResolutionResult};
use crate::opencitations::OpenCitationsProvider;
use crate::provider::{Outcome, ThrottledProvider};
use crate::semanticscholar::SemanticScholarProvider;
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered list of providers tried until one finds the paper
pub type Chain = Vec<Arc<ThrottledProvider>>;

#[derive(Debug)]
pub struct Resolver {
    cache: ResolutionCache,
    search_chain: Chain,
    doi_chain: Chain,
}

impl Resolver {
    pub fn new(cache: ResolutionCache, search_chain: Chain, doi_chain: Chain) -> Self {
        Self {
            cache,
            search_chain,
            doi_chain,
        }
    }

    /// Production chains. The scrape provider is appended only when a browser
    /// session is supplied.
    pub fn from_config(config: &ServiceConfig, browser: Option<Arc<BrowserSession>>) -> Result<Self> {
        let client = config.http_client()?;

        let semantic = Arc::new(ThrottledProvider::new(Arc::new(
            SemanticScholarProvider::new(client.clone(), config),
        )));
        let opencitations = Arc::new(ThrottledProvider::new(Arc::new(
            OpenCitationsProvider::new(client.clone(), config),
        )));
        let crossref = Arc::new(ThrottledProvider::new(Arc::new(CrossrefProvider::new(
            client, config,
        ))));

        // semantic scholar sits in both chains and shares one limiter
        let mut search_chain = vec![Arc::clone(&semantic), opencitations];
        if let Some(session) = browser {
            search_chain.push(Arc::new(ThrottledProvider::new(Arc::new(
                GoogleScholarProvider::new(session, config),
            ))));
        }
        let doi_chain = vec![crossref, semantic];

        Ok(Self::new(
            ResolutionCache::new(config.cache_ttl, config.cache_capacity),
            search_chain,
            doi_chain,
        ))
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Resolve one publication, DOI first when present.
    pub async fn resolve(&self, query: &PublicationQuery) -> Result<ResolutionResult> {
        query.validate()?;

        let key = query.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            debug!(key = %key, "Cache hit");
            return Ok(hit);
        }

        let mut result = match query.doi() {
            Some(doi) => self.run_doi_chain(&doi).await,
            None => self.run_search_chain(query).await,
        };

        if !result.found && query.doi().is_some() && query.has_title_author() {
            debug!(title = %query.title, "DOI chain exhausted, trying search chain");
            result = self.run_search_chain(query).await;
        }

        info!(
            title = %query.title,
            found = result.found,
            citations = result.citations,
            source = result.source.as_deref().unwrap_or("-"),
            "Resolved"
        );
        self.cache.put(&key, result.clone());
        Ok(result)
    }

    /// Metadata lookup through the DOI chain only.
    pub async fn lookup_doi(&self, doi: &str) -> Result<ResolutionResult> {
        let doi = normalize_doi(doi);
        if doi.is_empty() {
            return Err(CiteError::Validation("doi is required".to_string()));
        }

        let key = PublicationQuery::new("", "", Some(doi.clone())).cache_key();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let result = self.run_doi_chain(&doi).await;
        self.cache.put(&key, result.clone());
        Ok(result)
    }

    async fn run_search_chain(&self, query: &PublicationQuery) -> ResolutionResult {
        let mut last = Outcome::NotFound;
        for provider in &self.search_chain {
            last = provider.search(query).await;
            if last.is_found() {
                break;
            }
            debug!(provider = provider.id(), "No result, falling through");
        }
        last.into_result()
    }

    async fn run_doi_chain(&self, doi: &str) -> ResolutionResult {
        let mut last = Outcome::NotFound;
        for provider in &self.doi_chain {
            last = provider.lookup_doi(doi).await;
            if last.is_found() {
                break;
            }
            debug!(provider = provider.id(), doi = doi, "No DOI record, falling through");
        }
        last.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{StubProvider, StubReply};
    use std::time::Duration;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn step(stub: &Arc<StubProvider>) -> Arc<ThrottledProvider> {
        Arc::new(ThrottledProvider::new(stub.clone()))
    }

    fn resolver(search: &[&Arc<StubProvider>], doi: &[&Arc<StubProvider>]) -> Resolver {
        Resolver::new(
            ResolutionCache::new(DAY, 100),
            search.iter().map(|s| step(s)).collect(),
            doi.iter().map(|s| step(s)).collect(),
        )
    }

    fn drip_irrigation() -> PublicationQuery {
        PublicationQuery::new(
            "Cost Effective and Energy Efficient Drip Irrigation System",
            "M Fuhad, S George",
            None,
        )
    }

    #[tokio::test]
    async fn test_falls_back_to_scrape_provider() {
        let api = Arc::new(StubProvider::new("api", StubReply::NotFound));
        let scrape = Arc::new(StubProvider::new(
            "scrape",
            StubReply::Found(ResolutionResult::found(2)),
        ));
        let resolver = resolver(&[&api, &scrape], &[]);

        let result = resolver.resolve(&drip_irrigation()).await.expect("resolve");
        assert!(result.found);
        assert_eq!(result.citations, 2);
        assert_eq!(result.source.as_deref(), Some("scrape"));

        let cached = resolver
            .cache()
            .get("cost effective and energy efficient drip irrigation system|m fuhad|")
            .expect("cache entry");
        assert_eq!(cached, result);
    }

    #[tokio::test]
    async fn test_first_hit_short_circuits() {
        let first = Arc::new(StubProvider::new(
            "first",
            StubReply::Found(ResolutionResult::found(10)),
        ));
        let second = Arc::new(StubProvider::new(
            "second",
            StubReply::Found(ResolutionResult::found(99)),
        ));
        let resolver = resolver(&[&first, &second], &[]);

        let result = resolver.resolve(&drip_irrigation()).await.expect("resolve");
        assert_eq!(result.citations, 10);
        assert_eq!(second.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_all_negative_returns_last_negative() {
        let first = Arc::new(StubProvider::new("first", StubReply::Fail("down".into())));
        let last = Arc::new(StubProvider::new("last", StubReply::Fail("captcha".into())));
        let resolver = resolver(&[&first, &last], &[]);

        let result = resolver.resolve(&drip_irrigation()).await.expect("resolve");
        assert!(!result.found);
        assert_eq!(result.citations, 0);
        assert_eq!(
            result.source_error.as_deref(),
            Some("last: API error: 503 - captcha")
        );
        assert_eq!(resolver.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_prevents_second_live_call() {
        let api = Arc::new(StubProvider::new(
            "api",
            StubReply::Found(ResolutionResult::found(5)),
        ));
        let resolver = resolver(&[&api], &[]);

        let first = resolver.resolve(&drip_irrigation()).await.expect("resolve");
        let second = resolver.resolve(&drip_irrigation()).await.expect("resolve");
        assert_eq!(first, second);
        assert_eq!(api.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_negative_result_is_cached() {
        let api = Arc::new(StubProvider::new("api", StubReply::NotFound));
        let resolver = resolver(&[&api], &[]);

        resolver.resolve(&drip_irrigation()).await.expect("resolve");
        resolver.resolve(&drip_irrigation()).await.expect("resolve");
        assert_eq!(api.search_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_triggers_live_lookup() {
        let api = Arc::new(StubProvider::new(
            "api",
            StubReply::Found(ResolutionResult::found(5)),
        ));
        let resolver = resolver(&[&api], &[]);

        resolver.resolve(&drip_irrigation()).await.expect("resolve");
        tokio::time::advance(DAY + Duration::from_secs(1)).await;
        resolver.resolve(&drip_irrigation()).await.expect("resolve");
        assert_eq!(api.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_doi_takes_priority_over_search() {
        let search = Arc::new(StubProvider::new(
            "search",
            StubReply::Found(ResolutionResult::found(1)),
        ));
        let registry = Arc::new(
            StubProvider::new("registry", StubReply::NotFound)
                .with_doi(StubReply::Found(ResolutionResult::found(40))),
        );
        let resolver = resolver(&[&search], &[&registry]);

        let mut query = drip_irrigation();
        query.doi = Some("10.1109/ICPEC.2020.1".to_string());
        let result = resolver.resolve(&query).await.expect("resolve");

        assert_eq!(result.citations, 40);
        assert_eq!(registry.doi_calls(), 1);
        assert_eq!(search.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_doi_miss_falls_back_to_search() {
        let search = Arc::new(StubProvider::new(
            "search",
            StubReply::Found(ResolutionResult::found(3)),
        ));
        let registry =
            Arc::new(StubProvider::new("registry", StubReply::NotFound).with_doi(StubReply::NotFound));
        let metadata = Arc::new(
            StubProvider::new("metadata", StubReply::NotFound).with_doi(StubReply::NotFound),
        );
        let resolver = resolver(&[&search], &[&registry, &metadata]);

        let mut query = drip_irrigation();
        query.doi = Some("10.1/unknown".to_string());
        let result = resolver.resolve(&query).await.expect("resolve");

        assert_eq!(result.citations, 3);
        assert_eq!(registry.doi_calls(), 1);
        assert_eq!(metadata.doi_calls(), 1);
    }

    #[tokio::test]
    async fn test_lookup_doi_uses_doi_chain_only() {
        let search = Arc::new(StubProvider::new(
            "search",
            StubReply::Found(ResolutionResult::found(1)),
        ));
        let registry =
            Arc::new(StubProvider::new("registry", StubReply::NotFound).with_doi(StubReply::NotFound));
        let resolver = resolver(&[&search], &[&registry]);

        let result = resolver
            .lookup_doi("https://doi.org/10.1/Missing")
            .await
            .expect("lookup");
        assert!(!result.found);
        assert_eq!(search.search_calls(), 0);
        assert!(resolver.cache().get("||10.1/missing").is_some());
    }

    #[tokio::test]
    async fn test_invalid_query_is_rejected() {
        let api = Arc::new(StubProvider::new("api", StubReply::NotFound));
        let resolver = resolver(&[&api], &[]);

        let err = resolver
            .resolve(&PublicationQuery::new("Only a title", "", None))
            .await
            .expect_err("validation");
        assert!(err.is_validation());
        assert!(resolver.lookup_doi("  ").await.expect_err("empty").is_validation());
        assert_eq!(api.search_calls(), 0);
    }
}
