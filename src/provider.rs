//! Provider abstraction for external bibliographic sources.
//!
//! Each source implements [`Provider`]. The resolver never calls a provider
//! directly: it goes through a [`ThrottledProvider`], which applies the
//! provider's own [`RateLimiter`] and converts every call into a tagged
//! [`Outcome`], so a failing source only causes fallthrough to the next one.

use crate::error::{CiteError, Result};
use crate::model::{PublicationQuery, ResolutionResult};
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One external bibliographic data source.
///
/// `Ok(Some(_))` means the source found the paper, `Ok(None)` that it has no
/// record, and `Err(_)` that the call itself failed.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Stable identifier used in logs and in `ResolutionResult::source`
    fn id(&self) -> &str;

    /// Minimum spacing between two requests to this source
    fn min_interval(&self) -> Duration;

    /// Search by title and first author
    async fn search(&self, query: &PublicationQuery) -> Result<Option<ResolutionResult>>;

    /// Whether [`Provider::lookup_doi`] is implemented
    fn supports_doi(&self) -> bool {
        false
    }

    /// Lookup by DOI
    async fn lookup_doi(&self, _doi: &str) -> Result<Option<ResolutionResult>> {
        Err(CiteError::Unsupported(self.id().to_string()))
    }
}

/// Tagged result of one provider step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Found(ResolutionResult),
    NotFound,
    Failed(String),
}

impl Outcome {
    fn from_call(provider_id: &str, call: Result<Option<ResolutionResult>>) -> Self {
        match call {
            Ok(Some(mut result)) => {
                result.found = true;
                result.source_error = None;
                Outcome::Found(result.with_source(provider_id))
            }
            Ok(None) => Outcome::NotFound,
            Err(e) => {
                warn!(provider = provider_id, error = %e, "Provider call failed");
                Outcome::Failed(format!("{}: {}", provider_id, e))
            }
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }

    /// Collapse into the wire result; negative outcomes always carry zero citations.
    pub fn into_result(self) -> ResolutionResult {
        match self {
            Outcome::Found(result) => result,
            Outcome::NotFound => ResolutionResult::not_found(),
            Outcome::Failed(message) => ResolutionResult::failed(message),
        }
    }
}

/// A provider paired with the rate limiter every caller of it shares.
#[derive(Debug)]
pub struct ThrottledProvider {
    provider: Arc<dyn Provider>,
    limiter: RateLimiter,
}

impl ThrottledProvider {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        let limiter = RateLimiter::new(provider.id(), provider.min_interval());
        Self { provider, limiter }
    }

    pub fn id(&self) -> &str {
        self.provider.id()
    }

    pub fn supports_doi(&self) -> bool {
        self.provider.supports_doi()
    }

    pub async fn search(&self, query: &PublicationQuery) -> Outcome {
        self.limiter.wait().await;
        debug!(provider = self.id(), title = %query.title, "Searching");
        Outcome::from_call(self.id(), self.provider.search(query).await)
    }

    pub async fn lookup_doi(&self, doi: &str) -> Outcome {
        if !self.provider.supports_doi() {
            return Outcome::Failed(format!("{}: DOI lookup not supported", self.id()));
        }
        self.limiter.wait().await;
        debug!(provider = self.id(), doi = doi, "Looking up DOI");
        Outcome::from_call(self.id(), self.provider.lookup_doi(doi).await)
    }
}

/// Scripted reply for [`StubProvider`].
#[derive(Debug, Clone)]
pub enum StubReply {
    Found(ResolutionResult),
    NotFound,
    Fail(String),
}

/// Offline test double with fixed replies and call counters.
#[derive(Debug)]
pub struct StubProvider {
    id: String,
    interval: Duration,
    search_reply: StubReply,
    doi_reply: Option<StubReply>,
    search_calls: AtomicUsize,
    doi_calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(id: impl Into<String>, search_reply: StubReply) -> Self {
        Self {
            id: id.into(),
            interval: Duration::ZERO,
            search_reply,
            doi_reply: None,
            search_calls: AtomicUsize::new(0),
            doi_calls: AtomicUsize::new(0),
        }
    }

    /// Enable DOI lookup with the given reply.
    pub fn with_doi(mut self, reply: StubReply) -> Self {
        self.doi_reply = Some(reply);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn doi_calls(&self) -> usize {
        self.doi_calls.load(Ordering::SeqCst)
    }

    fn reply(&self, reply: &StubReply) -> Result<Option<ResolutionResult>> {
        match reply {
            StubReply::Found(result) => Ok(Some(result.clone())),
            StubReply::NotFound => Ok(None),
            StubReply::Fail(message) => Err(CiteError::Api {
                code: 503,
                message: message.clone(),
            }),
        }
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    async fn search(&self, _query: &PublicationQuery) -> Result<Option<ResolutionResult>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.reply(&self.search_reply)
    }

    fn supports_doi(&self) -> bool {
        self.doi_reply.is_some()
    }

    async fn lookup_doi(&self, _doi: &str) -> Result<Option<ResolutionResult>> {
        self.doi_calls.fetch_add(1, Ordering::SeqCst);
        match &self.doi_reply {
            Some(reply) => self.reply(reply),
            None => Err(CiteError::Unsupported(self.id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> PublicationQuery {
        PublicationQuery::new("Title", "Author", None)
    }

    #[tokio::test]
    async fn test_failure_becomes_negative_result() {
        let stub = Arc::new(StubProvider::new("a", StubReply::Fail("timeout".into())));
        let step = ThrottledProvider::new(stub);
        let outcome = step.search(&query()).await;
        assert!(matches!(outcome, Outcome::Failed(_)));

        let result = outcome.into_result();
        assert!(!result.found);
        assert_eq!(result.citations, 0);
        assert_eq!(
            result.source_error.as_deref(),
            Some("a: API error: 503 - timeout")
        );
    }

    #[tokio::test]
    async fn test_found_is_tagged_with_source() {
        let mut reply = ResolutionResult::found(4);
        reply.found = false;
        let stub = Arc::new(StubProvider::new("b", StubReply::Found(reply)));
        let result = ThrottledProvider::new(stub).search(&query()).await.into_result();
        assert!(result.found);
        assert_eq!(result.citations, 4);
        assert_eq!(result.source.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_doi_lookup_unsupported() {
        let stub = Arc::new(StubProvider::new("c", StubReply::NotFound));
        let step = ThrottledProvider::new(stub.clone());
        assert!(!step.supports_doi());
        let outcome = step.lookup_doi("10.1/x").await;
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(stub.doi_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_is_rate_limited() {
        let stub = Arc::new(
            StubProvider::new("d", StubReply::NotFound).with_interval(Duration::from_millis(2000)),
        );
        let step = ThrottledProvider::new(stub.clone());
        let start = tokio::time::Instant::now();
        step.search(&query()).await;
        step.search(&query()).await;
        step.search(&query()).await;
        assert!(tokio::time::Instant::now() - start >= Duration::from_millis(4000));
        assert_eq!(stub.search_calls(), 3);
    }
}
