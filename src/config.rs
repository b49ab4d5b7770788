//! Runtime configuration for the resolution service.
//!
//! The binary fills this from CLI flags and environment variables; tests build
//! it directly and point the API base URLs at local fixtures.

use std::path::PathBuf;
use std::time::Duration;

/// Semantic Scholar Graph API base URL
pub const SEMANTIC_SCHOLAR_API_URL: &str = "https://api.semanticscholar.org/graph/v1";

/// Crossref works endpoint
pub const CROSSREF_API_URL: &str = "https://api.crossref.org/works";

/// OpenCitations COCI index
pub const OPENCITATIONS_API_URL: &str = "https://opencitations.net/index/coci/api/v1";

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// User agent for the browser and HTTP clients
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Polite pool email for Crossref API
pub const MAILTO: &str = "citescout@example.com";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub semantic_scholar_url: String,
    pub semantic_scholar_key: Option<String>,
    pub crossref_url: String,
    pub opencitations_url: String,
    pub scholar_url: String,
    pub mailto: String,
    pub user_agent: String,
    /// HTTP timeout for API providers
    pub http_timeout: Duration,
    pub api_interval: Duration,
    pub scrape_interval: Duration,
    pub cache_ttl: Duration,
    /// Insert count above which expired entries are swept
    pub cache_capacity: usize,
    pub batch_delay: Duration,
    pub navigation_timeout: Duration,
    /// How long to wait for the primary result element
    pub selector_timeout: Duration,
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    /// Include the browser-driven provider in the search chain
    pub enable_browser: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            semantic_scholar_url: SEMANTIC_SCHOLAR_API_URL.to_string(),
            semantic_scholar_key: None,
            crossref_url: CROSSREF_API_URL.to_string(),
            opencitations_url: OPENCITATIONS_API_URL.to_string(),
            scholar_url: DEFAULT_SCHOLAR_URL.to_string(),
            mailto: MAILTO.to_string(),
            user_agent: USER_AGENT.to_string(),
            http_timeout: Duration::from_secs(15),
            api_interval: Duration::from_millis(1000),
            scrape_interval: Duration::from_millis(2000),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            cache_capacity: 10_000,
            batch_delay: Duration::from_millis(1000),
            navigation_timeout: Duration::from_secs(10),
            selector_timeout: Duration::from_secs(10),
            chrome_path: None,
            headless: true,
            enable_browser: true,
        }
    }
}

impl ServiceConfig {
    /// Build a shared HTTP client for the API providers.
    pub fn http_client(&self) -> crate::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(format!("citescout/0.1 (mailto:{})", self.mailto))
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| crate::CiteError::Config(format!("Failed to build HTTP client: {}", e)))
    }
}
