//! Google Scholar scrape provider.
//!
//! Last resort of the search chain. Renders the results page for
//! `"<title>" <first-author>` in the shared [`BrowserSession`] and reads the
//! "Cited by N" link of the first result.

use crate::browser::{BrowserSession, RenderedPage};
use crate::config::ServiceConfig;
use crate::error::{CiteError, Result};
use crate::model::{PublicationQuery, ResolutionResult};
use crate::provider::Provider;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Provider id, reported by the health check as `providerC`
pub const PROVIDER_ID: &str = "gscholar";

/// Container that holds the organic results once rendered
pub const RESULTS_SELECTOR: &str = "#gs_res_ccl_mid";

/// Marker in the href of the "Cited by" link
const CITED_BY_MARKER: &str = "cites=";

/// First result as read from the page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScholarHit {
    pub title: String,
    pub authors: String,
    pub venue: String,
    pub year: Option<i32>,
    pub article_url: String,
    pub citations: u64,
}

impl From<ScholarHit> for ResolutionResult {
    fn from(hit: ScholarHit) -> Self {
        ResolutionResult {
            citations: hit.citations,
            found: true,
            year: hit.year,
            venue: Some(hit.venue).filter(|v| !v.is_empty()),
            authors_normalized: Some(hit.authors).filter(|a| !a.is_empty()),
            url: Some(hit.article_url).filter(|u| !u.is_empty()),
            title: Some(hit.title),
            ..ResolutionResult::default()
        }
    }
}

#[derive(Debug)]
pub struct GoogleScholarProvider {
    session: Arc<BrowserSession>,
    base_url: String,
    interval: Duration,
    selector_timeout: Duration,
}

impl GoogleScholarProvider {
    pub fn new(session: Arc<BrowserSession>, config: &ServiceConfig) -> Self {
        Self {
            session,
            base_url: config.scholar_url.trim_end_matches('/').to_string(),
            interval: config.scrape_interval,
            selector_timeout: config.selector_timeout,
        }
    }
}

#[async_trait]
impl Provider for GoogleScholarProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    async fn search(&self, query: &PublicationQuery) -> Result<Option<ResolutionResult>> {
        if let Err(e) = self.session.ensure_started().await {
            debug!(error = %e, "Browser unavailable, skipping Scholar");
            return Ok(None);
        }

        let url = build_search_url(&self.base_url, &query.search_string())?;
        info!(url = %url, "Scraping Google Scholar");

        let page = self
            .session
            .render(url.as_str(), RESULTS_SELECTOR, self.selector_timeout)
            .await?;

        Ok(read_results_page(&page)?.map(ResolutionResult::from))
    }
}

fn is_captcha_page(html: &str) -> bool {
    html.contains("Solving the above CAPTCHA")
        || html.contains("unusual traffic")
        || html.contains("id=\"gs_captcha")
}

/// Interpret a rendered results page.
///
/// A CAPTCHA interstitial is an error whether or not the results container
/// rendered. A page without the container and without a CAPTCHA has no hit.
pub fn read_results_page(page: &RenderedPage) -> Result<Option<ScholarHit>> {
    if is_captcha_page(&page.html) {
        warn!("CAPTCHA detected");
        return Err(CiteError::Captcha);
    }
    if !page.selector_found {
        return Ok(None);
    }
    parse_first_result(&page.html)
}

/// Build Google Scholar search URL
fn build_search_url(base_url: &str, query: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/scholar", base_url))
        .map_err(|e| CiteError::Config(format!("Invalid base URL: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("q", query)
        // Force English locale for consistent parsing
        .append_pair("hl", "en");

    Ok(url)
}

/// Parse the first organic result of a Scholar results page.
pub fn parse_first_result(html: &str) -> Result<Option<ScholarHit>> {
    let document = Html::parse_document(html);

    let item_selector = Selector::parse(&format!("{} .gs_ri", RESULTS_SELECTOR))
        .map_err(|e| CiteError::Parse(e.to_string()))?;
    let title_selector =
        Selector::parse("h3.gs_rt").map_err(|e| CiteError::Parse(e.to_string()))?;
    let link_selector =
        Selector::parse("h3.gs_rt a").map_err(|e| CiteError::Parse(e.to_string()))?;
    let meta_selector =
        Selector::parse("div.gs_a").map_err(|e| CiteError::Parse(e.to_string()))?;
    let footer_link_selector =
        Selector::parse("div.gs_fl a").map_err(|e| CiteError::Parse(e.to_string()))?;

    let year_regex =
        Regex::new(r"\b(19|20)\d{2}\b").map_err(|e| CiteError::Parse(e.to_string()))?;
    let number_regex = Regex::new(r"\d+").map_err(|e| CiteError::Parse(e.to_string()))?;

    let Some(item) = document.select(&item_selector).next() else {
        return Ok(None);
    };

    let mut hit = ScholarHit::default();

    if let Some(link) = item.select(&link_selector).next() {
        hit.title = link.text().collect::<String>().trim().to_string();
        hit.article_url = link.value().attr("href").unwrap_or("").to_string();
    } else if let Some(title) = item.select(&title_selector).next() {
        hit.title = title.text().collect::<String>().trim().to_string();
    }

    // "A Author, B Author - Venue, 2020 - host"
    if let Some(meta) = item.select(&meta_selector).next() {
        let meta_text = meta.text().collect::<String>().replace('\u{a0}', " ");
        let parts: Vec<&str> = meta_text.split(" - ").collect();

        if let Some(authors) = parts.first() {
            hit.authors = authors.trim().to_string();
        }
        if let Some(venue_year) = parts.get(1) {
            // venue names may themselves start with a year
            if let Some(year_match) = year_regex.find_iter(venue_year).last() {
                hit.year = year_match.as_str().parse().ok();
                hit.venue = venue_year[..year_match.start()]
                    .trim()
                    .trim_end_matches(',')
                    .to_string();
            } else {
                hit.venue = venue_year.trim().to_string();
            }
        }
    }

    for link in item.select(&footer_link_selector) {
        let href = link.value().attr("href").unwrap_or("");
        if !href.contains(CITED_BY_MARKER) {
            continue;
        }
        let text = link.text().collect::<String>();
        if let Some(count) = number_regex.find(&text) {
            hit.citations = count.as_str().parse().unwrap_or(0);
            break;
        }
    }

    if hit.title.is_empty() {
        return Ok(None);
    }
    Ok(Some(hit))
}
