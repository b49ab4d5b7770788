//! Query and result types shared by every provider.

use crate::error::{CiteError, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// DOI prefixes stripped during normalization
const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// A publication to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationQuery {
    pub title: String,
    /// Comma-separated author list; the first entry disambiguates search hits
    pub authors: String,
    #[serde(default)]
    pub doi: Option<String>,
}

impl PublicationQuery {
    pub fn new(title: impl Into<String>, authors: impl Into<String>, doi: Option<String>) -> Self {
        Self {
            title: title.into(),
            authors: authors.into(),
            doi,
        }
    }

    /// First entry of the author list, trimmed.
    pub fn first_author(&self) -> &str {
        self.authors.split(',').next().unwrap_or("").trim()
    }

    /// Normalized DOI, if one was supplied and is non-empty.
    pub fn doi(&self) -> Option<String> {
        self.doi
            .as_deref()
            .map(normalize_doi)
            .filter(|d| !d.is_empty())
    }

    /// Whether title and first author are both present.
    pub fn has_title_author(&self) -> bool {
        !self.title.trim().is_empty() && !self.first_author().is_empty()
    }

    /// Free-text search string: `"<title>" <first-author>`.
    pub fn search_string(&self) -> String {
        format!("\"{}\" {}", self.title.trim(), self.first_author())
    }

    /// Stable cache key over normalized title, first author and DOI.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            normalize_text(&self.title),
            normalize_text(self.first_author()),
            self.doi().unwrap_or_default()
        )
    }

    /// Reject queries that no chain can answer.
    pub fn validate(&self) -> Result<()> {
        if self.doi().is_some() || self.has_title_author() {
            Ok(())
        } else {
            Err(CiteError::Validation(
                "title and authors are required when no DOI is given".to_string(),
            ))
        }
    }
}

/// Outcome of resolving one publication.
///
/// `found = false` with `citations = 0` means "no authoritative data", which is
/// different from `found = true, citations = 0` (verified zero citations).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub citations: u64,
    pub found: bool,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub authors_normalized: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub source_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Provider id that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ResolutionResult {
    /// The canonical "no data" value.
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Negative result carrying the failure text of a provider.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            source_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Positive result with only a citation count.
    pub fn found(citations: u64) -> Self {
        Self {
            citations,
            found: true,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Lowercase and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercase a DOI and strip resolver URL or `doi:` prefixes.
pub fn normalize_doi(doi: &str) -> String {
    let mut doi = doi.trim().to_lowercase();
    for prefix in DOI_PREFIXES {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest.trim().to_string();
            break;
        }
    }
    doi
}
