//! Custom error types for citescout.
//!
//! All fallible operations return `Result<T, CiteError>`. Provider failures are
//! not fatal: the resolver turns them into negative results carrying the
//! error text, so only validation and truly unexpected failures reach callers.

use thiserror::Error;

/// Main error type for citescout operations.
#[derive(Debug, Error)]
pub enum CiteError {
    /// Headless browser failure (launch, navigation, CDP)
    #[error("Browser error: {0}")]
    Browser(String),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML/JSON shape did not match expectations
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// CAPTCHA page served instead of results
    #[error("CAPTCHA detected")]
    Captcha,

    /// Provider does not implement the requested lookup
    #[error("Operation not supported by provider {0}")]
    Unsupported(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV input error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Anything that escaped the categories above (e.g. a panicked task)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Missing or malformed caller input
    #[error("Validation error: {0}")]
    Validation(String),
}

impl CiteError {
    /// True for errors caused by caller input rather than by the service.
    pub fn is_validation(&self) -> bool {
        matches!(self, CiteError::Validation(_))
    }
}

/// Result type alias using `CiteError`
pub type Result<T> = std::result::Result<T, CiteError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| CiteError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<u32> = None;
        let err = missing.ok_or_parse("no count").expect_err("should fail");
        assert_eq!(err.to_string(), "Parse error: no count");
        assert_eq!(Some(3).ok_or_parse("unused").expect("present"), 3);
    }

    #[test]
    fn test_is_validation() {
        assert!(CiteError::Validation("title".into()).is_validation());
        assert!(!CiteError::Parse("x".into()).is_validation());
    }
}
