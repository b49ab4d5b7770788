//! # citescout
//!
//! Citation resolution microservice. Given a publication's title, authors and
//! optional DOI, it asks several unreliable bibliographic sources in a fixed
//! priority order and returns the first authoritative citation count.
//!
//! ## Modules
//!
//! - [`resolver`] - Provider chains, DOI routing and result caching
//! - [`batch`] - Sequential, failure-isolated resolution of many records
//! - [`server`] - Axum HTTP surface and shutdown wiring
//! - [`provider`] - Provider trait, tagged outcomes, per-provider throttling
//! - [`semanticscholar`], [`opencitations`], [`crossref`], [`gscholar`] - Sources
//! - [`browser`] - Shared headless Chromium session for the Scholar scrape
//! - [`cache`] / [`rate_limit`] - TTL cache and minimum-interval limiter
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use citescout::{config::ServiceConfig, model::PublicationQuery, resolver::Resolver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = Resolver::from_config(&ServiceConfig::default(), None)?;
//!     let query = PublicationQuery::new("Deep learning", "Y LeCun, Y Bengio", None);
//!     let result = resolver.resolve(&query).await?;
//!     println!("found={} citations={}", result.found, result.citations);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod browser;
pub mod cache;
pub mod config;
pub mod crossref;
pub mod error;
pub mod gscholar;
pub mod model;
pub mod opencitations;
pub mod provider;
pub mod rate_limit;
pub mod resolver;
pub mod semanticscholar;
pub mod server;

pub use error::{CiteError, Result};
