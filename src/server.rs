//! HTTP surface of the resolution service.
//!
//! Every successful response is `{success: true, data, timestamp}`. Caller
//! mistakes get a 400 and unexpected failures a 500, both shaped as
//! `{success: false, error, message}`. A resolution that found nothing is
//! still a success.

use crate::batch::BatchOrchestrator;
use crate::browser::{BrowserSession, BrowserSettings};
use crate::config::ServiceConfig;
use crate::error::{CiteError, Result};
use crate::model::{timestamp, PublicationQuery};
use crate::resolver::Resolver;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub batch: BatchOrchestrator,
    pub browser: Option<Arc<BrowserSession>>,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>, batch: BatchOrchestrator, browser: Option<Arc<BrowserSession>>) -> Self {
        Self {
            resolver,
            batch,
            browser,
        }
    }

    /// Wire the production providers. The browser is created but not launched.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let browser = config
            .enable_browser
            .then(|| Arc::new(BrowserSession::new(BrowserSettings::from(config))));
        let resolver = Arc::new(Resolver::from_config(config, browser.clone())?);
        let batch = BatchOrchestrator::new(Arc::clone(&resolver), config.batch_delay);
        Ok(Self::new(resolver, batch, browser))
    }

    /// Release the browser process, if one was ever started.
    pub async fn shutdown(&self) {
        if let Some(browser) = &self.browser {
            browser.shutdown().await;
        }
    }

    fn browser_alive(&self) -> bool {
        self.browser.as_ref().map(|b| b.is_alive()).unwrap_or(false)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/citations/search", post(search_handler))
        .route("/citations/batch", post(batch_handler))
        .route("/paper", get(missing_doi_handler))
        .route("/paper/{*doi}", get(paper_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    data: T,
    timestamp: String,
}

fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        timestamp: timestamp(),
    })
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "validation_error",
            message: message.into(),
        }
    }
}

impl From<CiteError> for ApiError {
    fn from(e: CiteError) -> Self {
        if e.is_validation() {
            return Self::bad_request(e.to_string());
        }
        error!(error = %e, "Request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "internal_error",
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.error,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": timestamp(),
        "services": {
            "providerC_browser_alive": state.browser_alive(),
            "providerA": true,
            "providerB": true,
        }
    }))
}

fn non_empty_str<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Single-publication resolve endpoint
async fn search_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let (Some(title), Some(authors)) = (non_empty_str(&body, "title"), non_empty_str(&body, "authors"))
    else {
        return Err(ApiError::bad_request("title and authors are required"));
    };
    let doi = non_empty_str(&body, "doi").map(str::to_string);

    info!(title = title, doi = ?doi, "Search request");
    let query = PublicationQuery::new(title, authors, doi);
    let result = state.resolver.resolve(&query).await?;
    Ok(success(result))
}

/// Batch resolve endpoint
async fn batch_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let Some(Value::Array(publications)) = body.get("publications").cloned() else {
        return Err(ApiError::bad_request("publications must be an array"));
    };

    info!(count = publications.len(), "Batch request");
    let records = state.batch.run(publications).await;
    Ok(success(records))
}

/// DOI metadata endpoint
async fn paper_handler(
    State(state): State<AppState>,
    Path(doi): Path<String>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let doi = doi.trim_matches('/');
    if doi.is_empty() {
        return Err(ApiError::bad_request("doi is required"));
    }

    info!(doi = doi, "Paper request");
    let result = state.resolver.lookup_doi(doi).await?;
    Ok(success(result))
}

async fn missing_doi_handler() -> ApiError {
    ApiError::bad_request("doi is required")
}
