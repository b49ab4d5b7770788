//! citescout - citation resolution microservice
//!
//! ## Usage
//!
//! ### HTTP Server Mode
//! ```bash
//! citescout serve --port 3000
//! ```
//!
//! ### One-off lookups
//! ```bash
//! citescout resolve --title "Deep learning" --authors "Y LeCun, Y Bengio"
//! citescout doi 10.1038/nature14539
//! citescout batch --input publications.csv --output enriched.json
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use citescout::{
    batch,
    config::{ServiceConfig, DEFAULT_SCHOLAR_URL, MAILTO},
    model::PublicationQuery,
    server::{self, AppState},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Citation resolution microservice
#[derive(Parser)]
#[command(name = "citescout")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    providers: ProviderArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProviderArgs {
    /// Semantic Scholar API key for higher rate limits
    #[arg(long, env = "S2_API_KEY", global = true)]
    s2_api_key: Option<String>,

    /// Contact email sent to Crossref's polite pool
    #[arg(long, env = "CITESCOUT_MAILTO", default_value = MAILTO, global = true)]
    mailto: String,

    /// Google Scholar base URL (for mirrors)
    #[arg(long, env = "CITESCOUT_SCHOLAR_URL", default_value = DEFAULT_SCHOLAR_URL, global = true)]
    scholar_url: String,

    /// Chromium/Chrome executable for the Scholar scrape
    #[arg(long, env = "CHROME_PATH", global = true)]
    chrome_path: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    headful: bool,

    /// Leave the browser-driven Scholar provider out of the search chain
    #[arg(long, env = "CITESCOUT_NO_BROWSER", global = true)]
    no_browser: bool,
}

impl ProviderArgs {
    fn into_config(self) -> ServiceConfig {
        ServiceConfig {
            semantic_scholar_key: self.s2_api_key,
            mailto: self.mailto,
            scholar_url: self.scholar_url,
            chrome_path: self.chrome_path,
            headless: !self.headful,
            enable_browser: !self.no_browser,
            ..ServiceConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "CITESCOUT_PORT", default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, env = "CITESCOUT_HOST", default_value = "127.0.0.1")]
        host: String,
    },

    /// Resolve a single publication
    Resolve {
        /// Publication title
        #[arg(long)]
        title: String,

        /// Comma-separated authors (first author is used for matching)
        #[arg(long)]
        authors: String,

        /// DOI, checked before title/author search
        #[arg(long)]
        doi: Option<String>,
    },

    /// Look up metadata by DOI
    Doi {
        /// DOI (bare or as https://doi.org/ URL)
        doi: String,
    },

    /// Resolve every record of a JSON or CSV file
    Batch {
        /// Input file (.json array or .csv with title,authors[,doi] header)
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.log_json {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = cli.providers.into_config();
    let state = AppState::from_config(&config).context("Failed to build providers")?;

    let outcome = match cli.command {
        Commands::Serve { port, host } => run_server(&state, host, port).await,
        Commands::Resolve {
            title,
            authors,
            doi,
        } => {
            let query = PublicationQuery::new(title, authors, doi);
            match state.resolver.resolve(&query).await {
                Ok(result) => print_json(&result),
                Err(e) => Err(e.into()),
            }
        }
        Commands::Doi { doi } => match state.resolver.lookup_doi(&doi).await {
            Ok(result) => print_json(&result),
            Err(e) => Err(e.into()),
        },
        Commands::Batch { input, output } => run_batch(&state, &input, output.as_deref()).await,
    };

    // The browser must not outlive the process, whatever happened above
    state.shutdown().await;
    outcome
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Batch
// ============================================================================

async fn run_batch(state: &AppState, input: &std::path::Path, output: Option<&std::path::Path>) -> Result<()> {
    let records = batch::load_records(input)
        .with_context(|| format!("Failed to read {:?}", input))?;
    info!(count = records.len(), input = ?input, "Loaded publications");

    let enriched = state.batch.run(records).await;
    let json = serde_json::to_string_pretty(&enriched)?;

    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Saved: {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(state: &AppState, host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");

    let app = server::router(state.clone());

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}
