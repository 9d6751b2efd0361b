//! rustslr - Systematic Literature Review assistant
//!
//! A Rust service that plans a literature review with an LLM, searches
//! literature databases, screens the results and drafts the review sections.
//!
//! ## Usage
//!
//! ### HTTP Server Mode
//! ```bash
//! rustslr serve --port 8000
//! ```
//!
//! ### CLI Mode
//! ```bash
//! rustslr search "\"large language model\" AND screening" --source semanticscholar --output papers.csv
//! rustslr keys
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustslr::{
    config::Settings,
    paper,
    review::ReviewService,
    search::{SearchQuery, SearchSource, YearRange, DEFAULT_LIMIT},
    server::{self, AppState},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Systematic Literature Review assistant
#[derive(Parser)]
#[command(name = "rustslr")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Search one literature backend and print or save the results
    Search {
        /// Boolean search string
        query: String,

        /// Search backend
        #[arg(long, value_enum, default_value = "scopus")]
        source: SearchSource,

        /// First publication year (default: five years ago)
        #[arg(long)]
        start_year: Option<i32>,

        /// Last publication year (default: current year)
        #[arg(long)]
        end_year: Option<i32>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Write results to this CSV file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show which provider credentials are configured
    Keys,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env is optional
    let _ = dotenvy::dotenv();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    let settings = Settings::from_env();

    match cli.command {
        Commands::Serve { port, host } => run_server(host, port, settings).await,
        Commands::Search {
            query,
            source,
            start_year,
            end_year,
            limit,
            output,
        } => {
            let query = SearchQuery {
                query,
                years: YearRange::resolve(start_year, end_year)?,
                limit,
                source,
            };
            run_search(settings, query, output).await
        }
        Commands::Keys => show_keys(settings),
    }
}

// ============================================================================
// CLI Commands
// ============================================================================

async fn run_search(settings: Settings, query: SearchQuery, output: Option<PathBuf>) -> Result<()> {
    let service = ReviewService::from_settings(settings)?;

    println!(
        "Searching {} for {} ({}-{})...",
        query.source.name(),
        query.query,
        query.years.start,
        query.years.end
    );
    let papers = service.search_papers(&query).await?;
    println!("Found {} papers.", papers.len());

    match output {
        Some(path) => {
            paper::save_csv(&path, &papers)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&papers)?),
    }

    Ok(())
}

fn show_keys(settings: Settings) -> Result<()> {
    for status in settings.credential_status() {
        let state = if status.configured { "configured" } else { "missing" };
        println!(
            "{:<18} {:<26} {:<10} {}",
            status.name,
            status.env_var,
            state,
            status.preview.unwrap_or_default()
        );
    }
    println!(
        "{:<18} {:<26} {}",
        "Scholar proxy",
        "SCHOLAR_PROXY",
        if settings.scholar_proxy.is_some() { "configured" } else { "not set" }
    );
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(host: String, port: u16, settings: Settings) -> Result<()> {
    info!(
        host = %host,
        port = port,
        default_model = %settings.default_model,
        template = %settings.template_path.display(),
        "Starting HTTP server"
    );

    let review = ReviewService::from_settings(settings).context("Failed to initialise services")?;
    let app = server::router(Arc::new(AppState { review }));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
