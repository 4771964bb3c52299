//! Bulario - resilient client and cache for the ANVISA medicine portal.
//!
//! Searches medicine registrations and fetches patient and professional
//! leaflets from the public consulta portal.

mod cache;
mod cli;
mod config;
mod error;
mod models;
mod scrapers;
mod services;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "bulario=info"
    } else {
        "bulario=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}
