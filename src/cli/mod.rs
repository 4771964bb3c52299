//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;

use crate::cache::TtlCache;
use crate::config::{load_settings, Settings};
use crate::error::ServiceError;
use crate::scrapers::{
    AnvisaClient, CircuitBreaker, HttpClient, Pacer, RateLimiter, ScrapingClient, UserAgentPool,
};
use crate::services::{LeafletService, MedicineService};

#[derive(Parser)]
#[command(name = "bulario")]
#[command(about = "Resilient client and cache for the ANVISA medicine portal")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Search medicines by name or active ingredient
    Search {
        /// Search term (at least 3 characters)
        query: String,
    },

    /// Look up a single medicine by its registry number
    Get {
        /// Registry number (digits only)
        registry: String,
    },

    /// Fetch the patient and professional leaflets for a registry number
    Leaflet {
        /// Registry number (digits only)
        registry: String,
        /// Print the sanitized leaflet HTML instead of a summary
        #[arg(long)]
        full: bool,
    },

    /// Show circuit breaker, rate limiter and cache status
    Status,

    /// Remove expired cache entries
    Sweep,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let app = App::from_settings(settings);

    match cli.command {
        Commands::Search { query } => cmd_search(&app, &query, cli.json).await,
        Commands::Get { registry } => cmd_get(&app, &registry, cli.json).await,
        Commands::Leaflet { registry, full } => cmd_leaflet(&app, &registry, full, cli.json).await,
        Commands::Status => cmd_status(&app, cli.json).await,
        Commands::Sweep => cmd_sweep(&app, cli.json).await,
    }
}

/// Service stack wired from settings.
struct App {
    settings: Settings,
    cache: TtlCache,
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
    medicines: MedicineService,
    leaflets: LeafletService,
}

impl App {
    fn from_settings(settings: Settings) -> Self {
        let pacer = Pacer::new(settings.delay_min(), settings.delay_max());
        let user_agents = match settings.user_agents_file {
            Some(ref path) => UserAgentPool::from_file(path),
            None => UserAgentPool::builtin(),
        };
        let rate_limiter =
            RateLimiter::new(settings.rate_limit_capacity, settings.rate_limit_period());
        let circuit_breaker = CircuitBreaker::new(settings.circuit_breaker_config());

        let http = HttpClient::new(
            &settings.base_url,
            settings.request_timeout(),
            pacer,
            user_agents,
            rate_limiter.clone(),
            circuit_breaker.clone(),
        )
        .with_retry(settings.max_attempts, settings.backoff_base());

        let client: Arc<dyn ScrapingClient> =
            Arc::new(AnvisaClient::new(settings.base_url.clone(), http));
        let cache = TtlCache::new();

        let medicines = MedicineService::new(
            client.clone(),
            cache.clone(),
            settings.search_ttl(),
            settings.medicine_ttl(),
        );
        let leaflets = LeafletService::new(client, cache.clone(), settings.leaflet_ttl());

        Self {
            settings,
            cache,
            rate_limiter,
            circuit_breaker,
            medicines,
            leaflets,
        }
    }
}

async fn cmd_search(app: &App, query: &str, json: bool) -> anyhow::Result<()> {
    let records = app
        .medicines
        .search_medicines(query)
        .await
        .map_err(service_err)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!(
            "{} No medicines found matching '{}'",
            style("!").yellow(),
            query
        );
        return Ok(());
    }

    println!("\n{} results for '{}'\n", records.len(), query);

    for record in &records {
        println!(
            "{} {} [{}]",
            style(&record.registry_number).cyan(),
            style(&record.product_name).bold(),
            record.regulatory_type
        );
        if !record.active_ingredient.is_empty() {
            println!("  {}", record.active_ingredient);
        }
        if !record.company.is_empty() {
            println!("  {}", style(&record.company).dim());
        }
    }

    Ok(())
}

async fn cmd_get(app: &App, registry: &str, json: bool) -> anyhow::Result<()> {
    let record = app
        .medicines
        .get_medicine_by_registry_number(registry)
        .await
        .map_err(service_err)?;

    if json {
        match record {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("null"),
        }
        return Ok(());
    }

    let record = match record {
        Some(record) => record,
        None => {
            println!(
                "{} No medicine registered under '{}'",
                style("!").yellow(),
                registry
            );
            return Ok(());
        }
    };

    println!("\n{}", style(&record.product_name).bold());
    println!("{}", "-".repeat(40));
    print_field("Registry:", &record.registry_number);
    print_field("Process:", &record.process_number);
    print_field("Company:", &record.company);
    print_field("CNPJ:", &record.cnpj);
    print_field("Active ingredient:", &record.active_ingredient);
    print_field("Therapeutic class:", &record.therapeutic_class);
    print_field("Category:", &record.regulatory_type);
    print_field("Presentation:", &record.presentation);
    print_field("Detail page:", &record.leaflet_url);

    Ok(())
}

async fn cmd_leaflet(app: &App, registry: &str, full: bool, json: bool) -> anyhow::Result<()> {
    let record = app
        .leaflets
        .get_leaflet(registry)
        .await
        .map_err(service_err)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    if record.is_empty() {
        println!(
            "{} No leaflets published for registry {}",
            style("!").yellow(),
            registry
        );
        return Ok(());
    }

    if full {
        if !record.patient_leaflet_html.is_empty() {
            println!("\n{}", style("Patient leaflet").bold());
            println!("{}", "-".repeat(40));
            println!("{}", record.patient_leaflet_html);
        }
        if !record.professional_leaflet_html.is_empty() {
            println!("\n{}", style("Professional leaflet").bold());
            println!("{}", "-".repeat(40));
            println!("{}", record.professional_leaflet_html);
        }
        return Ok(());
    }

    println!("\nLeaflets for {}", style(registry).cyan());
    println!("{}", "-".repeat(40));
    println!(
        "{:<16} {}",
        "Patient:",
        leaflet_summary(&record.patient_leaflet_html)
    );
    println!(
        "{:<16} {}",
        "Professional:",
        leaflet_summary(&record.professional_leaflet_html)
    );
    println!("\nUse --full to print the sanitized HTML.");

    Ok(())
}

async fn cmd_status(app: &App, json: bool) -> anyhow::Result<()> {
    let stats = app.cache.stats().await;
    let settings = &app.settings;

    if json {
        let output = serde_json::json!({
            "base_url": settings.base_url,
            "circuit_state": app.circuit_breaker.state().as_str(),
            "failure_rate": app.circuit_breaker.failure_rate(),
            "tokens_available": app.rate_limiter.available(),
            "tokens_capacity": app.rate_limiter.capacity(),
            "cache_entries": stats.entries,
            "cache_expired": stats.expired,
            "search_ttl_minutes": settings.search_ttl_minutes,
            "medicine_ttl_minutes": settings.medicine_ttl_minutes,
            "leaflet_ttl_minutes": settings.leaflet_ttl_minutes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("\n{}", style("Bulario Status").bold());
    println!("{}", "-".repeat(40));
    println!("{:<24} {}", "Portal:", settings.base_url);
    println!(
        "{:<24} {}",
        "Circuit state:",
        app.circuit_breaker.state().as_str()
    );
    println!(
        "{:<24} {}/{}",
        "Request tokens:",
        app.rate_limiter.available(),
        app.rate_limiter.capacity()
    );
    println!("{:<24} {}", "Cache entries:", stats.entries);
    if stats.expired > 0 {
        println!("{:<24} {}", "  awaiting sweep:", stats.expired);
    }
    println!("{:<24} {} min", "Search TTL:", settings.search_ttl_minutes);
    println!(
        "{:<24} {} min",
        "Medicine TTL:",
        settings.medicine_ttl_minutes
    );
    println!("{:<24} {} min", "Leaflet TTL:", settings.leaflet_ttl_minutes);

    Ok(())
}

async fn cmd_sweep(app: &App, json: bool) -> anyhow::Result<()> {
    let removed = app.cache.sweep_expired().await;

    if json {
        let output = serde_json::json!({ "removed": removed });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} Removed {} expired cache entries",
        style("✓").green(),
        removed
    );

    Ok(())
}

fn service_err(err: ServiceError) -> anyhow::Error {
    match err {
        ServiceError::InvalidArgument(msg) => anyhow::anyhow!(msg),
        ServiceError::Scraping(inner) => anyhow::anyhow!("{}: {}", inner.kind().as_str(), inner),
    }
}

fn print_field(label: &str, value: &str) {
    if !value.is_empty() {
        println!("{:<20} {}", label, value);
    }
}

fn leaflet_summary(html: &str) -> String {
    if html.is_empty() {
        "not published".to_string()
    } else {
        format!("{} characters", html.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScrapingError, ScrapingErrorKind};

    #[test]
    fn invalid_arguments_surface_their_message() {
        let err = service_err(ServiceError::InvalidArgument(
            "registry number must contain only digits".to_string(),
        ));
        assert_eq!(err.to_string(), "registry number must contain only digits");
    }

    #[test]
    fn upstream_failures_carry_their_error_code() {
        let err = service_err(ServiceError::Scraping(ScrapingError::new(
            ScrapingErrorKind::ServiceUnavailable,
            "portal answered 503",
        )));
        assert_eq!(err.to_string(), "SERVICE_UNAVAILABLE: portal answered 503");
    }
}
