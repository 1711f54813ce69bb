use anyhow::Result;
use clap::Parser;
use configurator::api::{app, AppState};
use configurator::config::Settings;
use configurator::runner::cache::CachedCatalog;
use configurator::runner::catalog::FileCatalog;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "configurator")]
#[command(author, version, about = "Product configurator rule engine service")]
struct Args {
    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog document with rules, products and option collections (JSON)
    #[arg(long)]
    catalog: PathBuf,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Cache lifetime for rules, products and option collections
    #[arg(long)]
    cache_ttl_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_overrides(args.host, args.port, args.cache_ttl_secs);
    if settings.fields.fields.is_empty() {
        warn!("No attribute fields configured, availability and validation will be empty");
    }

    let source = FileCatalog::from_path(&args.catalog).await?;
    let catalog = CachedCatalog::new(Arc::new(source), settings.cache_ttl());
    catalog.ensure_collections(&settings.required_collections).await?;

    let address = settings.address();
    info!(
        catalog = %args.catalog.display(),
        fields = settings.fields.fields.len(),
        ttl_secs = settings.cache_ttl_secs,
        "Starting configurator"
    );

    let router = app(AppState::new(catalog, settings));
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, router).await?;

    Ok(())
}
