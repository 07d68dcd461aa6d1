//! GameTrader API Server
//!
//! Users, their game catalog and trade offers between them. Offer and
//! account changes are announced on the event log for the mailer.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url, get_events_database_url};
use gametrader_core::events::{PgEventLog, Publisher};
use gametrader_core::framework::DatabaseProcessor;
use gametrader_core::store::{Datastore, PgDatastore};
use gametrader_core::trade::{AccountService, TradeService};
use gametrader_core::utils::retry::retry_fixed;
use server::{build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// GameTrader - trade games with other collectors
#[derive(Parser, Debug)]
#[command(name = "gametrader-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./gametrader-server.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting gametrader-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ConfigLoader::new(&args.config, args.listen)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    let listen_addr = config.server.listen;
    let startup = &config.startup;

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = retry_fixed("database", startup.attempts, startup.store_retry(), || {
        PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
    })
    .await?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // The event log shares the main database unless told otherwise
    let events_pool = match get_events_database_url() {
        Some(url) => {
            tracing::info!("Connecting to event log database...");
            retry_fixed("event log", startup.attempts, startup.broker_retry(), || {
                PgPoolOptions::new().max_connections(5).connect(&url)
            })
            .await?
        }
        None => db_pool.clone(),
    };
    let event_log = PgEventLog::new(events_pool.clone())
        .with_default_partitions(config.events.partitions);
    let publisher = Publisher::new(Arc::new(event_log), config.events.topics.clone());

    // Readiness: one init message per topic
    retry_fixed("event log", startup.attempts, startup.broker_retry(), || {
        publisher.announce()
    })
    .await?;
    tracing::info!("Event log ready");

    // Create application state
    let store: Arc<dyn Datastore> = Arc::new(PgDatastore::new(db_pool.clone()));
    let state = AppState::new(
        DatabaseProcessor::new(db_pool.clone()),
        TradeService::new(store.clone(), publisher.clone()),
        AccountService::new(store, publisher),
        config.events.topics.clone(),
    );

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    events_pool.close().await;
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
