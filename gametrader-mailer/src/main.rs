//! GameTrader Mailer
//!
//! Joins a consumer group on the offer and user topics and turns every
//! trade or account event into notification emails.

mod config;
mod shutdown;

use clap::Parser;
use config::file::MailConfig;
use config::{ConfigLoader, get_database_url, get_events_database_url};
use gametrader_core::events::PgEventLog;
use gametrader_core::notifications::{LogTransport, MailTransport, RelayTransport};
use gametrader_core::processors::{NotificationConsumer, NotificationDispatcher};
use gametrader_core::store::PgDatastore;
use gametrader_core::utils::retry::retry_fixed;
use shutdown::spawn_shutdown_watcher;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// GameTrader Mailer - notification emails for trades and accounts
#[derive(Parser, Debug)]
#[command(name = "gametrader-mailer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./gametrader-mailer.toml")]
    config: PathBuf,

    /// Override the consumer group name
    #[arg(short, long, env = "GAMETRADER_MAILER_GROUP")]
    group: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting gametrader-mailer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ConfigLoader::new(&args.config, args.group)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
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
            .max_connections(5)
            .connect(&database_url)
    })
    .await?;
    tracing::info!("Database connection established");

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

    let transport: Arc<dyn MailTransport> = match &config.mail {
        MailConfig::Relay {
            relay_url,
            from,
            timeout_secs,
        } => {
            tracing::info!(relay = %relay_url, from = %from, "Delivering mail through relay");
            let relay = RelayTransport::new(
                relay_url.clone(),
                from.clone(),
                Duration::from_secs(*timeout_secs),
            )
            .map_err(|e| {
                tracing::error!("Failed to build mail relay client: {}", e);
                e
            })?;
            Arc::new(relay)
        }
        MailConfig::Log => {
            tracing::warn!("No mail relay configured, messages are only logged");
            Arc::new(LogTransport)
        }
    };

    let settings = config.consumer_settings();
    let dispatcher = NotificationDispatcher::new(
        Arc::new(PgDatastore::new(db_pool.clone())),
        settings.topics.clone(),
    );
    let consumer = NotificationConsumer::new(
        Arc::new(PgEventLog::new(events_pool.clone())),
        dispatcher,
        transport,
        settings,
    );

    // Run until SIGTERM/SIGINT
    let shutdown_rx = spawn_shutdown_watcher();
    consumer.run(shutdown_rx).await;

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    events_pool.close().await;
    db_pool.close().await;
    tracing::info!("Mailer shutdown complete");

    Ok(())
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
