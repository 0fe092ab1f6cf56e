use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use websub_bridge::config::Config;
use websub_bridge::dedup::DedupTracker;
use websub_bridge::publish::{LogPublisher, MqttPublisher, Publisher};
use websub_bridge::server;
use websub_bridge::storage::{Database, StorageError};
use websub_bridge::websub::CallbackHandler;

/// Leases ending within this window are reported at startup.
const LEASE_WARNING_WINDOW_HOURS: i64 = 24;

#[derive(Parser, Debug)]
#[command(
    name = "websub-bridge",
    about = "Republishes WebSub Atom notifications to MQTT"
)]
struct Args {
    /// Configuration file (TOML). Missing file means defaults.
    #[arg(long, value_name = "FILE", default_value = "websub-bridge.toml")]
    config: PathBuf,

    /// Listen address, overriding the config file and WEBSUB_LISTEN_ADDR
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// Log entries instead of publishing them to MQTT
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.apply_overrides(|key| std::env::var(key).ok());
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    config.validate().context("Invalid configuration")?;
    tracing::debug!(config = ?config, "Effective configuration");

    let config = Arc::new(config);
    let tracker = Arc::new(DedupTracker::new(
        config.dedup_capacity(),
        config.dedup_retention(),
    ));

    let mqtt = if args.dry_run {
        tracing::warn!("Dry run: entries will be logged, not published");
        None
    } else {
        Some(Arc::new(MqttPublisher::connect(&config.mqtt)))
    };
    let publisher: Arc<dyn Publisher> = match &mqtt {
        Some(mqtt) => mqtt.clone() as Arc<dyn Publisher>,
        None => Arc::new(LogPublisher),
    };

    let mut handler = CallbackHandler::new(Arc::clone(&config), tracker, publisher);
    if let Some(path) = &config.database_path {
        let db = match Database::open(path).await {
            Ok(db) => db,
            Err(StorageError::InstanceLocked) => {
                anyhow::bail!("Database {} is locked by another websub-bridge process", path);
            }
            Err(e) => return Err(e).context("Failed to open database"),
        };
        prepare_database(&db, &config).await?;
        handler = handler.with_database(db);
        let replayed = handler
            .replay_journal()
            .await
            .context("Failed to replay post journal")?;
        tracing::info!(replayed, "Restored dedup state from journal");
    }

    server::serve(Arc::new(handler), &config.listen_addr, shutdown_signal())
        .await
        .with_context(|| format!("HTTP server on {} failed", config.listen_addr))?;

    if let Some(mqtt) = mqtt {
        mqtt.disconnect().await;
    }
    tracing::info!("Shut down");
    Ok(())
}

/// Prunes journal rows past retention and reports leases due for renewal.
async fn prepare_database(db: &Database, config: &Config) -> Result<()> {
    let now = Utc::now();
    if let Some(retention) = config.dedup_retention() {
        let pruned = db
            .prune_posts(now - retention)
            .await
            .context("Failed to prune post journal")?;
        if pruned > 0 {
            tracing::info!(pruned, "Pruned expired journal entries");
        }
    }

    let expiring = db
        .expiring_subscriptions(chrono::Duration::hours(LEASE_WARNING_WINDOW_HOURS), now)
        .await
        .context("Failed to read subscription leases")?;
    for subscription in expiring {
        tracing::warn!(
            topic = %subscription.topic,
            lease_expires = ?subscription.lease_expires,
            "Subscription lease expires soon, resubscribe required"
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
