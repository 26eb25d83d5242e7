// Agenda API server
// Decision: A corrupt store file never silently becomes an empty calendar:
// it is quarantined with a loud warning, or startup aborts in strict mode
// Decision: The reminder scanner shares the store and stops with the server

use std::sync::Arc;

use agenda_api::{build_app, ServerConfig};
use agenda_core::persistence::quarantine;
use agenda_core::telemetry::{init_telemetry, TelemetryConfig};
use agenda_core::{EventStore, LogNotifier, ReminderScanner, StoreError};
use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Configure via RUST_LOG / LOG_LEVEL and LOG_FORMAT
    let mut telemetry_config = TelemetryConfig::from_env();
    telemetry_config.service_version = Some(env!("CARGO_PKG_VERSION").to_string());
    init_telemetry(telemetry_config);

    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(
        events_file = %config.events_file.display(),
        reminder_interval_secs = config.reminder_interval.as_secs(),
        "agenda-api starting"
    );

    let store = Arc::new(open_store(&config)?);

    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }
    if config.cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS origins configured");
    }

    let scanner = ReminderScanner::new(store.clone(), Arc::new(LogNotifier))
        .with_interval(config.reminder_interval)
        .spawn();

    let app = build_app(store, &config);

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.http_addr))?;
    tracing::info!("HTTP server listening on {}", config.http_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    scanner.shutdown().await;
    tracing::info!("agenda-api shutdown complete");

    served
}

/// Open the store, handling a corrupt file according to `strict_load`.
///
/// Only a corrupt file is recoverable; an unreadable one always aborts so a
/// later save cannot overwrite it.
fn open_store(config: &ServerConfig) -> Result<EventStore> {
    let path = &config.events_file;
    match EventStore::open(path) {
        Ok(store) => Ok(store),
        Err(e @ StoreError::Corrupt { .. }) if !config.strict_load => {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "Event store is corrupt; starting with an empty store"
            );
            let moved = quarantine(path)
                .with_context(|| format!("Failed to quarantine {}", path.display()))?;
            tracing::warn!(
                quarantined = %moved.display(),
                "Corrupt event store moved aside; recover events from it manually"
            );
            Ok(EventStore::empty(path))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
