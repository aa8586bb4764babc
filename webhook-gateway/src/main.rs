//! Webhook gateway server.
//!
//! Listens on `/webhooks?service=<provider>`, verifies and applies each
//! delivery, and writes one audit entry per call.
//!
//! This binary is a demo harness: effects land in a [`MemoryStore`] that
//! starts empty and is lost on exit. Against empty tables only payment
//! upserts succeed; invoice, subscription, package and notification updates
//! answer 400 "not found". A deployment builds its own binary around the
//! library and hands [`EventRouter::with_store`] a [`gateway::DataStore`]
//! backed by its database.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gateway::{
    router, AppState, AuditLogger, Config, EventRouter, Gateway, JsonlAuditSink, MemoryStore,
    TracingAuditSink, VerifierRegistry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("gateway_starting");

    let config = Config::from_env();
    info!(
        port = config.port,
        public_base_url = ?config.public_base_url,
        max_body_bytes = config.max_body_bytes,
        audit_log_path = ?config.audit_log_path,
        secrets = ?config.secrets,
        "config_loaded"
    );

    let verifiers = VerifierRegistry::from_config(&config);
    let store = MemoryStore::new();
    let events = EventRouter::with_store(Arc::new(store));

    let audit = match &config.audit_log_path {
        Some(path) => {
            let sink = JsonlAuditSink::open(path)
                .await
                .with_context(|| format!("Failed to open audit log {}", path.display()))?;
            info!(path = %path.display(), "audit_log_opened");
            AuditLogger::new(sink)
        }
        None => AuditLogger::new(TracingAuditSink),
    };

    let state = AppState::new(config.clone(), Gateway::new(verifiers, events, audit));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "gateway_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("gateway_shutdown_complete");

    Ok(())
}

/// Completes when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("gateway_shutting_down");
}
