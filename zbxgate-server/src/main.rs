mod api;
mod auth;
mod prom;
mod queue;
mod server;
mod telemetry;
mod ws;

use std::sync::Arc;

use anyhow::{Context, Result};
use api::{AppState, SharedConfig};
use queue::TaskQueue;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;
use ws::ClientRegistry;
use zbxgate_common::GatewayConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Generate session ID for this server run
    let session_id = Uuid::new_v4().to_string();

    let tracer_provider =
        telemetry::init_telemetry(&session_id).context("Failed to initialize telemetry")?;

    info!("Starting zbxgate-server (session {})...", session_id);

    let config = GatewayConfig::from_env().context("Failed to load gateway configuration")?;
    info!(?config, "Configuration loaded");

    if config.admin_token.is_none() && config.read_token.is_none() {
        warn!("No ZBXGATE_AUTH_TOKEN_* set; every protected route will answer 403");
    }

    let prometheus = prom::install_recorder()?;

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP gateway on {}", config.listen_addr))?;

    let workers = config.queue_workers;
    let shared: SharedConfig = Arc::new(RwLock::new(Arc::new(config)));

    let clients = Arc::new(ClientRegistry::new());

    let job_config = shared.clone();
    let job_clients = clients.clone();
    let queue = TaskQueue::start(workers, move |job| {
        let cell = job_config.clone();
        let clients = job_clients.clone();
        async move {
            let config = cell.read().await.clone();
            let kind = job.kind.clone();
            queue::run_job(&config, job).await?;
            clients.broadcast(&queue::finished_notice(&kind)).await;
            anyhow::Ok(())
        }
    });

    let state = Arc::new(AppState::new(shared, queue, clients, prometheus));

    // Create shared cancellation channel
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let server_state = state.clone();
    let server_task = tokio::spawn(server::run(listener, server_state, cancel_rx));

    shutdown_signal().await?;
    let _ = cancel_tx.send(true);

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP gateway failed: {:#}", e),
        Err(e) => error!("HTTP gateway task panicked: {}", e),
    }

    state.queue().stop().await;

    info!("Server shut down successfully");

    // Flush remaining spans before exit
    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            error!("Failed to shut down tracer provider: {}", e);
        }
    }

    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM
#[tracing::instrument(name = "server.shutdown", skip_all)]
async fn shutdown_signal() -> Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to register SIGTERM handler")?;

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            info!("Received SIGINT, initiating graceful shutdown...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    Ok(())
}
