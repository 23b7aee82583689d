use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::{self, AppState};

/// Accept connections until `cancel` flips, one task per connection
pub async fn run(
    listener: TcpListener,
    state: Arc<AppState>,
    mut cancel: watch::Receiver<bool>,
) -> Result<()> {
    let local_addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!("HTTP gateway listening on {}", local_addr);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = result.context("Failed to accept connection")?;
                let state = state.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(api::handle(req, state).await) }
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        if !e.is_incomplete_message() {
                            debug!("HTTP connection from {} error: {}", peer_addr, e);
                        }
                    }
                });
            }
            _ = cancel.changed() => {
                info!("HTTP gateway received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}
