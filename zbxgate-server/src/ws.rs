//! `GET /mcp/ws`: echo socket plus server-pushed notices.
//!
//! Every text frame is answered with `ok:<text>`. Connected clients are
//! tracked in a [`ClientRegistry`] so the server can broadcast to all of
//! them (finished queue jobs, for now).

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    HeaderMap, HeaderValue, CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY,
    SEC_WEBSOCKET_VERSION, UPGRADE,
};
use hyper::upgrade::OnUpgrade;
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::ApiError;
use crate::prom;

/// Live WebSocket clients, keyed by connection id
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<Uuid, mpsc::UnboundedSender<String>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and return the receiving end of its outbox
    pub async fn connect(&self, id: Uuid) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut clients = self.clients.lock().await;
        clients.insert(id, tx);
        prom::set_active_clients(clients.len());
        rx
    }

    /// Unknown ids are ignored
    pub async fn disconnect(&self, id: Uuid) {
        let mut clients = self.clients.lock().await;
        clients.remove(&id);
        prom::set_active_clients(clients.len());
    }

    /// Queue `message` for every client. Clients whose outbox is gone are
    /// dropped. Returns how many clients it reached.
    pub async fn broadcast(&self, message: &str) -> usize {
        let mut clients = self.clients.lock().await;
        clients.retain(|_, tx| tx.send(message.to_string()).is_ok());
        prom::set_active_clients(clients.len());
        clients.len()
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }
}

/// Validate the upgrade headers and build the `101 Switching Protocols` reply
pub fn handshake(headers: &HeaderMap) -> Result<Response<Full<Bytes>>, ApiError> {
    let wants_websocket = headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    let version_ok = headers
        .get(SEC_WEBSOCKET_VERSION)
        .is_some_and(|v| v.as_bytes() == b"13");
    let key = headers.get(SEC_WEBSOCKET_KEY);

    let Some(key) = key.filter(|_| wants_websocket && version_ok) else {
        return Err(ApiError::invalid_query(
            "WebSocket upgrade (version 13) required",
        ));
    };

    let accept = HeaderValue::from_str(&derive_accept_key(key.as_bytes()))
        .map_err(|e| ApiError::invalid_query(format!("Bad Sec-WebSocket-Key: {e}")))?;

    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(SEC_WEBSOCKET_ACCEPT, accept);
    Ok(response)
}

/// Wait for hyper to hand over the connection, then serve it
pub async fn serve(on_upgrade: OnUpgrade, registry: Arc<ClientRegistry>) {
    let upgraded = match on_upgrade.await {
        Ok(upgraded) => upgraded,
        Err(e) => {
            debug!("WebSocket upgrade failed: {}", e);
            return;
        }
    };

    let socket = WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await;
    let id = Uuid::new_v4();
    let outbox = registry.connect(id).await;
    info!(client_id = %id, "WebSocket client connected");

    if let Err(e) = session(socket, outbox).await {
        debug!(client_id = %id, "WebSocket session ended with error: {}", e);
    }

    registry.disconnect(id).await;
    info!(client_id = %id, "WebSocket client disconnected");
}

async fn session<S>(
    mut socket: WebSocketStream<S>,
    mut outbox: mpsc::UnboundedReceiver<String>,
) -> Result<(), tokio_tungstenite::tungstenite::Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            incoming = socket.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        socket.send(Message::Text(format!("ok:{text}"))).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                }
            }
            Some(notice) = outbox.recv() => {
                socket.send(Message::Text(notice)).await?;
            }
        }
    }
    Ok(())
}
