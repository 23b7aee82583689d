//! HTTP routes of the gateway.
//!
//! Every request passes the read-only guard, then role resolution and
//! routing, and ends with one audit line on the `audit` target.

mod error;
mod handlers;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use zbxgate_common::GatewayConfig;

use crate::auth::{self, Role};
use crate::queue::TaskQueue;
use crate::ws::{self, ClientRegistry};

pub use error::ApiError;

/// Gateway configuration shared by the routes and the queue workers
pub type SharedConfig = Arc<RwLock<Arc<GatewayConfig>>>;

/// Re-reads the configuration for `POST /config/reload`
pub type ConfigLoader = Box<dyn Fn() -> zbxgate_common::Result<GatewayConfig> + Send + Sync>;

/// Paths that accept mutating methods in read-only mode
const READ_ONLY_ALLOWED: &[&str] = &["/alerts/query", "/alerts/nl", "/logs/associate"];

pub struct AppState {
    config: SharedConfig,
    loader: ConfigLoader,
    queue: TaskQueue,
    clients: Arc<ClientRegistry>,
    metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(
        config: SharedConfig,
        queue: TaskQueue,
        clients: Arc<ClientRegistry>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            config,
            loader: Box::new(GatewayConfig::from_env),
            queue,
            clients,
            metrics,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    pub async fn config(&self) -> Arc<GatewayConfig> {
        self.config.read().await.clone()
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }
}

/// Serve one request. Never fails: errors become JSON error responses.
pub async fn handle<B>(req: Request<B>, state: Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: fmt::Display,
{
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let config = state.config().await;

    let role = auth::resolve_role(
        req.headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
        config.admin_token.as_deref(),
        config.read_token.as_deref(),
    );

    let outcome = if blocked_by_read_only(&config, &method, &path) {
        Err(ApiError::read_only())
    } else {
        route(req, &state, &config, role).await
    };

    let response = outcome.unwrap_or_else(|e| {
        if e.status().is_server_error() {
            warn!("{} {} failed: {:?}", method, path, e);
        }
        e.into_response()
    });

    info!(
        target: "audit",
        route = %path,
        method = %method,
        role = role.map_or("-", Role::as_str),
        status = response.status().as_u16(),
        dur_ms = start.elapsed().as_millis() as u64,
        "request"
    );

    response
}

async fn route<B>(
    mut req: Request<B>,
    state: &AppState,
    config: &GatewayConfig,
    role: Option<Role>,
) -> Result<Response<Full<Bytes>>, ApiError>
where
    B: Body,
    B::Error: fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (&method, path.as_str()) {
        (&Method::GET, "/health") => Ok(handlers::health(config)),
        (&Method::GET, "/metrics") => Ok(handlers::metrics(&state.metrics)),
        (&Method::GET, "/mcp/ws") => {
            let response = ws::handshake(req.headers())?;
            let on_upgrade = hyper::upgrade::on(&mut req);
            tokio::spawn(ws::serve(on_upgrade, state.clients().clone()));
            Ok(response)
        }
        (&Method::GET, "/version") => {
            require(role, Role::Read)?;
            handlers::version(config).await
        }
        (&Method::POST, "/alerts/query") => {
            require(role, Role::Read)?;
            handlers::alerts_query(config, read_json(req).await?).await
        }
        (&Method::GET, "/alerts/today") => {
            require(role, Role::Read)?;
            handlers::alerts_today(config, query_params(req.uri().query())?).await
        }
        (&Method::GET, "/alerts/top") => {
            require(role, Role::Read)?;
            handlers::alerts_top(config, query_params(req.uri().query())?).await
        }
        (&Method::POST, "/alerts/nl") => {
            require(role, Role::Read)?;
            handlers::alerts_nl(config, read_json(req).await?).await
        }
        (&Method::POST, "/logs/associate") => {
            require(role, Role::Read)?;
            handlers::logs_associate(config, read_json(req).await?).await
        }
        (&Method::POST, "/queue/enqueue") => {
            require_admin_writable(role, config)?;
            handlers::queue_enqueue(state.queue(), read_json(req).await?).await
        }
        (&Method::GET, "/queue/stats") => {
            require_admin_writable(role, config)?;
            Ok(handlers::queue_stats(state.queue()))
        }
        (&Method::POST, "/config/reload") => {
            require_admin_writable(role, config)?;
            handlers::config_reload(state).await
        }
        _ => Err(ApiError::not_found(&path)),
    }
}

fn blocked_by_read_only(config: &GatewayConfig, method: &Method, path: &str) -> bool {
    let mutating = matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    );
    config.read_only && mutating && !READ_ONLY_ALLOWED.contains(&path)
}

fn require(role: Option<Role>, required: Role) -> Result<(), ApiError> {
    match role {
        Some(r) if r.satisfies(required) => Ok(()),
        _ => Err(ApiError::forbidden(format!("{required} required"))),
    }
}

/// Admin routes are also closed in read-only mode, whatever the method
fn require_admin_writable(role: Option<Role>, config: &GatewayConfig) -> Result<(), ApiError> {
    require(role, Role::Admin)?;
    if config.read_only {
        return Err(ApiError::read_only());
    }
    Ok(())
}

async fn read_json<T, B>(req: Request<B>) -> Result<T, ApiError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: fmt::Display,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| ApiError::invalid_query(format!("Failed to read request body: {e}")))?
        .to_bytes();

    serde_json::from_slice(&body)
        .map_err(|e| ApiError::invalid_query(format!("Malformed JSON body: {e}")))
}

/// Decode the URL query string into a typed parameter set
fn query_params<T: DeserializeOwned>(query: Option<&str>) -> Result<T, ApiError> {
    serde_urlencoded::from_str(query.unwrap_or_default())
        .map_err(|e| ApiError::invalid_query(format!("Malformed query string: {e}")))
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, payload) = match serde_json::to_vec(body) {
        Ok(payload) => (status, payload),
        Err(e) => {
            warn!("Failed to encode response body: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, b"{}".to_vec())
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(payload)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
