use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

use super::config::ClientConfig;
use super::models::{HostGroup, Host, RawEvent, RpcRequest, RpcResponse, Trigger};
use super::{AlertSource, EventFilter};
use crate::error::{Error, Result};

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Methods the frontend rejects when an `auth` value is attached
const UNAUTHENTICATED_METHODS: &[&str] = &["user.login", "apiinfo.version"];

#[derive(Default)]
struct SessionState {
    token: Option<String>,
    /// Token came from `user.login` and must be released with `user.logout`
    owned: bool,
}

/// JSON-RPC client for a live Zabbix frontend
pub struct ZabbixClient {
    endpoint: Uri,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    gate: Semaphore,
    session: RwLock<SessionState>,
    client: HttpsClient,
}

impl ZabbixClient {
    /// Create a new client. No network traffic happens until the first call.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let endpoint: Uri = config
            .endpoint()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid Zabbix URL {}: {e}", config.base_url)))?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config(config.verify_tls)?)
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let session = SessionState {
            token: config.token.filter(|t| !t.is_empty()),
            owned: false,
        };

        Ok(Self {
            endpoint,
            username: config.username,
            password: config.password,
            timeout: config.timeout,
            gate: Semaphore::new(config.max_concurrency),
            session: RwLock::new(session),
            client,
        })
    }

    /// Issue one JSON-RPC call through the concurrency gate
    #[tracing::instrument(name = "zabbix.rpc", skip(self, params), fields(method = %method))]
    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let token = if UNAUTHENTICATED_METHODS.contains(&method) {
            None
        } else {
            self.session.read().await.token.clone()
        };

        let payload = serde_json::to_vec(&RpcRequest::new(method, &params, token.as_deref()))
            .map_err(|e| Error::UpstreamApi(format!("Failed to encode {method} request: {e}")))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json-rpc")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| Error::UpstreamApi(format!("Failed to build request: {e}")))?;

        let (status, body) = {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| Error::UpstreamApi("request gate closed".to_string()))?;

            tokio::time::timeout(self.timeout, self.send(request))
                .await
                .map_err(|_| {
                    Error::UpstreamApi(format!(
                        "{method} timed out after {}s",
                        self.timeout.as_secs_f64()
                    ))
                })??
        };

        if status != StatusCode::OK {
            return Err(Error::UpstreamApi(format!("HTTP {}", status.as_u16())));
        }

        let response: RpcResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::UpstreamApi(format!("Malformed {method} response: {e}")))?;

        if let Some(err) = response.error {
            debug!(code = err.code, "Zabbix returned an error for {}", method);
            return Err(Error::UpstreamApi(err.describe()));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<(StatusCode, Bytes)> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| Error::UpstreamApi(format!("Failed to send request: {e}")))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::UpstreamApi(format!("Failed to read response body: {e}")))?
            .to_bytes();

        Ok((status, body))
    }

    /// Call and decode the result into `T`
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let result = self.rpc(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| Error::UpstreamApi(format!("Unexpected {method} result: {e}")))
    }

    /// Resolve host group names to group ids
    async fn group_ids(&self, names: &[String]) -> Result<Vec<String>> {
        let groups: Vec<HostGroup> = self
            .call(
                "hostgroup.get",
                json!({
                    "output": ["groupid", "name"],
                    "filter": {"name": names},
                }),
            )
            .await?;
        Ok(groups.into_iter().map(|g| g.groupid).collect())
    }

    /// Resolve technical host names to host ids
    async fn host_ids(&self, names: &[String]) -> Result<Vec<String>> {
        let hosts: Vec<Host> = self
            .call(
                "host.get",
                json!({
                    "output": ["hostid", "host", "name"],
                    "selectInterfaces": ["ip"],
                    "filter": {"host": names},
                }),
            )
            .await?;
        Ok(hosts.into_iter().map(|h| h.hostid).collect())
    }

    /// Fetch triggers by id, keyed by trigger id
    async fn triggers(&self, ids: Vec<String>) -> Result<HashMap<String, Trigger>> {
        let triggers: Vec<Trigger> = self
            .call(
                "trigger.get",
                json!({
                    "output": ["triggerid", "priority", "description"],
                    "triggerids": ids,
                }),
            )
            .await?;
        Ok(triggers
            .into_iter()
            .map(|t| (t.triggerid.clone(), t))
            .collect())
    }
}

#[async_trait]
impl AlertSource for ZabbixClient {
    #[tracing::instrument(name = "zabbix.login", skip(self))]
    async fn login(&self) -> Result<()> {
        if self.session.read().await.token.is_some() {
            return Ok(());
        }

        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(Error::UpstreamAuth(
                "no API token or username/password configured".to_string(),
            ));
        };

        let result = self
            .rpc(
                "user.login",
                json!({"username": username, "password": password}),
            )
            .await
            .map_err(|e| match e {
                Error::UpstreamApi(message) => Error::UpstreamAuth(message),
                other => other,
            })?;

        let token = result
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::UpstreamAuth(format!("unexpected user.login result: {result}")))?;

        let mut session = self.session.write().await;
        session.token = Some(token.to_string());
        session.owned = true;
        Ok(())
    }

    #[tracing::instrument(name = "zabbix.logout", skip(self))]
    async fn logout(&self) -> Result<()> {
        if !self.session.read().await.owned {
            return Ok(());
        }

        let outcome = self.rpc("user.logout", json!([])).await;

        let mut session = self.session.write().await;
        session.token = None;
        session.owned = false;

        outcome.map(|_| ())
    }

    #[tracing::instrument(name = "zabbix.get_events", skip(self, filter), fields(limit = filter.limit))]
    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<RawEvent>> {
        let mut params = json!({
            "output": ["eventid", "clock", "name", "objectid"],
            "selectHosts": ["hostid", "host", "name"],
            "sortfield": ["clock"],
            "sortorder": "DESC",
            "limit": filter.limit,
        });

        if let Some(from) = filter.time_from {
            params["time_from"] = json!(from);
        }
        if let Some(till) = filter.time_till {
            params["time_till"] = json!(till);
        }
        if let Some(severities) = filter.severity_filter() {
            params["severities"] = json!(severities);
        }
        if let Some(names) = filter.group_filter() {
            let ids = self.group_ids(names).await?;
            if ids.is_empty() {
                debug!("No host groups matched {:?}", names);
                return Ok(Vec::new());
            }
            params["groupids"] = json!(ids);
        }
        if let Some(names) = filter.host_filter() {
            let ids = self.host_ids(names).await?;
            if ids.is_empty() {
                debug!("No hosts matched {:?}", names);
                return Ok(Vec::new());
            }
            params["hostids"] = json!(ids);
        }

        let mut events: Vec<RawEvent> = self.call("event.get", params).await?;

        let mut seen = HashSet::new();
        let trigger_ids: Vec<String> = events
            .iter()
            .filter_map(|e| e.objectid.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if trigger_ids.is_empty() {
            return Ok(events);
        }

        let by_id = self.triggers(trigger_ids).await?;
        for event in &mut events {
            if let Some(trigger) = event.objectid.as_ref().and_then(|id| by_id.get(id)) {
                event.apply_trigger(trigger);
            }
        }

        Ok(events)
    }

    async fn api_version(&self) -> Result<String> {
        let result = self.rpc("apiinfo.version", json!([])).await?;
        Ok(match result {
            Value::String(version) => version,
            other => other.to_string(),
        })
    }
}

/// Build the rustls client configuration, trusting webpki and native roots
fn tls_config(verify: bool) -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Config(format!("Failed to configure TLS: {e}")))?;

    if !verify {
        warn!("TLS certificate verification is disabled for the Zabbix connection");
        return Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth());
    }

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        warn!("Failed to load a native root certificate: {}", err);
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!("Loaded {} native root certificates ({} ignored)", added, ignored);

    Ok(builder.with_root_certificates(roots).with_no_client_auth())
}

/// Verifier used when `verify_tls` is off. Signatures are still checked so
/// the handshake stays well-formed.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
