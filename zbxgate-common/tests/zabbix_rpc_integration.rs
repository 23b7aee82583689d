//! Integration tests for the live JSON-RPC client.
//!
//! These tests spin up a hyper server that answers like a Zabbix frontend
//! and drive a real `ZabbixClient` against it over HTTP.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use zbxgate_common::{
    query_alerts, with_session, AlertQuery, AlertSource, ClientConfig, Error, EventFilter,
    SortKey, ZabbixClient,
};

#[derive(Clone, Copy)]
enum Behavior {
    Normal,
    RpcError,
    ServerError,
    /// Answer normally after sleeping
    Delayed(Duration),
}

/// Every JSON-RPC request body the mock received, in order
type Journal = Arc<Mutex<Vec<Value>>>;

/// Requests being served right now, and the most ever seen at once
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn answer(request: &Value) -> Value {
    let result = match request["method"].as_str().unwrap_or_default() {
        "apiinfo.version" => json!("7.0.5"),
        "user.login" => json!("0424bd59b807674191e7d77572075f33"),
        "user.logout" => json!(true),
        "hostgroup.get" => {
            let wanted = &request["params"]["filter"]["name"];
            if wanted == &json!(["Linux servers"]) {
                json!([{"groupid": "2", "name": "Linux servers"}])
            } else {
                json!([])
            }
        }
        "host.get" => json!([{"hostid": "10084", "host": "web-01", "name": "Web 01"}]),
        "event.get" => json!([
            {
                "eventid": "501",
                "clock": "1732680000",
                "name": "",
                "objectid": "13491",
                "hosts": [{"hostid": "10084", "host": "web-01", "name": "Web 01"}]
            },
            {
                "eventid": "500",
                "clock": "1732679900",
                "name": "Disk space low",
                "objectid": "13492",
                "hosts": [{"hostid": "10085", "host": "db-01", "name": "DB 01"}]
            },
            {
                "eventid": "499",
                "clock": 1732679800,
                "name": "Orphan event",
                "objectid": "0",
                "hosts": []
            }
        ]),
        "trigger.get" => json!([
            {"triggerid": "13491", "priority": "4", "description": "High CPU on web-01"},
            {"triggerid": "13492", "priority": "5", "description": "Free disk space below 5%"}
        ]),
        other => {
            return json!({
                "jsonrpc": "2.0",
                "error": {"code": -32601, "message": "Method not found.", "data": other},
                "id": 1
            })
        }
    };
    json!({"jsonrpc": "2.0", "result": result, "id": 1})
}

async fn handle(
    req: Request<Incoming>,
    behavior: Behavior,
    journal: Journal,
    in_flight: Arc<InFlight>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let body = req.into_body().collect().await.unwrap().to_bytes();
    let request: Value = serde_json::from_slice(&body).unwrap();
    journal.lock().await.push(request.clone());

    let (status, reply) = match behavior {
        Behavior::Normal => (StatusCode::OK, answer(&request)),
        Behavior::Delayed(delay) => {
            in_flight.enter();
            tokio::time::sleep(delay).await;
            in_flight.leave();
            (StatusCode::OK, answer(&request))
        }
        Behavior::RpcError => (
            StatusCode::OK,
            json!({
                "jsonrpc": "2.0",
                "error": {"code": -32602, "message": "Invalid params.", "data": "No permissions to referred object."},
                "id": 1
            }),
        ),
        Behavior::ServerError => (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
    };

    let response = Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(reply.to_string())))
        .unwrap();
    Ok(response)
}

/// Start a mock frontend on a random port and return its base URL.
async fn start_mock_frontend(behavior: Behavior) -> (String, Journal) {
    let (url, journal, _) = start_tracked_frontend(behavior).await;
    (url, journal)
}

/// Like [`start_mock_frontend`], also reporting request concurrency.
async fn start_tracked_frontend(behavior: Behavior) -> (String, Journal, Arc<InFlight>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let in_flight = Arc::new(InFlight::default());

    let server_journal = journal.clone();
    let server_in_flight = in_flight.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let journal = server_journal.clone();
            let in_flight = server_in_flight.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    handle(req, behavior, journal.clone(), in_flight.clone())
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (
        format!("http://127.0.0.1:{}/zabbix/", addr.port()),
        journal,
        in_flight,
    )
}

fn methods(journal: &[Value]) -> Vec<String> {
    journal
        .iter()
        .map(|r| r["method"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_login_query_logout_cycle() {
    let (url, journal) = start_mock_frontend(Behavior::Normal).await;
    let client =
        ZabbixClient::new(ClientConfig::new(url).with_credentials("Admin", "zabbix")).unwrap();
    let query = AlertQuery::new().with_sort(SortKey::Severity).with_limit(10);

    let resp = with_session(&client, |c| query_alerts(c, &query))
        .await
        .unwrap();

    assert_eq!(resp.total(), 3);
    let items = resp.items();
    assert_eq!(items[0].id, "500");
    assert_eq!(items[0].severity, 5);
    // Empty event name falls back to the trigger description.
    assert_eq!(items[1].name, "High CPU on web-01");
    assert_eq!(items[1].host, "web-01");
    // No matching trigger: severity stays 0, no host.
    assert_eq!(items[2].severity, 0);
    assert_eq!(items[2].host, "");

    let journal = journal.lock().await;
    assert_eq!(
        methods(&journal),
        vec!["user.login", "event.get", "trigger.get", "user.logout"]
    );

    let login = &journal[0];
    assert_eq!(login["jsonrpc"], "2.0");
    assert_eq!(login["auth"], Value::Null);
    assert_eq!(login["params"]["username"], "Admin");

    let events = &journal[1];
    assert_eq!(events["auth"], "0424bd59b807674191e7d77572075f33");
    assert_eq!(events["params"]["sortorder"], "DESC");
    assert_eq!(events["params"]["limit"], 10);

    let triggers = &journal[2];
    assert_eq!(triggers["params"]["triggerids"], json!(["13491", "13492", "0"]));
}

#[tokio::test]
async fn test_group_and_host_names_resolved() {
    let (url, journal) = start_mock_frontend(Behavior::Normal).await;
    let client = ZabbixClient::new(ClientConfig::new(url).with_token("preshared")).unwrap();

    let filter = EventFilter {
        time_from: Some(1_732_600_000),
        time_till: Some(1_732_690_000),
        group_names: Some(vec!["Linux servers".into()]),
        host_names: Some(vec!["web-01".into()]),
        ..Default::default()
    };
    client.get_events(&filter).await.unwrap();

    let journal = journal.lock().await;
    assert_eq!(
        methods(&journal),
        vec!["hostgroup.get", "host.get", "event.get", "trigger.get"]
    );
    let params = &journal[2]["params"];
    assert_eq!(params["groupids"], json!(["2"]));
    assert_eq!(params["hostids"], json!(["10084"]));
    assert_eq!(params["time_from"], 1_732_600_000);
    assert_eq!(params["time_till"], 1_732_690_000);
    assert_eq!(journal[2]["auth"], "preshared");
}

#[tokio::test]
async fn test_unknown_group_short_circuits() {
    let (url, journal) = start_mock_frontend(Behavior::Normal).await;
    let client = ZabbixClient::new(ClientConfig::new(url).with_token("preshared")).unwrap();

    let filter = EventFilter {
        group_names: Some(vec!["Nonexistent".into()]),
        ..Default::default()
    };
    let events = client.get_events(&filter).await.unwrap();

    assert!(events.is_empty());
    assert_eq!(methods(&journal.lock().await), vec!["hostgroup.get"]);
}

#[tokio::test]
async fn test_preshared_token_never_logs_out() {
    let (url, journal) = start_mock_frontend(Behavior::Normal).await;
    let client = ZabbixClient::new(ClientConfig::new(url).with_token("preshared")).unwrap();

    let version = with_session(&client, |c| c.api_version()).await.unwrap();

    assert_eq!(version, "7.0.5");
    let journal = journal.lock().await;
    assert_eq!(methods(&journal), vec!["apiinfo.version"]);
    assert_eq!(journal[0]["auth"], Value::Null);
}

#[tokio::test]
async fn test_rpc_error_carries_upstream_message() {
    let (url, _journal) = start_mock_frontend(Behavior::RpcError).await;
    let client = ZabbixClient::new(ClientConfig::new(url).with_token("preshared")).unwrap();

    let err = client
        .get_events(&EventFilter::default())
        .await
        .unwrap_err();

    match err {
        Error::UpstreamApi(message) => {
            assert_eq!(message, "Invalid params.: No permissions to referred object.");
        }
        other => panic!("expected UpstreamApi, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_login_is_auth_error() {
    let (url, journal) = start_mock_frontend(Behavior::RpcError).await;
    let client =
        ZabbixClient::new(ClientConfig::new(url).with_credentials("Admin", "wrong")).unwrap();

    let err = with_session(&client, |c| c.api_version()).await.unwrap_err();

    assert!(matches!(err, Error::UpstreamAuth(_)));
    // No session was established, so nothing to release.
    assert_eq!(methods(&journal.lock().await), vec!["user.login"]);
}

#[tokio::test]
async fn test_http_status_surfaces() {
    let (url, _journal) = start_mock_frontend(Behavior::ServerError).await;
    let client = ZabbixClient::new(ClientConfig::new(url).with_token("preshared")).unwrap();

    let err = client.api_version().await.unwrap_err();
    assert_eq!(err.to_string(), "Zabbix API error: HTTP 500");
}

#[tokio::test]
async fn test_unreachable_backend_times_out_or_fails() {
    // Bind and drop to find a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = ZabbixClient::new(
        ClientConfig::new(format!("http://127.0.0.1:{port}"))
            .with_token("preshared")
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap();

    let err = client.api_version().await.unwrap_err();
    assert!(err.is_upstream());
}

#[tokio::test]
async fn test_calls_beyond_max_concurrency_wait_for_a_slot() {
    let delay = Duration::from_millis(200);
    let (url, journal, in_flight) = start_tracked_frontend(Behavior::Delayed(delay)).await;
    let client = Arc::new(
        ZabbixClient::new(
            ClientConfig::new(url)
                .with_token("preshared")
                .with_max_concurrency(2),
        )
        .unwrap(),
    );

    let start = Instant::now();
    let mut calls = JoinSet::new();
    for _ in 0..6 {
        let client = client.clone();
        calls.spawn(async move { client.api_version().await });
    }
    while let Some(joined) = calls.join_next().await {
        assert_eq!(joined.unwrap().unwrap(), "7.0.5");
    }

    // Six calls through two slots take at least three rounds.
    assert!(start.elapsed() >= delay * 3);
    assert_eq!(in_flight.peak(), 2);
    assert_eq!(journal.lock().await.len(), 6);
}

#[tokio::test]
async fn test_slow_backend_times_out_as_api_error() {
    let (url, _journal) = start_mock_frontend(Behavior::Delayed(Duration::from_secs(5))).await;
    let client = ZabbixClient::new(
        ClientConfig::new(url)
            .with_token("preshared")
            .with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let start = Instant::now();
    let err = client.api_version().await.unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(5));
    match err {
        Error::UpstreamApi(message) => {
            assert_eq!(message, "apiinfo.version timed out after 0.2s");
        }
        other => panic!("expected UpstreamApi, got {other:?}"),
    }
}
