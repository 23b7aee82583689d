use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: &'a Value,
    pub id: u32,
    /// Session token; `null` before login and for unauthenticated methods
    pub auth: Option<&'a str>,
}

impl<'a> RpcRequest<'a> {
    pub fn new(method: &'a str, params: &'a Value, auth: Option<&'a str>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
            auth,
        }
    }
}

/// JSON-RPC response envelope; exactly one of `result` / `error` is set by the server
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcError {
    /// `"<message>: <data>"`, the form surfaced to callers
    pub fn describe(&self) -> String {
        match &self.data {
            Some(Value::String(data)) => format!("{}: {}", self.message, data),
            Some(Value::Null) | None => self.message.clone(),
            Some(other) => format!("{}: {}", self.message, other),
        }
    }
}

/// Host group as returned by `hostgroup.get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostGroup {
    #[serde(deserialize_with = "id_string")]
    pub groupid: String,
    #[serde(default)]
    pub name: String,
}

/// Network interface of a host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostInterface {
    #[serde(default)]
    pub ip: Option<String>,
}

/// Host as returned by `host.get` or embedded in events via `selectHosts`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Host {
    #[serde(default, deserialize_with = "id_string")]
    pub hostid: String,
    /// Technical host name
    #[serde(default)]
    pub host: String,
    /// Visible name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub interfaces: Vec<HostInterface>,
}

impl Host {
    /// First interface address, if the upstream reported one
    pub fn first_ip(&self) -> Option<&str> {
        self.interfaces.first().and_then(|iface| iface.ip.as_deref())
    }
}

/// Trigger metadata used to enrich events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(deserialize_with = "id_string")]
    pub triggerid: String,
    #[serde(default, deserialize_with = "lenient_int")]
    pub priority: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Upstream event plus correlated trigger severity and description.
///
/// Produced and consumed within a single query execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(deserialize_with = "id_string")]
    pub eventid: String,
    /// Unix seconds
    #[serde(default, deserialize_with = "lenient_int")]
    pub clock: i64,
    #[serde(default)]
    pub name: Option<String>,
    /// Id of the trigger that generated the event
    #[serde(default, deserialize_with = "optional_id_string")]
    pub objectid: Option<String>,
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub severity: i64,
    #[serde(default)]
    pub trigger_description: Option<String>,
}

impl RawEvent {
    /// Merge trigger priority and description onto the event
    pub fn apply_trigger(&mut self, trigger: &Trigger) {
        self.severity = trigger.priority;
        self.trigger_description.clone_from(&trigger.description);
    }
}

// Zabbix encodes ids and integers as JSON strings; fixtures and some proxies
// use plain numbers. Accept both.

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!("expected id, got {other}"))),
    }
}

fn optional_id_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Null => Ok(None),
        other => Err(de::Error::custom(format!("expected id, got {other}"))),
    }
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom(format!("expected integer, got {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected integer, got {s:?}"))),
        Value::Null => Ok(0),
        other => Err(de::Error::custom(format!("expected integer, got {other}"))),
    }
}
