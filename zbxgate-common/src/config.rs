//! Gateway settings read from the process environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::zabbix::{AlertSource, ClientConfig, FixtureClient, ZabbixClient};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Gateway-wide configuration.
///
/// | Variable | Default |
/// |---|---|
/// | `ZABBIX_URL` | required unless `MOCK_MODE` |
/// | `ZABBIX_USERNAME` / `ZABBIX_PASSWORD` / `ZABBIX_TOKEN` | unset |
/// | `REQUEST_TIMEOUT_SECONDS` | 30 |
/// | `MAX_CONCURRENCY` | 8 |
/// | `MOCK_MODE` | false |
/// | `VERIFY_SSL` | true |
/// | `READ_ONLY` | true |
/// | `MAX_RESULTS_LIMIT` | 100 |
/// | `ZBXGATE_AUTH_TOKEN_ADMIN` / `ZBXGATE_AUTH_TOKEN_READ` | unset |
/// | `ZBXGATE_LISTEN_ADDR` | `0.0.0.0:8080` |
/// | `ZBXGATE_QUEUE_WORKERS` | 4 |
#[derive(Clone)]
pub struct GatewayConfig {
    pub zabbix_url: Option<String>,
    pub zabbix_username: Option<String>,
    pub zabbix_password: Option<String>,
    pub zabbix_token: Option<String>,
    pub request_timeout: Duration,
    pub max_concurrency: usize,
    pub mock_mode: bool,
    pub verify_ssl: bool,
    pub read_only: bool,
    pub max_results_limit: i64,
    pub admin_token: Option<String>,
    pub read_token: Option<String>,
    pub listen_addr: String,
    pub queue_workers: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            zabbix_url: None,
            zabbix_username: None,
            zabbix_password: None,
            zabbix_token: None,
            request_timeout: Duration::from_secs(30),
            max_concurrency: 8,
            mock_mode: false,
            verify_ssl: true,
            read_only: true,
            max_results_limit: 100,
            admin_token: None,
            read_token: None,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            queue_workers: 4,
        }
    }
}

impl GatewayConfig {
    /// Read the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, treating blank values as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            zabbix_url: get("ZABBIX_URL"),
            zabbix_username: get("ZABBIX_USERNAME"),
            zabbix_password: get("ZABBIX_PASSWORD"),
            zabbix_token: get("ZABBIX_TOKEN"),
            request_timeout: match get("REQUEST_TIMEOUT_SECONDS") {
                Some(v) => Duration::from_secs(parse_number("REQUEST_TIMEOUT_SECONDS", &v)?),
                None => defaults.request_timeout,
            },
            max_concurrency: get("MAX_CONCURRENCY")
                .map(|v| parse_number("MAX_CONCURRENCY", &v))
                .transpose()?
                .unwrap_or(defaults.max_concurrency),
            mock_mode: get("MOCK_MODE")
                .map(|v| parse_bool("MOCK_MODE", &v))
                .transpose()?
                .unwrap_or(defaults.mock_mode),
            verify_ssl: get("VERIFY_SSL")
                .map(|v| parse_bool("VERIFY_SSL", &v))
                .transpose()?
                .unwrap_or(defaults.verify_ssl),
            read_only: get("READ_ONLY")
                .map(|v| parse_bool("READ_ONLY", &v))
                .transpose()?
                .unwrap_or(defaults.read_only),
            max_results_limit: get("MAX_RESULTS_LIMIT")
                .map(|v| parse_number("MAX_RESULTS_LIMIT", &v))
                .transpose()?
                .unwrap_or(defaults.max_results_limit),
            admin_token: get("ZBXGATE_AUTH_TOKEN_ADMIN"),
            read_token: get("ZBXGATE_AUTH_TOKEN_READ"),
            listen_addr: get("ZBXGATE_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            queue_workers: get("ZBXGATE_QUEUE_WORKERS")
                .map(|v| parse_number("ZBXGATE_QUEUE_WORKERS", &v))
                .transpose()?
                .unwrap_or(defaults.queue_workers),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.mock_mode && self.zabbix_url.is_none() {
            return Err(Error::Config(
                "ZABBIX_URL is required unless MOCK_MODE is enabled".to_string(),
            ));
        }
        if self.max_results_limit < 1 {
            return Err(Error::Config(
                "MAX_RESULTS_LIMIT must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Adapter settings for the live client
    pub fn client_config(&self) -> Result<ClientConfig> {
        let url = self
            .zabbix_url
            .as_deref()
            .ok_or_else(|| Error::Config("ZABBIX_URL is not set".to_string()))?;

        let mut config = ClientConfig::new(url)
            .with_timeout(self.request_timeout)
            .with_max_concurrency(self.max_concurrency)
            .with_tls_verification(self.verify_ssl);

        if let (Some(user), Some(pass)) = (&self.zabbix_username, &self.zabbix_password) {
            config = config.with_credentials(user, pass);
        }
        if let Some(token) = &self.zabbix_token {
            config = config.with_token(token);
        }

        Ok(config)
    }

    /// A fresh upstream adapter: the fixture in mock mode, the live client otherwise
    pub fn build_source(&self) -> Result<Box<dyn AlertSource>> {
        if self.mock_mode {
            return Ok(Box::new(FixtureClient::new()));
        }
        Ok(Box::new(ZabbixClient::new(self.client_config()?)?))
    }

    /// Clamp a caller-supplied limit into `[1, max_results_limit]`
    pub fn clamp_limit(&self, requested: i64) -> i64 {
        requested.clamp(1, self.max_results_limit.max(1))
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("GatewayConfig")
            .field("zabbix_url", &self.zabbix_url)
            .field("zabbix_username", &self.zabbix_username)
            .field("zabbix_password", &redact(&self.zabbix_password))
            .field("zabbix_token", &redact(&self.zabbix_token))
            .field("request_timeout", &self.request_timeout)
            .field("max_concurrency", &self.max_concurrency)
            .field("mock_mode", &self.mock_mode)
            .field("verify_ssl", &self.verify_ssl)
            .field("read_only", &self.read_only)
            .field("max_results_limit", &self.max_results_limit)
            .field("admin_token", &redact(&self.admin_token))
            .field("read_token", &redact(&self.read_token))
            .field("listen_addr", &self.listen_addr)
            .field("queue_workers", &self.queue_workers)
            .finish()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key}: expected a number, got {value:?}")))
}
