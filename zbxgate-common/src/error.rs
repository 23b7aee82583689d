use thiserror::Error;

/// Errors surfaced by the alert pipeline.
///
/// Upstream errors propagate unchanged through the engine, the associator and
/// the session helper; the HTTP and CLI layers decide how to present them.
#[derive(Debug, Error)]
pub enum Error {
    /// Session establishment failed (bad credentials, backend unreachable during login).
    #[error("Zabbix authentication failed: {0}")]
    UpstreamAuth(String),

    /// An outbound call returned a non-success status or a JSON-RPC error payload.
    #[error("Zabbix API error: {0}")]
    UpstreamApi(String),

    /// Caller supplied a query the core refuses to run.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Missing or malformed gateway configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Stable key the gateway surfaces for client-side translation.
    pub fn i18n_key(&self) -> &'static str {
        match self {
            Error::UpstreamAuth(_) | Error::UpstreamApi(_) => "error.zabbix_api",
            Error::InvalidQuery(_) => "error.invalid_query",
            Error::Config(_) => "error.config_missing",
        }
    }

    /// True when the failure originated at the upstream backend.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::UpstreamAuth(_) | Error::UpstreamApi(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
