//! Upstream adapters for the Zabbix JSON-RPC API.
//!
//! [`AlertSource`] is the capability set the alert pipeline depends on.
//! [`ZabbixClient`] talks to a live frontend; [`FixtureClient`] serves a fixed
//! sample set without touching the network.

pub mod client;
pub mod config;
pub mod fixture;
pub mod models;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AlertQuery, DEFAULT_LIMIT};

pub use client::ZabbixClient;
pub use config::ClientConfig;
pub use fixture::FixtureClient;
pub use models::RawEvent;

/// Filters passed to [`AlertSource::get_events`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub time_from: Option<i64>,
    pub time_till: Option<i64>,
    pub severities: Option<Vec<i32>>,
    pub group_names: Option<Vec<String>>,
    pub host_names: Option<Vec<String>>,
    pub limit: i64,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            time_from: None,
            time_till: None,
            severities: None,
            group_names: None,
            host_names: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl EventFilter {
    /// Upstream filter for a structured query
    pub fn from_query(query: &AlertQuery) -> Self {
        Self {
            time_from: query.time_range.map(|r| r.start_ts),
            time_till: query.time_range.map(|r| r.end_ts),
            severities: query.severities.clone(),
            group_names: query.host_groups.clone(),
            host_names: query.hosts.clone(),
            limit: query.limit,
        }
    }

    pub(crate) fn severity_filter(&self) -> Option<&[i32]> {
        self.severities.as_deref().filter(|s| !s.is_empty())
    }

    pub(crate) fn group_filter(&self) -> Option<&[String]> {
        self.group_names.as_deref().filter(|g| !g.is_empty())
    }

    pub(crate) fn host_filter(&self) -> Option<&[String]> {
        self.host_names.as_deref().filter(|h| !h.is_empty())
    }
}

/// Capabilities the alert pipeline needs from an upstream backend.
///
/// One instance serves one logical session: `login`, any number of calls,
/// then `logout`. Instances are never shared between concurrent requests.
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Establish a session. No-op when a pre-shared token is configured.
    async fn login(&self) -> Result<()>;

    /// Release the session. Idempotent, and safe without a prior `login`.
    async fn logout(&self) -> Result<()>;

    /// Events matching `filter`, newest first, at most `filter.limit` of them,
    /// each enriched with its trigger's severity and description.
    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<RawEvent>>;

    /// Upstream API version string
    async fn api_version(&self) -> Result<String>;
}

#[async_trait]
impl<T: AlertSource + ?Sized> AlertSource for Box<T> {
    async fn login(&self) -> Result<()> {
        (**self).login().await
    }

    async fn logout(&self) -> Result<()> {
        (**self).logout().await
    }

    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<RawEvent>> {
        (**self).get_events(filter).await
    }

    async fn api_version(&self) -> Result<String> {
        (**self).api_version().await
    }
}
