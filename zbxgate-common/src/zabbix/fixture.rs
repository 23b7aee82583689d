use async_trait::async_trait;

use super::models::{Host, HostInterface, RawEvent};
use super::{AlertSource, EventFilter};
use crate::error::Result;

/// Clock of the newest sample when the filter has no upper bound
pub const FIXTURE_ANCHOR_TS: i64 = 1_732_680_000;

/// Version string reported by the fixture
pub const FIXTURE_API_VERSION: &str = "fixture";

/// Deterministic offline source backed by three sample events.
///
/// Severity, host-name and time-window filters are applied locally. Host
/// group filters are ignored: the samples carry no group membership.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureClient;

impl FixtureClient {
    pub fn new() -> Self {
        Self
    }

    /// The sample set, newest first, anchored at `anchor`
    pub fn samples(anchor: i64) -> Vec<RawEvent> {
        vec![
            sample(10001, anchor, "CPU usage high", 20001, "web-01", "10.0.0.11", 4, "High CPU on web-01"),
            sample(10002, anchor - 120, "Disk space low", 20002, "db-01", "10.0.0.21", 5, "Critical disk usage on db-01"),
            sample(10003, anchor - 360, "Service timeout", 20003, "api-01", "10.0.0.31", 3, "Service timeout detected"),
        ]
    }
}

fn sample(
    eventid: u64,
    clock: i64,
    name: &str,
    objectid: u64,
    host: &str,
    ip: &str,
    severity: i64,
    description: &str,
) -> RawEvent {
    RawEvent {
        eventid: eventid.to_string(),
        clock,
        name: Some(name.to_string()),
        objectid: Some(objectid.to_string()),
        hosts: vec![Host {
            hostid: String::new(),
            host: host.to_string(),
            name: host.to_string(),
            interfaces: vec![HostInterface {
                ip: Some(ip.to_string()),
            }],
        }],
        severity,
        trigger_description: Some(description.to_string()),
    }
}

#[async_trait]
impl AlertSource for FixtureClient {
    async fn login(&self) -> Result<()> {
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }

    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<RawEvent>> {
        let anchor = filter.time_till.unwrap_or(FIXTURE_ANCHOR_TS);
        let limit = usize::try_from(filter.limit).unwrap_or(0);

        let events = Self::samples(anchor)
            .into_iter()
            .filter(|e| filter.time_from.map_or(true, |from| e.clock >= from))
            .filter(|e| {
                filter
                    .severity_filter()
                    .map_or(true, |allowed| allowed.iter().any(|&s| i64::from(s) == e.severity))
            })
            .filter(|e| {
                filter
                    .host_filter()
                    .map_or(true, |names| e.hosts.iter().any(|h| names.contains(&h.host)))
            })
            .take(limit)
            .collect();

        Ok(events)
    }

    async fn api_version(&self) -> Result<String> {
        Ok(FIXTURE_API_VERSION.to_string())
    }
}
