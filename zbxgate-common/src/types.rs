use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default result cap when a query does not name one.
pub const DEFAULT_LIMIT: i64 = 100;

/// Lowest severity ("not classified").
pub const SEVERITY_NOT_CLASSIFIED: i32 = 0;
/// Highest severity ("disaster").
pub const SEVERITY_DISASTER: i32 = 5;

const SECONDS_PER_DAY: i64 = 86_400;

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Inclusive unix-second window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ts: i64,
    pub end_ts: i64,
}

impl TimeRange {
    pub fn new(start_ts: i64, end_ts: i64) -> Self {
        Self { start_ts, end_ts }
    }

    /// `[midnight UTC of the day containing now, now]`
    pub fn today(now: DateTime<Utc>) -> Self {
        let now_ts = now.timestamp();
        Self::new(now_ts - now_ts.rem_euclid(SECONDS_PER_DAY), now_ts)
    }

    /// `[now - seconds, now]`
    pub fn last(now: DateTime<Utc>, seconds: i64) -> Self {
        let now_ts = now.timestamp();
        Self::new(now_ts.saturating_sub(seconds), now_ts)
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start_ts <= ts && ts <= self.end_ts
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_ts > self.end_ts {
            return Err(Error::InvalidQuery(format!(
                "time range start {} is after end {}",
                self.start_ts, self.end_ts
            )));
        }
        Ok(())
    }
}

/// Ordering applied to the normalized alert list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Severity,
    Frequency,
    Time,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Severity => "severity",
            SortKey::Frequency => "frequency",
            SortKey::Time => "time",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "severity" => Ok(SortKey::Severity),
            "frequency" => Ok(SortKey::Frequency),
            "time" => Ok(SortKey::Time),
            other => Err(Error::InvalidQuery(format!("unknown sort key: {other}"))),
        }
    }
}

/// Structured alert query.
///
/// Values are never mutated in place; the `with_*` methods consume the query
/// and hand back a refined copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertQuery {
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub host_groups: Option<Vec<String>>,
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
    /// Zabbix trigger priorities, 0-5.
    #[serde(default)]
    pub severities: Option<Vec<i32>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub sort_by: Option<SortKey>,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            time_range: None,
            host_groups: None,
            hosts: None,
            severities: None,
            limit: DEFAULT_LIMIT,
            sort_by: None,
        }
    }
}

impl AlertQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    #[must_use]
    pub fn with_host_groups(mut self, groups: Vec<String>) -> Self {
        self.host_groups = Some(groups);
        self
    }

    #[must_use]
    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    #[must_use]
    pub fn with_severities(mut self, severities: Vec<i32>) -> Self {
        self.severities = Some(severities);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort_by = Some(key);
        self
    }

    /// Reject values the pipeline will not coerce.
    pub fn validate(&self) -> Result<()> {
        validate_limit(self.limit)?;
        if let Some(range) = &self.time_range {
            range.validate()?;
        }
        Ok(())
    }

    /// Non-empty severity filter, if any.
    pub fn severity_filter(&self) -> Option<&[i32]> {
        self.severities.as_deref().filter(|s| !s.is_empty())
    }
}

/// Keyword search over alert names, sharing the alert query's filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogAssociationQuery {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub host_groups: Option<Vec<String>>,
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl LogAssociationQuery {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            time_range: None,
            host_groups: None,
            hosts: None,
            limit: DEFAULT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    #[must_use]
    pub fn with_host_groups(mut self, groups: Vec<String>) -> Self {
        self.host_groups = Some(groups);
        self
    }

    #[must_use]
    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.keywords.is_empty() {
            return Err(Error::InvalidQuery(
                "at least one keyword is required".to_string(),
            ));
        }
        validate_limit(self.limit)?;
        if let Some(range) = &self.time_range {
            range.validate()?;
        }
        Ok(())
    }

    /// The shared filter fields as an unsorted alert query. Keywords are not carried.
    pub fn alert_query(&self) -> AlertQuery {
        AlertQuery {
            time_range: self.time_range,
            host_groups: self.host_groups.clone(),
            hosts: self.hosts.clone(),
            severities: None,
            limit: self.limit,
            sort_by: None,
        }
    }
}

fn validate_limit(limit: i64) -> Result<()> {
    if limit < 1 {
        return Err(Error::InvalidQuery(format!(
            "limit must be a positive integer, got {limit}"
        )));
    }
    Ok(())
}

/// Canonical alert, derived from one upstream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertItem {
    pub id: String,
    pub name: String,
    pub host: String,
    pub host_ip: Option<String>,
    pub severity: i32,
    pub timestamp: i64,
    pub group: Option<String>,
}

/// Filtered, sorted alert list. `total` always equals the number of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertResponse {
    items: Vec<AlertItem>,
    total: usize,
}

impl AlertResponse {
    pub fn new(items: Vec<AlertItem>) -> Self {
        let total = items.len();
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn items(&self) -> &[AlertItem] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn into_items(self) -> Vec<AlertItem> {
        self.items
    }
}
