use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{AlertItem, AlertQuery, AlertResponse, SortKey, TimeRange};
use crate::zabbix::{AlertSource, EventFilter, RawEvent};

/// Run a structured query against `source` and shape the result.
///
/// The query is validated before any upstream call. Severities are sent
/// upstream and applied again here, so sources that ignore the upstream
/// filter still produce a correct response.
pub async fn query_alerts<S>(source: &S, query: &AlertQuery) -> Result<AlertResponse>
where
    S: AlertSource + ?Sized,
{
    query.validate()?;

    let events = source.get_events(&EventFilter::from_query(query)).await?;
    let mut items: Vec<AlertItem> = events.into_iter().map(normalize_event).collect();

    if let Some(allowed) = query.severity_filter() {
        items.retain(|item| allowed.contains(&item.severity));
    }

    if let Some(key) = query.sort_by {
        sort_items(&mut items, key);
    }

    Ok(AlertResponse::new(items))
}

/// Alerts raised since midnight UTC, unsorted, at most `limit` of them.
pub async fn today_alerts<S>(source: &S, limit: i64) -> Result<AlertResponse>
where
    S: AlertSource + ?Sized,
{
    query_alerts(source, &today_query(limit, Utc::now())).await
}

/// The query behind [`today_alerts`] for a given wall clock
pub fn today_query(limit: i64, now: DateTime<Utc>) -> AlertQuery {
    AlertQuery::new()
        .with_time_range(TimeRange::today(now))
        .with_limit(limit)
}

/// Convert one upstream event into the canonical alert shape
pub fn normalize_event(event: RawEvent) -> AlertItem {
    let RawEvent {
        eventid,
        clock,
        name,
        hosts,
        severity,
        trigger_description,
        ..
    } = event;

    let name = name
        .filter(|n| !n.is_empty())
        .or(trigger_description)
        .unwrap_or_default();

    let (host, host_ip) = match hosts.first() {
        Some(h) => (h.host.clone(), h.first_ip().map(str::to_string)),
        None => (String::new(), None),
    };

    AlertItem {
        id: eventid,
        name,
        host,
        host_ip,
        severity: i32::try_from(severity)
            .unwrap_or(if severity < 0 { i32::MIN } else { i32::MAX }),
        timestamp: clock,
        group: None,
    }
}

/// Stable sort in place. Ties keep their upstream order.
pub fn sort_items(items: &mut [AlertItem], key: SortKey) {
    match key {
        SortKey::Severity => items.sort_by_key(|i| Reverse(i.severity)),
        SortKey::Time => items.sort_by_key(|i| Reverse(i.timestamp)),
        SortKey::Frequency => {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for item in items.iter() {
                *counts.entry(item.name.clone()).or_default() += 1;
            }
            items.sort_by_key(|i| Reverse(counts.get(&i.name).copied().unwrap_or(0)));
        }
    }
}
