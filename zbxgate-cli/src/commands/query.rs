use anyhow::Result;
use zbxgate_common::{query_alerts, with_session, AlertQuery, AlertResponse, AlertSource};

use super::FilterArgs;

pub async fn execute(
    source: &dyn AlertSource,
    filters: &FilterArgs,
    severities: Vec<i32>,
    limit: i64,
) -> Result<AlertResponse> {
    let query = AlertQuery {
        time_range: filters.current_time_range(),
        host_groups: filters.groups(),
        hosts: filters.hosts(),
        severities: (!severities.is_empty()).then_some(severities),
        limit,
        sort_by: None,
    };

    let response = with_session(source, |s| query_alerts(s, &query)).await?;
    Ok(response)
}
