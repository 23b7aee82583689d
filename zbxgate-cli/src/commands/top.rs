use anyhow::Result;
use zbxgate_common::{query_alerts, with_session, AlertQuery, AlertResponse, AlertSource, SortKey};

pub async fn execute(source: &dyn AlertSource, by: SortKey, limit: i64) -> Result<AlertResponse> {
    let query = AlertQuery::new().with_sort(by).with_limit(limit);
    let response = with_session(source, |s| query_alerts(s, &query)).await?;
    Ok(response)
}
