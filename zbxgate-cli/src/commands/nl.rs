use anyhow::Result;
use zbxgate_common::{parse_alert_query, query_alerts, with_session, AlertResponse, AlertSource};

pub async fn execute(source: &dyn AlertSource, text: &str) -> Result<AlertResponse> {
    let query = parse_alert_query(text);
    tracing::debug!(?query, "Parsed natural-language query");

    let response = with_session(source, |s| query_alerts(s, &query)).await?;
    Ok(response)
}
