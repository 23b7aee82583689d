use anyhow::Result;
use zbxgate_common::{today_alerts, with_session, AlertResponse, AlertSource};

pub async fn execute(source: &dyn AlertSource, limit: i64) -> Result<AlertResponse> {
    let response = with_session(source, |s| today_alerts(s, limit)).await?;
    Ok(response)
}
