use anyhow::Result;
use zbxgate_common::{associate_logs, with_session, AlertResponse, AlertSource, LogAssociationQuery};

use super::FilterArgs;

pub async fn execute(
    source: &dyn AlertSource,
    keywords: Vec<String>,
    filters: &FilterArgs,
    limit: i64,
) -> Result<AlertResponse> {
    let query = LogAssociationQuery {
        keywords,
        time_range: filters.current_time_range(),
        host_groups: filters.groups(),
        hosts: filters.hosts(),
        limit,
    };

    let (response, keywords) = with_session(source, |s| associate_logs(s, &query)).await?;
    tracing::debug!(?keywords, matched = response.total(), "Keyword association done");
    Ok(response)
}
