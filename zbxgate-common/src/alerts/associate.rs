use crate::error::Result;
use crate::types::{AlertResponse, LogAssociationQuery};
use crate::zabbix::AlertSource;

use super::engine::query_alerts;

/// Alerts whose name contains any of the query's keywords, case-insensitively.
///
/// Returns the matching alerts together with the lower-cased keywords that
/// were applied.
pub async fn associate_logs<S>(
    source: &S,
    query: &LogAssociationQuery,
) -> Result<(AlertResponse, Vec<String>)>
where
    S: AlertSource + ?Sized,
{
    query.validate()?;

    let alerts = query_alerts(source, &query.alert_query()).await?;
    let keywords: Vec<String> = query.keywords.iter().map(|k| k.to_lowercase()).collect();

    let matched = alerts
        .into_items()
        .into_iter()
        .filter(|item| {
            let name = item.name.to_lowercase();
            keywords.iter().any(|k| name.contains(k.as_str()))
        })
        .collect();

    Ok((AlertResponse::new(matched), keywords))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::zabbix::FixtureClient;

    #[tokio::test]
    async fn test_disk_keyword_matches_disk_alert() {
        let query = LogAssociationQuery::new(vec!["disk".into()]);
        let (resp, keywords) = associate_logs(&FixtureClient::new(), &query).await.unwrap();

        assert!(resp.total() >= 1);
        assert!(resp
            .items()
            .iter()
            .all(|i| i.name.to_lowercase().contains("disk")));
        assert_eq!(keywords, vec!["disk".to_string()]);
    }

    #[tokio::test]
    async fn test_unmatched_keyword_yields_empty_response() {
        let query = LogAssociationQuery::new(vec!["zzz-nomatch".into()]);
        let (resp, _) = associate_logs(&FixtureClient::new(), &query).await.unwrap();

        assert_eq!(resp.total(), 0);
        assert!(resp.items().is_empty());
    }

    #[tokio::test]
    async fn test_keywords_are_case_insensitive() {
        let query = LogAssociationQuery::new(vec!["CPU".into(), "Timeout".into()]);
        let (resp, keywords) = associate_logs(&FixtureClient::new(), &query).await.unwrap();

        assert_eq!(keywords, vec!["cpu".to_string(), "timeout".to_string()]);
        let names: Vec<&str> = resp.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["CPU usage high", "Service timeout"]);
    }

    #[tokio::test]
    async fn test_empty_keywords_rejected() {
        let err = associate_logs(&FixtureClient::new(), &LogAssociationQuery::new(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }
}
