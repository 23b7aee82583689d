use anyhow::Result;
use chrono::{DateTime, Local};
use serde_json::json;
use tabled::{Table, Tabled};
use zbxgate_common::{AlertItem, AlertResponse};

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "IP")]
    host_ip: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Time")]
    time: String,
}

impl From<&AlertItem> for AlertRow {
    fn from(item: &AlertItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            host: item.host.clone(),
            host_ip: item.host_ip.clone().unwrap_or_else(|| "-".to_string()),
            severity: format!("{} ({})", severity_label(item.severity), item.severity),
            time: format_time(item.timestamp),
        }
    }
}

fn severity_label(severity: i32) -> &'static str {
    match severity {
        0 => "Not classified",
        1 => "Information",
        2 => "Warning",
        3 => "Average",
        4 => "High",
        5 => "Disaster",
        _ => "Unknown",
    }
}

fn format_time(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0).map_or_else(
        || ts.to_string(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

pub fn print_alerts(response: &AlertResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    if response.items().is_empty() {
        println!("No alerts");
        return Ok(());
    }

    println!("{}", render_table(response));
    println!("\nTotal: {} alert(s)", response.total());
    Ok(())
}

fn render_table(response: &AlertResponse) -> String {
    let rows: Vec<AlertRow> = response.items().iter().map(AlertRow::from).collect();
    Table::new(rows).to_string()
}

/// Errors go to stderr in the same `{i18n_key, message}` shape the server uses
pub fn print_error(err: &anyhow::Error) {
    let body = error_body(err);
    eprintln!("{body}");
}

fn error_body(err: &anyhow::Error) -> serde_json::Value {
    let i18n_key = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<zbxgate_common::Error>())
        .map_or("error.internal", zbxgate_common::Error::i18n_key);

    json!({"i18n_key": i18n_key, "message": format!("{err:#}")})
}
