pub mod alerts;
pub mod config;
pub mod error;
pub mod nl;
pub mod session;
pub mod types;
pub mod zabbix;

// Re-export the pipeline entry points and their value types
pub use alerts::{associate_logs, query_alerts, today_alerts};
pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use nl::parse_alert_query;
pub use session::with_session;
pub use types::{AlertItem, AlertQuery, AlertResponse, LogAssociationQuery, SortKey, TimeRange};
pub use zabbix::{AlertSource, ClientConfig, EventFilter, FixtureClient, ZabbixClient};
