//! Alert normalization, aggregation and keyword association.

mod associate;
mod engine;

pub use associate::associate_logs;
pub use engine::{normalize_event, query_alerts, sort_items, today_alerts, today_query};
