pub mod associate;
pub mod nl;
pub mod query;
pub mod today;
pub mod top;

use chrono::Utc;
use clap::Args;
use zbxgate_common::TimeRange;

/// Filters shared by `query` and `associate`
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Window start, unix seconds (default: 0 when only --end-ts is given)
    #[arg(long)]
    pub start_ts: Option<i64>,

    /// Window end, unix seconds (default: now when only --start-ts is given)
    #[arg(long)]
    pub end_ts: Option<i64>,

    /// Host group name (repeatable)
    #[arg(long)]
    pub group: Vec<String>,

    /// Technical host name (repeatable)
    #[arg(long)]
    pub host: Vec<String>,
}

impl FilterArgs {
    pub fn time_range(&self, now_ts: i64) -> Option<TimeRange> {
        if self.start_ts.is_none() && self.end_ts.is_none() {
            return None;
        }
        Some(TimeRange::new(
            self.start_ts.unwrap_or(0),
            self.end_ts.unwrap_or(now_ts),
        ))
    }

    pub fn current_time_range(&self) -> Option<TimeRange> {
        self.time_range(Utc::now().timestamp())
    }

    pub fn groups(&self) -> Option<Vec<String>> {
        non_empty(&self.group)
    }

    pub fn hosts(&self) -> Option<Vec<String>> {
        non_empty(&self.host)
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}
