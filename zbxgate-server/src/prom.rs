use std::time::Instant;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const REQUESTS_TOTAL: &str = "zbxgate_requests_total";
pub const REQUEST_LATENCY_SECONDS: &str = "zbxgate_request_latency_seconds";
pub const QUEUE_SIZE: &str = "zbxgate_queue_size";
pub const ACTIVE_CLIENTS: &str = "zbxgate_active_clients";

/// Install the global Prometheus recorder and return the render handle
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Counts a request on creation and records its latency when dropped
pub struct RouteTimer {
    route: &'static str,
    start: Instant,
}

impl RouteTimer {
    pub fn start(route: &'static str) -> Self {
        metrics::counter!(REQUESTS_TOTAL, "route" => route).increment(1);
        Self {
            route,
            start: Instant::now(),
        }
    }
}

impl Drop for RouteTimer {
    fn drop(&mut self) {
        metrics::histogram!(REQUEST_LATENCY_SECONDS, "route" => self.route)
            .record(self.start.elapsed().as_secs_f64());
    }
}

pub fn set_queue_size(size: usize) {
    metrics::gauge!(QUEUE_SIZE).set(size as f64);
}

pub fn set_active_clients(count: usize) {
    metrics::gauge!(ACTIVE_CLIENTS).set(count as f64);
}
