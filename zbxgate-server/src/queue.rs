use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};
use uuid::Uuid;
use zbxgate_common::{query_alerts, with_session, AlertQuery, GatewayConfig};

use crate::prom;

/// A unit of background work: `{"type": .., "payload": ..}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug)]
struct QueuedJob {
    id: Uuid,
    job: Job,
}

/// In-memory FIFO served by a fixed pool of workers.
///
/// Delivery is at-most-once: jobs are lost on shutdown or crash, and a failed
/// job is logged and never retried.
pub struct TaskQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    pending: Arc<AtomicUsize>,
}

impl TaskQueue {
    /// Spawn `workers` tasks that feed queued jobs to `handler`
    pub fn start<H, Fut>(workers: usize, handler: H) -> Self
    where
        H: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));
        let pending = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(handler);

        let handles = (0..workers)
            .map(|index| {
                tokio::spawn(worker(index, rx.clone(), pending.clone(), handler.clone()))
            })
            .collect();

        info!("Job queue started with {} workers", workers);

        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            worker_count: workers,
            pending,
        }
    }

    /// Queue a job, returning its id
    pub async fn enqueue(&self, job: Job) -> Result<Uuid> {
        let guard = self.sender.lock().await;
        let sender = guard.as_ref().context("Job queue is stopped")?;

        let id = Uuid::new_v4();
        let size = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if sender.send(QueuedJob { id, job }).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!("Job queue is stopped");
        }
        prom::set_queue_size(size);

        Ok(id)
    }

    /// Jobs queued but not yet picked up by a worker
    pub fn size(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn workers(&self) -> usize {
        self.worker_count
    }

    /// Close the queue and wait for workers to drain what was already queued
    pub async fn stop(&self) {
        self.sender.lock().await.take();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Queue worker panicked: {}", e);
            }
        }
        info!("Job queue stopped");
    }
}

async fn worker<H, Fut>(
    index: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    pending: Arc<AtomicUsize>,
    handler: Arc<H>,
) where
    H: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    loop {
        let next = rx.lock().await.recv().await;
        let Some(QueuedJob { id, job }) = next else {
            break;
        };

        let left = pending.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        prom::set_queue_size(left);

        let span = tracing::info_span!("queue.job", worker = index, job_id = %id, kind = %job.kind);
        if let Err(e) = handler(job).instrument(span).await {
            warn!(job_id = %id, "Job failed: {:#}", e);
        }
    }
}

/// Execute one job against a fresh upstream session
pub async fn run_job(config: &GatewayConfig, job: Job) -> Result<()> {
    match job.kind.as_str() {
        "alerts.query" => {
            let payload = if job.payload.is_null() {
                Value::Object(serde_json::Map::new())
            } else {
                job.payload
            };
            let query: AlertQuery =
                serde_json::from_value(payload).context("Invalid alerts.query payload")?;

            let source = config.build_source()?;
            let resp = with_session(source.as_ref(), |s| query_alerts(s, &query)).await?;
            info!(total = resp.total(), "alerts.query job finished");
        }
        other => warn!(kind = other, "Dropping job of unknown type"),
    }
    Ok(())
}

/// Text pushed to WebSocket clients after a job succeeds
pub fn finished_notice(kind: &str) -> String {
    serde_json::json!({"event": "job.finished", "type": kind}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn job(kind: &str) -> Job {
        Job {
            kind: kind.to_string(),
            payload: Value::Null,
        }
    }

    fn mock_config() -> GatewayConfig {
        GatewayConfig {
            mock_mode: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_jobs_reach_handler_in_order() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let queue = TaskQueue::start(1, move |job: Job| {
            let seen_tx = seen_tx.clone();
            async move {
                seen_tx.send(job.kind)?;
                anyhow::Ok(())
            }
        });

        for kind in ["a", "b", "c"] {
            queue.enqueue(job(kind)).await.unwrap();
        }

        let mut kinds = Vec::new();
        for _ in 0..3 {
            let kind = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
                .await
                .unwrap()
                .unwrap();
            kinds.push(kind);
        }
        assert_eq!(kinds, vec!["a", "b", "c"]);

        queue.stop().await;
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn test_failed_job_does_not_stop_worker() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let queue = TaskQueue::start(2, move |job: Job| {
            let seen_tx = seen_tx.clone();
            async move {
                if job.kind == "boom" {
                    anyhow::bail!("exploded");
                }
                seen_tx.send(job.kind)?;
                anyhow::Ok(())
            }
        });

        queue.enqueue(job("boom")).await.unwrap();
        queue.enqueue(job("after")).await.unwrap();

        let kind = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kind, "after");
        assert_eq!(queue.workers(), 2);
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_fails() {
        let queue = TaskQueue::start(1, |_job: Job| async { anyhow::Ok(()) });
        queue.stop().await;

        assert!(queue.enqueue(job("late")).await.is_err());
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn test_run_alerts_query_job() {
        let query_job = Job {
            kind: "alerts.query".into(),
            payload: serde_json::json!({"severities": [5], "limit": 10}),
        };
        run_job(&mock_config(), query_job).await.unwrap();

        // A missing payload runs the default query.
        run_job(&mock_config(), job("alerts.query")).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_job_rejects_bad_payload() {
        let bad_job = Job {
            kind: "alerts.query".into(),
            payload: serde_json::json!({"limit": "many"}),
        };
        assert!(run_job(&mock_config(), bad_job).await.is_err());
    }

    #[test]
    fn test_finished_notice_shape() {
        let notice: Value = serde_json::from_str(&finished_notice("alerts.query")).unwrap();
        assert_eq!(notice["event"], "job.finished");
        assert_eq!(notice["type"], "alerts.query");
    }

    #[tokio::test]
    async fn test_unknown_job_type_is_dropped() {
        assert!(run_job(&mock_config(), job("reports.build")).await.is_ok());
    }
}
