//! The worker pool.

use super::runner::JobRunner;
use super::watchdog::StallWatchdog;
use crate::config::QueueConfig;
use crate::provider::AnalysisProvider;
use crate::retry::RetryCoordinator;
use crate::scheduler::Scheduler;
use crate::store::JobStore;
use crate::telemetry::SharedTelemetry;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A fixed set of workers, each running an independent
/// poll-execute-report loop against the job store.
///
/// Workers never talk to each other; the store's atomic claim is the only
/// coordination. A shared semaphore caps concurrent provider calls below
/// the external provider's rate allowance even when the pool is larger.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the pool plus its stall watchdog.
    ///
    /// Workers run until `shutdown` is cancelled; in-flight jobs finish
    /// before a worker exits.
    pub fn spawn<S, P>(
        config: &QueueConfig,
        store: Arc<S>,
        provider: Arc<P>,
        telemetry: SharedTelemetry,
        shutdown: CancellationToken,
    ) -> Self
    where
        S: JobStore,
        P: AnalysisProvider,
    {
        let scheduler = Scheduler::new(Arc::clone(&store));
        let retry = RetryCoordinator::new(
            Arc::clone(&store),
            config.retry_backoff_base,
            Arc::clone(&telemetry),
        );
        let runner = JobRunner::new(
            Arc::clone(&store),
            provider,
            retry,
            config.job_timeout,
            telemetry,
        );

        let provider_permits = Arc::new(Semaphore::new(config.provider_concurrency));

        let mut handles = Vec::with_capacity(config.worker_count + 1);
        for worker_index in 0..config.worker_count {
            let worker = Worker {
                index: worker_index,
                scheduler: scheduler.clone(),
                runner: runner.clone(),
                provider_permits: Arc::clone(&provider_permits),
                poll_interval: config.poll_interval,
            };
            handles.push(tokio::spawn(worker.run(shutdown.clone())));
        }

        let watchdog = StallWatchdog::new(store, config.job_timeout);
        handles.push(tokio::spawn(watchdog.run(shutdown.clone())));

        info!(
            workers = config.worker_count,
            provider_concurrency = config.provider_concurrency,
            "Worker pool started"
        );

        Self { handles }
    }

    /// Waits for every worker (and the watchdog) to exit.
    ///
    /// Call after cancelling the shutdown token.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// One poll-execute-report loop.
struct Worker<S, P> {
    index: usize,
    scheduler: Scheduler<S>,
    runner: JobRunner<S, P>,
    provider_permits: Arc<Semaphore>,
    poll_interval: std::time::Duration,
}

impl<S: JobStore, P: AnalysisProvider> Worker<S, P> {
    async fn run(self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            // Hold a provider permit before claiming, so a claimed job never
            // sits in processing waiting for provider capacity. A closed
            // semaphore can only mean shutdown.
            let Ok(permit) = self.provider_permits.acquire().await else {
                break;
            };

            match self.scheduler.dequeue(Utc::now()).await {
                Ok(Some(job)) => {
                    if let Err(e) = self.runner.run(job).await {
                        warn!(worker = self.index, error = %e, "Failed to report job outcome");
                    }
                    drop(permit);
                }
                Ok(None) => {
                    // Idle: nothing eligible right now.
                    drop(permit);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    warn!(worker = self.index, error = %e, "Dequeue failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{SingleRequest, SubmissionGateway, SubmitOptions};
    use crate::geo::BoundingBox;
    use crate::job::{AnalysisPayload, JobStatus};
    use crate::provider::AnalysisError;
    use crate::store::MemoryJobStore;
    use crate::telemetry::NullTelemetrySink;
    use chrono::NaiveDate;
    use std::time::Duration;

    struct OkProvider;

    impl AnalysisProvider for OkProvider {
        async fn analyze(
            &self,
            _payload: &AnalysisPayload,
        ) -> Result<serde_json::Value, AnalysisError> {
            Ok(serde_json::json!({"status": "ok"}))
        }

        fn name(&self) -> &str {
            "ok"
        }
    }

    fn fast_config(workers: usize) -> QueueConfig {
        QueueConfig {
            worker_count: workers,
            poll_interval: Duration::from_millis(10),
            job_timeout: Duration::from_secs(5),
            retry_backoff_base: Duration::ZERO,
            ..Default::default()
        }
    }

    fn request(field_id: &str) -> SingleRequest {
        SingleRequest {
            user_id: "user-1".to_string(),
            field_id: field_id.to_string(),
            bounding_box: BoundingBox::new(47.0, 48.0, 8.0, 9.0).unwrap(),
            target_date: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            options: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_pool_drains_queue() {
        let store = Arc::new(MemoryJobStore::new());
        let telemetry: SharedTelemetry = Arc::new(NullTelemetrySink);
        let gateway = SubmissionGateway::new(Arc::clone(&store), Arc::clone(&telemetry));

        for i in 0..10 {
            gateway
                .submit(
                    request(&format!("field-{i}")),
                    SubmitOptions::default(),
                    Utc::now(),
                )
                .await
                .unwrap();
        }

        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(
            &fast_config(4),
            Arc::clone(&store),
            Arc::new(OkProvider),
            telemetry,
            shutdown.clone(),
        );

        // Wait for every job to finish, bounded by a timeout.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = store.snapshot().await.unwrap();
                if snapshot.iter().all(|r| r.status == JobStatus::Completed) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("pool should drain the queue");

        shutdown.cancel();
        pool.join().await;
    }

    #[tokio::test]
    async fn test_pool_shuts_down_when_idle() {
        let store = Arc::new(MemoryJobStore::new());
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(
            &fast_config(2),
            store,
            Arc::new(OkProvider),
            Arc::new(NullTelemetrySink),
            shutdown.clone(),
        );

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), pool.join())
            .await
            .expect("pool should shut down promptly");
    }
}
