//! Service facade.
//!
//! [`AnalysisQueueService`] wires the store, gateway, worker pool, retry
//! coordinator, and retention sweeper together and exposes the queue's
//! boundary operations. Calling features submit work and poll status;
//! operators read metrics and health, trigger cleanup, and bulk-requeue
//! failed jobs.
//!
//! # Example
//!
//! ```ignore
//! use fieldscan::config::QueueConfig;
//! use fieldscan::service::AnalysisQueueService;
//! use fieldscan::store::MemoryJobStore;
//!
//! let service = AnalysisQueueService::start(
//!     MemoryJobStore::new(),
//!     my_provider,
//!     QueueConfig::default(),
//! );
//!
//! let job = service.submit(request, Default::default()).await?;
//! let status = service.status(job.id).await?;
//! service.shutdown().await;
//! ```

use crate::cleanup::RetentionSweeper;
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::gateway::{
    BatchReceipt, BatchRequest, BatchSummary, SingleRequest, SubmissionGateway, SubmitError,
    SubmitOptions,
};
use crate::health::{self, HealthSnapshot};
use crate::job::{BatchId, JobId, JobRecord};
use crate::metrics::{self, QueueMetrics};
use crate::provider::AnalysisProvider;
use crate::retry::RetryCoordinator;
use crate::store::JobStore;
use crate::telemetry::{NullTelemetrySink, SharedTelemetry};
use crate::worker::WorkerPool;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The assembled analysis queue.
///
/// Owns the worker pool; dropping the service without calling
/// [`shutdown`](Self::shutdown) leaves workers running until the process
/// exits.
pub struct AnalysisQueueService<S> {
    store: Arc<S>,
    gateway: SubmissionGateway<S>,
    retry: RetryCoordinator<S>,
    sweeper: RetentionSweeper<S>,
    config: QueueConfig,
    pool: Option<WorkerPool>,
    shutdown: CancellationToken,
}

impl<S: JobStore> AnalysisQueueService<S> {
    /// Starts the queue with tracing-backed telemetry.
    pub fn start<P: AnalysisProvider>(store: S, provider: P, config: QueueConfig) -> Self {
        Self::start_with_telemetry(
            store,
            provider,
            config,
            Arc::new(crate::telemetry::TracingTelemetrySink),
        )
    }

    /// Starts the queue with no telemetry. Useful in tests.
    pub fn start_detached<P: AnalysisProvider>(store: S, provider: P, config: QueueConfig) -> Self {
        Self::start_with_telemetry(store, provider, config, Arc::new(NullTelemetrySink))
    }

    /// Starts the queue with the given telemetry sink.
    pub fn start_with_telemetry<P: AnalysisProvider>(
        store: S,
        provider: P,
        config: QueueConfig,
        telemetry: SharedTelemetry,
    ) -> Self {
        let store = Arc::new(store);
        let provider = Arc::new(provider);
        let shutdown = CancellationToken::new();

        let gateway = SubmissionGateway::new(Arc::clone(&store), Arc::clone(&telemetry));
        let retry = RetryCoordinator::new(
            Arc::clone(&store),
            config.retry_backoff_base,
            Arc::clone(&telemetry),
        );
        let sweeper = RetentionSweeper::new(Arc::clone(&store), Arc::clone(&telemetry));
        let pool = WorkerPool::spawn(
            &config,
            Arc::clone(&store),
            provider,
            telemetry,
            shutdown.clone(),
        );

        Self {
            store,
            gateway,
            retry,
            sweeper,
            config,
            pool: Some(pool),
            shutdown,
        }
    }

    /// Returns a handle to the underlying job store.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Submits a single-field analysis; returns the queued job immediately.
    pub async fn submit(
        &self,
        request: SingleRequest,
        options: SubmitOptions,
    ) -> Result<JobRecord, QueueError> {
        self.gateway
            .submit(request, options, Utc::now())
            .await
            .map_err(submit_error)
    }

    /// Submits a batch; returns the receipt once every child is queued.
    pub async fn submit_batch(
        &self,
        request: BatchRequest,
        options: SubmitOptions,
    ) -> Result<BatchReceipt, QueueError> {
        self.gateway
            .submit_batch(request, options, Utc::now())
            .await
            .map_err(submit_error)
    }

    /// Fetches a job's current state.
    pub async fn status(&self, id: JobId) -> Result<JobRecord, QueueError> {
        self.store
            .get(id)
            .await?
            .ok_or(QueueError::JobNotFound(id))
    }

    /// Aggregates a batch's child outcomes.
    pub async fn batch_summary(&self, batch_id: BatchId) -> Result<BatchSummary, QueueError> {
        let records = self.store.jobs_in_batch(batch_id).await?;
        if records.is_empty() {
            return Err(QueueError::BatchNotFound);
        }
        Ok(BatchSummary::from_records(batch_id, &records))
    }

    /// Computes aggregate queue metrics from current store contents.
    pub async fn metrics(&self) -> Result<QueueMetrics, QueueError> {
        let snapshot = self.store.snapshot().await?;
        Ok(metrics::compute(&snapshot, &self.config.metrics))
    }

    /// Computes the current health classification.
    pub async fn health(&self) -> Result<HealthSnapshot, QueueError> {
        let queue_metrics = self.metrics().await?;
        Ok(health::classify(
            &queue_metrics,
            &self.config.health,
            self.config.worker_count,
            Utc::now(),
        ))
    }

    /// Removes terminal jobs older than `retention_days`.
    pub async fn cleanup(&self, retention_days: u32) -> Result<usize, QueueError> {
        self.sweeper.cleanup(retention_days, Utc::now()).await
    }

    /// Bulk-requeues every terminally failed job with fresh attempts.
    pub async fn retry_failed_jobs(&self) -> Result<usize, QueueError> {
        Ok(self.retry.retry_failed_jobs().await?)
    }

    /// Stops the workers and waits for in-flight jobs to finish.
    pub async fn shutdown(mut self) {
        info!("Shutting down analysis queue");
        self.shutdown.cancel();
        if let Some(pool) = self.pool.take() {
            pool.join().await;
        }
    }
}

fn submit_error(err: SubmitError) -> QueueError {
    match err {
        SubmitError::Validation(e) => QueueError::Validation(e),
        SubmitError::Store(e) => QueueError::Store(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;
    use crate::job::{AnalysisPayload, JobStatus};
    use crate::provider::AnalysisError;
    use crate::store::MemoryJobStore;
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

    fn fast_config() -> QueueConfig {
        QueueConfig {
            worker_count: 2,
            poll_interval: Duration::from_millis(10),
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
    async fn test_submit_and_wait_for_completion() {
        let service = AnalysisQueueService::start_detached(
            MemoryJobStore::new(),
            OkProvider,
            fast_config(),
        );

        let job = service
            .submit(request("field-1"), SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if service.status(job.id).await.unwrap().is_terminal() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("job should complete");

        let done = service.status(job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_status_unknown_job_is_not_found() {
        let service = AnalysisQueueService::start_detached(
            MemoryJobStore::new(),
            OkProvider,
            fast_config(),
        );

        let result = service.status(JobId::new()).await;
        assert!(matches!(result, Err(QueueError::JobNotFound(_))));

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_batch_summary_unknown_batch() {
        let service = AnalysisQueueService::start_detached(
            MemoryJobStore::new(),
            OkProvider,
            fast_config(),
        );

        let result = service.batch_summary(BatchId::new()).await;
        assert!(matches!(result, Err(QueueError::BatchNotFound)));

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_metrics_and_health_on_empty_queue() {
        let service = AnalysisQueueService::start_detached(
            MemoryJobStore::new(),
            OkProvider,
            fast_config(),
        );

        let metrics = service.metrics().await.unwrap();
        assert_eq!(metrics.total_jobs, 0);

        let health = service.health().await.unwrap();
        assert_eq!(health.processing_capacity, 2);

        service.shutdown().await;
    }
}
