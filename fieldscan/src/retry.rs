//! Retry coordinator.
//!
//! All retry policy lives here; workers report failures and never retry on
//! their own. Every failure increments the attempt counter. While the
//! counter is below the job's limit the job re-enters the queue after a
//! quadratic backoff; once the limit is reached the job fails terminally
//! with the last error retained.
//!
//! The operator-facing bulk requeue ([`RetryCoordinator::retry_failed_jobs`])
//! is independent of the automatic policy: it resets attempts to 0, giving
//! the jobs a full fresh allowance.

use crate::job::JobId;
use crate::store::{JobStore, StoreError};
use crate::telemetry::{QueueEvent, SharedTelemetry};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

/// What the coordinator decided for a failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The job was requeued for another attempt.
    Requeued {
        /// The attempt count after this failure.
        attempt: u32,
        /// Earliest time the scheduler may hand the job out again.
        retry_at: DateTime<Utc>,
    },

    /// Attempts are exhausted; the job is terminally failed.
    Exhausted,
}

/// Applies retry policy when a job execution fails.
pub struct RetryCoordinator<S> {
    store: Arc<S>,
    backoff_base: Duration,
    telemetry: SharedTelemetry,
}

impl<S> Clone for RetryCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            backoff_base: self.backoff_base,
            telemetry: Arc::clone(&self.telemetry),
        }
    }
}

impl<S: JobStore> RetryCoordinator<S> {
    /// Creates a coordinator with the given backoff base.
    pub fn new(store: Arc<S>, backoff_base: Duration, telemetry: SharedTelemetry) -> Self {
        Self {
            store,
            backoff_base,
            telemetry,
        }
    }

    /// Returns the backoff before the given attempt may run again.
    ///
    /// Quadratic in the attempt count (`base * attempt^2`) so a flapping
    /// external dependency sees rapidly growing gaps instead of a hammering
    /// retry loop.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt.saturating_mul(attempt))
    }

    /// Handles one failed execution of a processing job.
    ///
    /// Increments the attempt counter; requeues with backoff while the
    /// counter stays below `max_attempts`, otherwise fails the job
    /// terminally with `error` retained.
    pub async fn on_failure(
        &self,
        id: JobId,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<FailureDisposition, StoreError> {
        let record = self.store.get(id).await?.ok_or(StoreError::NotFound(id))?;
        let attempt = record.attempts + 1;

        if attempt >= record.max_attempts {
            let failed = self.store.fail(id, error.to_string(), now).await?;
            self.telemetry.emit(QueueEvent::JobFailed {
                job_id: id,
                attempts: failed.attempts,
                error: error.to_string(),
            });
            return Ok(FailureDisposition::Exhausted);
        }

        let delay = self.backoff(attempt);
        let retry_at = ChronoDuration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.store.retry(id, Some(retry_at)).await?;
        self.telemetry.emit(QueueEvent::JobRetryScheduled {
            job_id: id,
            attempt,
            retry_at,
        });
        Ok(FailureDisposition::Requeued { attempt, retry_at })
    }

    /// Operator bulk operation: requeues every terminally failed job with
    /// a fresh attempt allowance. Returns the number requeued.
    pub async fn retry_failed_jobs(&self) -> Result<usize, StoreError> {
        let count = self.store.retry_failed().await?;
        if count > 0 {
            self.telemetry
                .emit(QueueEvent::FailedJobsRequeued { count });
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;
    use crate::job::{AnalysisPayload, JobKind, JobRecord, JobStatus, Priority};
    use crate::store::MemoryJobStore;
    use crate::telemetry::NullTelemetrySink;
    use chrono::NaiveDate;

    fn coordinator(
        backoff_base: Duration,
    ) -> (Arc<MemoryJobStore>, RetryCoordinator<MemoryJobStore>) {
        let store = Arc::new(MemoryJobStore::new());
        let coordinator = RetryCoordinator::new(
            Arc::clone(&store),
            backoff_base,
            Arc::new(NullTelemetrySink),
        );
        (store, coordinator)
    }

    async fn processing_job(store: &MemoryJobStore, max_attempts: u32) -> JobId {
        let record = JobRecord::new(
            JobKind::SingleFieldAnalysis,
            AnalysisPayload {
                field_id: "field-1".to_string(),
                bounding_box: BoundingBox::new(47.0, 48.0, 8.0, 9.0).unwrap(),
                target_date: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
                window: None,
                options: Default::default(),
            },
            Priority::default(),
            max_attempts,
            "user-1",
            Utc::now(),
        );
        let id = record.id;
        store.insert(record).await.unwrap();
        store.claim_next(Utc::now()).await.unwrap().unwrap();
        id
    }

    #[test]
    fn test_backoff_is_quadratic() {
        let (_, coordinator) = coordinator(Duration::from_secs(30));
        assert_eq!(coordinator.backoff(1), Duration::from_secs(30));
        assert_eq!(coordinator.backoff(2), Duration::from_secs(120));
        assert_eq!(coordinator.backoff(3), Duration::from_secs(270));
    }

    #[tokio::test]
    async fn test_first_failure_requeues() {
        let (store, coordinator) = coordinator(Duration::from_secs(10));
        let id = processing_job(&store, 3).await;
        let now = Utc::now();

        let disposition = coordinator.on_failure(id, "transient", now).await.unwrap();
        assert_eq!(
            disposition,
            FailureDisposition::Requeued {
                attempt: 1,
                retry_at: now + ChronoDuration::seconds(10),
            }
        );

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.attempts, 1);
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn test_final_failure_is_terminal() {
        let (store, coordinator) = coordinator(Duration::ZERO);
        let id = processing_job(&store, 3).await;
        let now = Utc::now();

        // Two requeues, then exhaustion on the third failure.
        coordinator.on_failure(id, "err 1", now).await.unwrap();
        store.claim_next(now).await.unwrap().unwrap();
        coordinator.on_failure(id, "err 2", now).await.unwrap();
        store.claim_next(now).await.unwrap().unwrap();
        let disposition = coordinator.on_failure(id, "err 3", now).await.unwrap();

        assert_eq!(disposition, FailureDisposition::Exhausted);

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.attempts, 3);
        assert_eq!(record.error.as_deref(), Some("err 3"));

        // A terminally failed job never re-enters the queue.
        assert!(store.claim_next(now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_attempt_job_fails_immediately() {
        let (store, coordinator) = coordinator(Duration::ZERO);
        let id = processing_job(&store, 1).await;

        let disposition = coordinator
            .on_failure(id, "boom", Utc::now())
            .await
            .unwrap();
        assert_eq!(disposition, FailureDisposition::Exhausted);
        assert_eq!(
            store.get(id).await.unwrap().unwrap().status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_on_failure_unknown_job() {
        let (_, coordinator) = coordinator(Duration::ZERO);
        let result = coordinator
            .on_failure(JobId::new(), "boom", Utc::now())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bulk_retry_resets_attempts() {
        let (store, coordinator) = coordinator(Duration::ZERO);
        let id = processing_job(&store, 1).await;
        coordinator
            .on_failure(id, "boom", Utc::now())
            .await
            .unwrap();

        let count = coordinator.retry_failed_jobs().await.unwrap();
        assert_eq!(count, 1);

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.attempts, 0);
    }
}
