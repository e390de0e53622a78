//! Single-job execution.

use crate::job::JobRecord;
use crate::provider::AnalysisProvider;
use crate::retry::{FailureDisposition, RetryCoordinator};
use crate::store::{JobStore, StoreError};
use crate::telemetry::{QueueEvent, SharedTelemetry};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// How a single execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The job completed and its result was recorded.
    Completed,
    /// The execution failed and the job was requeued for another attempt.
    Retried,
    /// The execution failed and attempts are exhausted.
    Exhausted,
}

/// Executes one claimed job and reports the outcome to the store.
///
/// The runner enforces the wall-clock budget and reports exactly one of
/// complete or fail per execution. It never retries internally - retry
/// policy lives entirely in the [`RetryCoordinator`], which keeps execution
/// and policy independently testable.
pub struct JobRunner<S, P> {
    store: Arc<S>,
    provider: Arc<P>,
    retry: RetryCoordinator<S>,
    job_timeout: Duration,
    telemetry: SharedTelemetry,
}

impl<S, P> Clone for JobRunner<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            provider: Arc::clone(&self.provider),
            retry: self.retry.clone(),
            job_timeout: self.job_timeout,
            telemetry: Arc::clone(&self.telemetry),
        }
    }
}

impl<S: JobStore, P: AnalysisProvider> JobRunner<S, P> {
    /// Creates a runner.
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        retry: RetryCoordinator<S>,
        job_timeout: Duration,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self {
            store,
            provider,
            retry,
            job_timeout,
            telemetry,
        }
    }

    /// Runs one job that the caller has already claimed.
    pub async fn run(&self, job: JobRecord) -> Result<RunOutcome, StoreError> {
        self.telemetry.emit(QueueEvent::JobStarted {
            job_id: job.id,
            attempt: job.attempts + 1,
        });
        let started = std::time::Instant::now();

        let error = match tokio::time::timeout(self.job_timeout, self.provider.analyze(&job.payload))
            .await
        {
            Ok(Ok(result)) => {
                self.store.complete(job.id, result, Utc::now()).await?;
                self.telemetry.emit(QueueEvent::JobCompleted {
                    job_id: job.id,
                    duration: started.elapsed(),
                });
                return Ok(RunOutcome::Completed);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => {
                self.telemetry.emit(QueueEvent::JobTimedOut {
                    job_id: job.id,
                    budget: self.job_timeout,
                });
                format!(
                    "analysis timed out after {}s",
                    self.job_timeout.as_secs()
                )
            }
        };

        warn!(job_id = %job.id, error = %error, "Job execution failed");
        match self.retry.on_failure(job.id, &error, Utc::now()).await? {
            FailureDisposition::Requeued { .. } => Ok(RunOutcome::Retried),
            FailureDisposition::Exhausted => Ok(RunOutcome::Exhausted),
        }
    }
}
