//! Telemetry for queue observability.
//!
//! The queue emits structured events via a sink abstraction and doesn't know
//! how they are consumed - the "emit, don't present" pattern. Consumers
//! (logging, metrics collection, dashboards) decide how to present or
//! aggregate events.

use crate::job::{BatchId, JobId, JobKind, Priority};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Queue Events
// =============================================================================

/// Events emitted during queue operation.
#[derive(Clone, Debug)]
pub enum QueueEvent {
    /// A job was accepted and persisted as queued.
    JobQueued {
        job_id: JobId,
        kind: JobKind,
        priority: Priority,
    },

    /// A batch submission was decomposed and persisted.
    BatchQueued { batch_id: BatchId, jobs: usize },

    /// A worker claimed a job and began executing it.
    JobStarted { job_id: JobId, attempt: u32 },

    /// A job finished successfully.
    JobCompleted { job_id: JobId, duration: Duration },

    /// A job exceeded its wall-clock budget.
    JobTimedOut { job_id: JobId, budget: Duration },

    /// A failed execution was requeued for another attempt.
    JobRetryScheduled {
        job_id: JobId,
        attempt: u32,
        retry_at: DateTime<Utc>,
    },

    /// A job failed terminally.
    JobFailed {
        job_id: JobId,
        attempts: u32,
        error: String,
    },

    /// The operator bulk-requeued failed jobs.
    FailedJobsRequeued { count: usize },

    /// The retention sweeper removed terminal jobs.
    CleanupCompleted { removed: usize },
}

impl QueueEvent {
    /// Returns the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::JobQueued { job_id, .. }
            | Self::JobStarted { job_id, .. }
            | Self::JobCompleted { job_id, .. }
            | Self::JobTimedOut { job_id, .. }
            | Self::JobRetryScheduled { job_id, .. }
            | Self::JobFailed { job_id, .. } => Some(*job_id),
            Self::BatchQueued { .. }
            | Self::FailedJobsRequeued { .. }
            | Self::CleanupCompleted { .. } => None,
        }
    }

    /// Returns a short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::JobQueued { .. } => "job_queued",
            Self::BatchQueued { .. } => "batch_queued",
            Self::JobStarted { .. } => "job_started",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobTimedOut { .. } => "job_timed_out",
            Self::JobRetryScheduled { .. } => "job_retry_scheduled",
            Self::JobFailed { .. } => "job_failed",
            Self::FailedJobsRequeued { .. } => "failed_jobs_requeued",
            Self::CleanupCompleted { .. } => "cleanup_completed",
        }
    }
}

// =============================================================================
// Telemetry Sink Trait
// =============================================================================

/// Sink for queue events.
///
/// Implementations must be thread-safe; events are emitted from multiple
/// workers concurrently. `emit` should be fast and non-blocking.
pub trait TelemetrySink: Send + Sync {
    /// Called when a queue event occurs.
    fn emit(&self, event: QueueEvent);
}

/// Shared handle to a telemetry sink.
pub type SharedTelemetry = Arc<dyn TelemetrySink>;

// =============================================================================
// Built-in Sink Implementations
// =============================================================================

/// No-op sink for when telemetry is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: QueueEvent) {
        // Intentionally empty
    }
}

/// Sink that logs events using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: QueueEvent) {
        match &event {
            QueueEvent::JobQueued {
                job_id,
                kind,
                priority,
            } => {
                tracing::debug!(job_id = %job_id, kind = %kind, priority = %priority, "Job queued");
            }
            QueueEvent::BatchQueued { batch_id, jobs } => {
                tracing::info!(batch_id = %batch_id, jobs = jobs, "Batch queued");
            }
            QueueEvent::JobStarted { job_id, attempt } => {
                tracing::debug!(job_id = %job_id, attempt = attempt, "Job started");
            }
            QueueEvent::JobCompleted { job_id, duration } => {
                tracing::debug!(
                    job_id = %job_id,
                    duration_ms = duration.as_millis(),
                    "Job completed"
                );
            }
            QueueEvent::JobTimedOut { job_id, budget } => {
                tracing::warn!(
                    job_id = %job_id,
                    budget_ms = budget.as_millis(),
                    "Job exceeded execution budget"
                );
            }
            QueueEvent::JobRetryScheduled {
                job_id,
                attempt,
                retry_at,
            } => {
                tracing::warn!(
                    job_id = %job_id,
                    attempt = attempt,
                    retry_at = %retry_at,
                    "Job retry scheduled"
                );
            }
            QueueEvent::JobFailed {
                job_id,
                attempts,
                error,
            } => {
                tracing::error!(
                    job_id = %job_id,
                    attempts = attempts,
                    error = %error,
                    "Job failed terminally"
                );
            }
            QueueEvent::FailedJobsRequeued { count } => {
                tracing::info!(count = count, "Failed jobs requeued by operator");
            }
            QueueEvent::CleanupCompleted { removed } => {
                tracing::info!(removed = removed, "Retention cleanup completed");
            }
        }
    }
}
