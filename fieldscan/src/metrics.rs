//! Metrics aggregation.
//!
//! Everything here is a pure function of a store snapshot plus the caller's
//! clock and window configuration - never a source of truth, safe to invoke
//! arbitrarily often, and trivially testable with synthetic records.

use crate::job::{JobRecord, JobStatus};
use chrono::{DateTime, Utc};

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default trailing window of completed jobs for the processing-time mean.
pub const DEFAULT_PROCESSING_WINDOW: usize = 50;

/// Default trailing window of recently started jobs for the wait-time mean.
pub const DEFAULT_WAIT_WINDOW: usize = 50;

/// Default trailing window of terminal jobs for the error rate.
pub const DEFAULT_ERROR_WINDOW: usize = 100;

/// Trailing-window sizes for aggregation.
#[derive(Clone, Copy, Debug)]
pub struct MetricsConfig {
    /// Number of most recent completed jobs in the processing-time mean.
    pub processing_window: usize,
    /// Number of most recently started jobs in the wait-time mean.
    pub wait_window: usize,
    /// Number of most recent terminal jobs in the error rate.
    pub error_window: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            processing_window: DEFAULT_PROCESSING_WINDOW,
            wait_window: DEFAULT_WAIT_WINDOW,
            error_window: DEFAULT_ERROR_WINDOW,
        }
    }
}

// =============================================================================
// Queue Metrics
// =============================================================================

/// Aggregate counts and rates derived from the job store.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueMetrics {
    /// Total number of records in the store.
    pub total_jobs: usize,
    /// Jobs waiting in the queue.
    pub queued: usize,
    /// Jobs currently executing.
    pub processing: usize,
    /// Jobs that completed successfully.
    pub completed: usize,
    /// Jobs that failed terminally.
    pub failed: usize,

    /// `completed / (completed + failed)`; 1.0 when no terminal jobs exist.
    pub success_rate: f64,
    /// `1.0 - success_rate`.
    pub failure_rate: f64,

    /// Mean processing time over the trailing window of completed jobs.
    pub avg_processing_time_ms: Option<f64>,
    /// Queue depth - the number of queued jobs.
    pub queue_backlog: usize,
    /// Mean `started_at - created_at` over recently started jobs.
    pub avg_wait_time_ms: Option<f64>,
    /// Failed executions over total executions in the trailing window of
    /// terminal jobs.
    pub error_rate: f64,
    /// When the most recent successful completion happened.
    pub last_processed_at: Option<DateTime<Utc>>,
    /// Creation time of the oldest job still waiting in the queue.
    pub oldest_queued_at: Option<DateTime<Utc>>,
}

/// Computes aggregate metrics from a store snapshot.
///
/// The error rate counts executions, not jobs: a completed job with
/// `attempts = n` contributed `n` failed executions and one successful one,
/// a terminally failed job `attempts` failed executions. Windows select the
/// most recent terminal jobs by their terminal timestamp.
pub fn compute(snapshot: &[JobRecord], config: &MetricsConfig) -> QueueMetrics {
    let mut queued = 0;
    let mut processing = 0;
    let mut completed = 0;
    let mut failed = 0;
    for record in snapshot {
        match record.status {
            JobStatus::Queued => queued += 1,
            JobStatus::Processing => processing += 1,
            JobStatus::Completed => completed += 1,
            JobStatus::Failed => failed += 1,
        }
    }

    let terminal = completed + failed;
    let success_rate = if terminal == 0 {
        1.0
    } else {
        completed as f64 / terminal as f64
    };

    QueueMetrics {
        total_jobs: snapshot.len(),
        queued,
        processing,
        completed,
        failed,
        success_rate,
        failure_rate: 1.0 - success_rate,
        avg_processing_time_ms: avg_processing_time(snapshot, config.processing_window),
        queue_backlog: queued,
        avg_wait_time_ms: avg_wait_time(snapshot, config.wait_window),
        error_rate: error_rate(snapshot, config.error_window),
        last_processed_at: snapshot
            .iter()
            .filter_map(|r| r.completed_at)
            .max(),
        oldest_queued_at: snapshot
            .iter()
            .filter(|r| r.status == JobStatus::Queued)
            .map(|r| r.created_at)
            .min(),
    }
}

/// Mean `processing_time_ms` over the `window` most recent completions.
fn avg_processing_time(snapshot: &[JobRecord], window: usize) -> Option<f64> {
    let mut recent: Vec<&JobRecord> = snapshot
        .iter()
        .filter(|r| r.status == JobStatus::Completed && r.processing_time_ms.is_some())
        .collect();
    recent.sort_by_key(|r| std::cmp::Reverse(r.completed_at));
    recent.truncate(window);

    mean(
        recent
            .iter()
            .filter_map(|r| r.processing_time_ms)
            .map(|ms| ms as f64),
    )
}

/// Mean queue wait over the `window` most recently started jobs.
fn avg_wait_time(snapshot: &[JobRecord], window: usize) -> Option<f64> {
    let mut recent: Vec<&JobRecord> = snapshot
        .iter()
        .filter(|r| r.started_at.is_some())
        .collect();
    recent.sort_by_key(|r| std::cmp::Reverse(r.started_at));
    recent.truncate(window);

    mean(recent.iter().filter_map(|r| {
        let started = r.started_at?;
        Some((started - r.created_at).num_milliseconds().max(0) as f64)
    }))
}

/// Failed executions over total executions among the `window` most recent
/// terminal jobs. 0.0 when nothing has executed yet.
fn error_rate(snapshot: &[JobRecord], window: usize) -> f64 {
    let mut recent: Vec<&JobRecord> = snapshot.iter().filter(|r| r.is_terminal()).collect();
    recent.sort_by_key(|r| std::cmp::Reverse(r.terminal_at()));
    recent.truncate(window);

    let mut failed_executions = 0u64;
    let mut total_executions = 0u64;
    for record in recent {
        match record.status {
            JobStatus::Completed => {
                failed_executions += u64::from(record.attempts);
                total_executions += u64::from(record.attempts) + 1;
            }
            JobStatus::Failed => {
                failed_executions += u64::from(record.attempts);
                total_executions += u64::from(record.attempts);
            }
            _ => {}
        }
    }

    if total_executions == 0 {
        0.0
    } else {
        failed_executions as f64 / total_executions as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
