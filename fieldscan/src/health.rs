//! Health classification.
//!
//! Maps queue metrics to a three-level operator-facing status using
//! configurable thresholds. Like the metrics it derives from, a health
//! snapshot is recomputed on demand and never stored.

use crate::metrics::QueueMetrics;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default backlog at which the queue counts as degraded.
pub const DEFAULT_BACKLOG_DEGRADED: usize = 50;

/// Default backlog at which the queue counts as unhealthy.
pub const DEFAULT_BACKLOG_UNHEALTHY: usize = 200;

/// Default error rate at which the queue counts as degraded.
pub const DEFAULT_ERROR_RATE_DEGRADED: f64 = 0.10;

/// Default error rate at which the queue counts as unhealthy.
pub const DEFAULT_ERROR_RATE_UNHEALTHY: f64 = 0.50;

/// Default longest acceptable gap without a successful completion while
/// work is waiting, in seconds.
pub const DEFAULT_MAX_COMPLETION_GAP_SECS: u64 = 600;

/// Thresholds separating healthy, degraded, and unhealthy.
#[derive(Clone, Copy, Debug)]
pub struct HealthThresholds {
    /// Backlog above this is degraded.
    pub backlog_degraded: usize,
    /// Backlog above this is unhealthy.
    pub backlog_unhealthy: usize,
    /// Error rate above this is degraded.
    pub error_rate_degraded: f64,
    /// Error rate above this is unhealthy.
    pub error_rate_unhealthy: f64,
    /// With work waiting, no successful completion within this interval is
    /// unhealthy.
    pub max_completion_gap: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            backlog_degraded: DEFAULT_BACKLOG_DEGRADED,
            backlog_unhealthy: DEFAULT_BACKLOG_UNHEALTHY,
            error_rate_degraded: DEFAULT_ERROR_RATE_DEGRADED,
            error_rate_unhealthy: DEFAULT_ERROR_RATE_UNHEALTHY,
            max_completion_gap: Duration::from_secs(DEFAULT_MAX_COMPLETION_GAP_SECS),
        }
    }
}

// =============================================================================
// Health Snapshot
// =============================================================================

/// Operator-facing health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Error rate and backlog below the low thresholds.
    Healthy,
    /// A threshold moderately exceeded; the queue is still making progress.
    Degraded,
    /// Severe backlog or error rate, or progress has stopped entirely.
    Unhealthy,
}

impl HealthStatus {
    /// Returns a string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time view of queue health.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    /// Current classification.
    pub status: HealthStatus,
    /// Jobs waiting in the queue.
    pub queue_backlog: usize,
    /// Mean queue wait of recently started jobs.
    pub avg_wait_time_ms: Option<f64>,
    /// Failed executions over total executions in the trailing window.
    pub error_rate: f64,
    /// When the most recent successful completion happened.
    pub last_processed_at: Option<DateTime<Utc>>,
    /// Configured concurrent processing capacity (worker count).
    pub processing_capacity: usize,
}

/// Classifies queue health from metrics.
///
/// Pure: depends only on the inputs, so callers may invoke it as often as
/// they like. `capacity` is the configured worker count, reported back so
/// operators can judge backlog against it.
pub fn classify(
    metrics: &QueueMetrics,
    thresholds: &HealthThresholds,
    capacity: usize,
    now: DateTime<Utc>,
) -> HealthSnapshot {
    let stalled = metrics.queue_backlog > 0 && completion_overdue(metrics, thresholds, now);

    let status = if metrics.queue_backlog > thresholds.backlog_unhealthy
        || metrics.error_rate > thresholds.error_rate_unhealthy
        || stalled
    {
        HealthStatus::Unhealthy
    } else if metrics.queue_backlog > thresholds.backlog_degraded
        || metrics.error_rate > thresholds.error_rate_degraded
    {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    HealthSnapshot {
        status,
        queue_backlog: metrics.queue_backlog,
        avg_wait_time_ms: metrics.avg_wait_time_ms,
        error_rate: metrics.error_rate,
        last_processed_at: metrics.last_processed_at,
        processing_capacity: capacity,
    }
}

/// True when work is waiting but nothing has completed within the allowed
/// gap. A queue that has never completed anything is only overdue once its
/// oldest work has been waiting longer than the gap.
fn completion_overdue(
    metrics: &QueueMetrics,
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> bool {
    let gap =
        ChronoDuration::from_std(thresholds.max_completion_gap).unwrap_or(ChronoDuration::MAX);
    match metrics.last_processed_at {
        Some(last) => now - last > gap,
        None => metrics
            .oldest_queued_at
            .is_some_and(|oldest| now - oldest > gap),
    }
}
