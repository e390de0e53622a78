//! Queue configuration.
//!
//! This module contains [`QueueConfig`] and the default constants for the
//! worker pool, retry policy, and aggregation windows. Health thresholds
//! live in [`crate::health::HealthThresholds`] and metrics windows in
//! [`crate::metrics::MetricsConfig`]; both are embedded here so one value
//! configures the whole queue.

use crate::health::HealthThresholds;
use crate::metrics::MetricsConfig;
use std::time::Duration;

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default number of workers polling the queue.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default idle poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Default per-job wall-clock budget in seconds.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 120;

/// Default cap on concurrent provider calls across all workers.
pub const DEFAULT_PROVIDER_CONCURRENCY: usize = 8;

/// Default base for the quadratic retry backoff, in seconds.
///
/// A job's n-th retry is held back `base * n^2` from the failure.
pub const DEFAULT_RETRY_BACKOFF_BASE_SECS: u64 = 30;

// =============================================================================
// Queue Configuration
// =============================================================================

/// Configuration for the analysis queue.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Number of workers in the pool.
    pub worker_count: usize,

    /// How long an idle worker sleeps before polling again.
    pub poll_interval: Duration,

    /// Wall-clock budget per job execution; exceeding it fails the job
    /// with a timeout error.
    pub job_timeout: Duration,

    /// Maximum concurrent calls into the analysis provider.
    ///
    /// The external provider is rate limited, so this is typically at or
    /// below the provider's allowance rather than the worker count.
    pub provider_concurrency: usize,

    /// Base duration for the quadratic retry backoff.
    pub retry_backoff_base: Duration,

    /// Trailing-window sizes for metrics aggregation.
    pub metrics: MetricsConfig,

    /// Thresholds for the health classification.
    pub health: HealthThresholds,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            provider_concurrency: DEFAULT_PROVIDER_CONCURRENCY,
            retry_backoff_base: Duration::from_secs(DEFAULT_RETRY_BACKOFF_BASE_SECS),
            metrics: MetricsConfig::default(),
            health: HealthThresholds::default(),
        }
    }
}
