//! Stall detection watchdog.
//!
//! Watches the job store for work that has stopped moving. Two signals
//! matter for a claim-run-report pool:
//!
//! - a processing job recorded past the execution budget plus grace means
//!   its worker never reported an outcome (the runner fails any job at the
//!   budget, so a live worker cannot leave one this old);
//! - eligible queued work waiting while nothing is processing means no
//!   worker is picking jobs up.
//!
//! A job that is merely long-running stays inside the budget and is never
//! flagged. Everything is derived from the store on each check; the
//! watchdog keeps no state of its own.

use crate::job::{JobRecord, JobStatus};
use crate::store::JobStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default watchdog check interval (10 seconds).
pub const STALL_WATCHDOG_INTERVAL_SECS: u64 = 10;

/// Grace past the job budget before a processing job counts as stuck.
pub const STALL_GRACE_SECS: u64 = 30;

/// How long eligible queued work may wait with nothing processing before
/// the workers count as stalled.
pub const UNCLAIMED_WORK_THRESHOLD_SECS: u64 = 30;

/// What the watchdog concluded from one look at the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallStatus {
    /// No pending work.
    Idle,

    /// Work is pending and moving normally.
    Healthy,

    /// Processing jobs have outlived the execution budget; their workers
    /// never reported an outcome.
    StuckProcessing {
        /// Number of processing jobs past the budget.
        jobs: usize,
        /// Age of the oldest such job in seconds.
        oldest_secs: i64,
    },

    /// Eligible queued work is waiting but nothing is processing.
    UnclaimedWork {
        /// Number of eligible queued jobs.
        jobs: usize,
        /// Wait of the oldest such job in seconds.
        oldest_secs: i64,
    },
}

impl StallStatus {
    /// Returns true when the queue has stopped making progress.
    pub fn is_stalled(&self) -> bool {
        matches!(
            self,
            Self::StuckProcessing { .. } | Self::UnclaimedWork { .. }
        )
    }
}

/// Stall detection watchdog for the worker pool.
///
/// Periodically snapshots the store and classifies progress. Stalls are
/// logged as warnings for operators; healthy and idle checks log at debug.
pub struct StallWatchdog<S> {
    store: Arc<S>,

    /// A processing job older than this is considered stuck.
    processing_threshold: Duration,

    /// Eligible queued work older than this with nothing processing is
    /// considered unclaimed.
    queued_threshold: Duration,

    /// Check interval.
    interval: Duration,
}

impl<S: JobStore> StallWatchdog<S> {
    /// Creates a watchdog sized to the pool's job budget.
    ///
    /// The stuck-processing threshold is `job_timeout + STALL_GRACE_SECS`:
    /// long-running jobs inside the budget never trip it.
    pub fn new(store: Arc<S>, job_timeout: Duration) -> Self {
        Self {
            store,
            processing_threshold: job_timeout + Duration::from_secs(STALL_GRACE_SECS),
            queued_threshold: Duration::from_secs(UNCLAIMED_WORK_THRESHOLD_SECS),
            interval: Duration::from_secs(STALL_WATCHDOG_INTERVAL_SECS),
        }
    }

    /// Runs the watchdog until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if shutdown.is_cancelled() {
                break;
            }

            self.check_progress(Utc::now()).await;
        }
    }

    /// Snapshots the store, classifies progress, and logs the result.
    ///
    /// Returns `None` when the store could not be read.
    pub async fn check_progress(&self, now: DateTime<Utc>) -> Option<StallStatus> {
        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Stall watchdog could not read the store");
                return None;
            }
        };

        let status = self.assess(&snapshot, now);
        match status {
            StallStatus::StuckProcessing { jobs, oldest_secs } => {
                warn!(
                    jobs,
                    oldest_secs,
                    threshold_secs = self.processing_threshold.as_secs(),
                    "STALL DETECTED: {} processing jobs past the execution budget",
                    jobs
                );
            }
            StallStatus::UnclaimedWork { jobs, oldest_secs } => {
                warn!(
                    jobs,
                    oldest_secs,
                    threshold_secs = self.queued_threshold.as_secs(),
                    "STALL DETECTED: {} queued jobs waiting with no worker progress",
                    jobs
                );
            }
            StallStatus::Idle => {
                debug!("Stall watchdog: queue idle (no pending jobs)");
            }
            StallStatus::Healthy => {
                debug!("Stall watchdog: work moving normally");
            }
        }
        Some(status)
    }

    /// Classifies a snapshot. Pure with respect to `now`.
    fn assess(&self, snapshot: &[JobRecord], now: DateTime<Utc>) -> StallStatus {
        let processing_limit =
            ChronoDuration::from_std(self.processing_threshold).unwrap_or(ChronoDuration::MAX);
        let queued_limit =
            ChronoDuration::from_std(self.queued_threshold).unwrap_or(ChronoDuration::MAX);

        let mut processing = 0usize;
        let mut stuck = 0usize;
        let mut stuck_oldest = ChronoDuration::zero();
        let mut eligible_queued = 0usize;
        let mut queued_oldest = ChronoDuration::zero();

        for record in snapshot {
            match record.status {
                JobStatus::Processing => {
                    processing += 1;
                    if let Some(started) = record.started_at {
                        let age = now - started;
                        if age > processing_limit {
                            stuck += 1;
                            stuck_oldest = stuck_oldest.max(age);
                        }
                    }
                }
                JobStatus::Queued if record.is_eligible(now) => {
                    eligible_queued += 1;
                    queued_oldest = queued_oldest.max(now - record.created_at);
                }
                _ => {}
            }
        }

        if stuck > 0 {
            return StallStatus::StuckProcessing {
                jobs: stuck,
                oldest_secs: stuck_oldest.num_seconds(),
            };
        }
        if processing == 0 && eligible_queued > 0 && queued_oldest > queued_limit {
            return StallStatus::UnclaimedWork {
                jobs: eligible_queued,
                oldest_secs: queued_oldest.num_seconds(),
            };
        }
        if processing == 0 && eligible_queued == 0 {
            StallStatus::Idle
        } else {
            StallStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;
    use crate::job::{AnalysisPayload, JobKind, Priority, DEFAULT_MAX_ATTEMPTS};
    use crate::store::MemoryJobStore;
    use chrono::NaiveDate;

    const JOB_TIMEOUT: Duration = Duration::from_secs(120);

    fn record(field_id: &str, now: DateTime<Utc>) -> JobRecord {
        JobRecord::new(
            JobKind::SingleFieldAnalysis,
            AnalysisPayload {
                field_id: field_id.to_string(),
                bounding_box: BoundingBox::new(47.0, 48.0, 8.0, 9.0).unwrap(),
                target_date: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
                window: None,
                options: Default::default(),
            },
            Priority::default(),
            DEFAULT_MAX_ATTEMPTS,
            "user-1",
            now,
        )
    }

    fn processing_record(field_id: &str, started: DateTime<Utc>) -> JobRecord {
        let mut record = record(field_id, started);
        record.status = JobStatus::Processing;
        record.started_at = Some(started);
        record
    }

    fn watchdog(store: Arc<MemoryJobStore>) -> StallWatchdog<MemoryJobStore> {
        StallWatchdog::new(store, JOB_TIMEOUT)
    }

    #[test]
    fn test_watchdog_thresholds() {
        let watchdog = watchdog(Arc::new(MemoryJobStore::new()));

        assert_eq!(
            watchdog.processing_threshold,
            JOB_TIMEOUT + Duration::from_secs(STALL_GRACE_SECS)
        );
        assert_eq!(
            watchdog.queued_threshold,
            Duration::from_secs(UNCLAIMED_WORK_THRESHOLD_SECS)
        );
        assert_eq!(
            watchdog.interval,
            Duration::from_secs(STALL_WATCHDOG_INTERVAL_SECS)
        );
    }

    #[tokio::test]
    async fn test_empty_store_is_idle() {
        let store = Arc::new(MemoryJobStore::new());
        let status = watchdog(store).check_progress(Utc::now()).await;
        assert_eq!(status, Some(StallStatus::Idle));
        assert!(!StallStatus::Idle.is_stalled());
    }

    #[tokio::test]
    async fn test_fresh_work_is_healthy() {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        store.insert(record("queued", now)).await.unwrap();
        store
            .insert(processing_record("running", now))
            .await
            .unwrap();

        let status = watchdog(Arc::clone(&store)).check_progress(now).await;
        assert_eq!(status, Some(StallStatus::Healthy));
    }

    #[tokio::test]
    async fn test_long_running_job_within_budget_is_not_a_stall() {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        // Running for most of the budget, but still inside it.
        let started = now - ChronoDuration::seconds(JOB_TIMEOUT.as_secs() as i64 - 10);
        store
            .insert(processing_record("slow", started))
            .await
            .unwrap();

        let status = watchdog(Arc::clone(&store)).check_progress(now).await;
        assert_eq!(status, Some(StallStatus::Healthy));
    }

    #[tokio::test]
    async fn test_stuck_processing_detected() {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        // Past budget + grace: the worker never reported an outcome.
        let started = now
            - ChronoDuration::seconds(JOB_TIMEOUT.as_secs() as i64 + STALL_GRACE_SECS as i64 + 60);
        store
            .insert(processing_record("stuck", started))
            .await
            .unwrap();
        store.insert(record("waiting", now)).await.unwrap();

        let status = watchdog(Arc::clone(&store))
            .check_progress(now)
            .await
            .unwrap();
        assert!(status.is_stalled());
        match status {
            StallStatus::StuckProcessing { jobs, oldest_secs } => {
                assert_eq!(jobs, 1);
                assert!(oldest_secs >= JOB_TIMEOUT.as_secs() as i64 + STALL_GRACE_SECS as i64);
            }
            other => panic!("expected StuckProcessing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unclaimed_queued_work_detected() {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        // Eligible work waiting well past the threshold, nothing processing.
        let created = now - ChronoDuration::seconds(UNCLAIMED_WORK_THRESHOLD_SECS as i64 + 300);
        store.insert(record("forgotten-1", created)).await.unwrap();
        store.insert(record("forgotten-2", created)).await.unwrap();

        let status = watchdog(Arc::clone(&store))
            .check_progress(now)
            .await
            .unwrap();
        match status {
            StallStatus::UnclaimedWork { jobs, oldest_secs } => {
                assert_eq!(jobs, 2);
                assert!(oldest_secs >= UNCLAIMED_WORK_THRESHOLD_SECS as i64 + 300);
            }
            other => panic!("expected UnclaimedWork, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_backoff_hold_is_not_a_stall() {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        // Old queued job held back by retry backoff: not eligible, not stalled.
        let mut held = record("backing-off", now - ChronoDuration::hours(1));
        held.not_before = Some(now + ChronoDuration::seconds(60));
        store.insert(held).await.unwrap();

        let status = watchdog(Arc::clone(&store)).check_progress(now).await;
        assert_eq!(status, Some(StallStatus::Idle));
    }

    #[tokio::test]
    async fn test_old_queue_behind_active_processing_is_healthy() {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        // A deep but moving queue: backlog age is the health aggregator's
        // concern, not a stall.
        let created = now - ChronoDuration::seconds(UNCLAIMED_WORK_THRESHOLD_SECS as i64 + 300);
        store.insert(record("waiting", created)).await.unwrap();
        store
            .insert(processing_record("running", now))
            .await
            .unwrap();

        let status = watchdog(Arc::clone(&store)).check_progress(now).await;
        assert_eq!(status, Some(StallStatus::Healthy));
    }

    #[tokio::test]
    async fn test_watchdog_stops_on_cancellation() {
        let store = Arc::new(MemoryJobStore::new());
        let shutdown = CancellationToken::new();

        let watchdog = watchdog(store);

        // Cancel immediately
        shutdown.cancel();

        let result =
            tokio::time::timeout(Duration::from_millis(100), watchdog.run(shutdown)).await;
        assert!(result.is_ok());
    }
}
