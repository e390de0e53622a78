//! Job store - the single source of truth for job state.
//!
//! The [`JobStore`] trait is the seam between the queue core and whatever
//! durable storage backs it. Every state transition goes through a
//! conditional operation that requires the job's current status to match,
//! so the single-dispatch invariant (at most one worker holds a job in
//! `Processing`) is enforced by the store, not by caller discipline.
//!
//! [`MemoryJobStore`] is the in-process implementation. It keeps every
//! record behind one mutex so claim-and-transition is indivisible - the same
//! atomicity contract a durable backend provides with conditional updates.

mod memory;

pub use memory::MemoryJobStore;

use crate::job::{BatchId, JobId, JobRecord, JobStatus};
use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;

/// Errors from job store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A record with this ID already exists.
    #[error("job {0} already exists")]
    DuplicateJob(JobId),

    /// No record with this ID.
    #[error("job {0} not found")]
    NotFound(JobId),

    /// A conditional transition found the job in the wrong state.
    #[error("job {id} is {actual}, expected {expected}")]
    InvalidTransition {
        id: JobId,
        actual: JobStatus,
        expected: JobStatus,
    },
}

/// Durable table of job records keyed by ID.
///
/// Implementations must make [`claim_next`](JobStore::claim_next) atomic:
/// under concurrent polling, exactly one caller wins each job. The
/// conditional mutations (`complete`, `retry`, `fail`) must verify the
/// current status and reject mismatches with
/// [`StoreError::InvalidTransition`].
pub trait JobStore: Send + Sync + 'static {
    /// Inserts a new record, rejecting duplicates.
    fn insert(&self, record: JobRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Inserts all records or none of them.
    ///
    /// A partially created batch must never be observable, so any rejection
    /// (e.g. a duplicate ID) leaves the store untouched.
    fn insert_batch(
        &self,
        records: Vec<JobRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetches a record by ID.
    fn get(&self, id: JobId) -> impl Future<Output = Result<Option<JobRecord>, StoreError>> + Send;

    /// Atomically claims the next eligible queued job.
    ///
    /// Selection order: highest priority first, then earliest `created_at`,
    /// then insertion order. Jobs with `not_before` in the future are
    /// skipped. The winning record transitions `Queued → Processing` with
    /// `started_at = now` in the same operation. Returns `None` when no job
    /// is eligible - the normal idle condition.
    fn claim_next(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<JobRecord>, StoreError>> + Send;

    /// Transitions `Processing → Completed`, recording the result and
    /// processing time.
    fn complete(
        &self,
        id: JobId,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<JobRecord, StoreError>> + Send;

    /// Transitions `Processing → Queued` for another attempt.
    ///
    /// Increments `attempts`, clears the error, resets `started_at`, and
    /// holds the job until `not_before` if one is given.
    fn retry(
        &self,
        id: JobId,
        not_before: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<JobRecord, StoreError>> + Send;

    /// Transitions `Processing → Failed` terminally.
    ///
    /// Increments `attempts` and retains the error for diagnostics.
    fn fail(
        &self,
        id: JobId,
        error: String,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<JobRecord, StoreError>> + Send;

    /// Requeues every terminally failed job with `attempts` reset to 0.
    ///
    /// This is the operator bulk-retry path, independent of the automatic
    /// per-job policy. Returns the number of jobs requeued.
    fn retry_failed(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Deletes terminal jobs whose terminal timestamp precedes `cutoff`.
    ///
    /// Queued and processing jobs are never deleted regardless of age.
    /// Returns the number removed.
    fn delete_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Returns a point-in-time copy of every record.
    fn snapshot(&self) -> impl Future<Output = Result<Vec<JobRecord>, StoreError>> + Send;

    /// Returns all records belonging to a batch.
    fn jobs_in_batch(
        &self,
        batch_id: BatchId,
    ) -> impl Future<Output = Result<Vec<JobRecord>, StoreError>> + Send;
}
