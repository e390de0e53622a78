//! Error taxonomy for the queue boundary.
//!
//! Four failure classes cross the boundary:
//!
//! - [`ValidationError`] - malformed submission, rejected before any job is
//!   persisted; never retried.
//! - Execution failures - transient provider errors handled internally by
//!   the retry coordinator; they surface only once attempts are exhausted,
//!   as a terminally failed job with the last error retained.
//! - `NotFound` - status or batch query for an unknown job.
//! - [`StoreError`] - the store rejected an operation.

use crate::geo::GeoError;
use crate::job::JobId;
use crate::store::StoreError;
use chrono::NaiveDate;
use thiserror::Error;

/// A submission was malformed and nothing was persisted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Batch submission with no fields.
    #[error("batch contains no fields")]
    EmptyBatch,

    /// Bounding box failed validation.
    #[error("invalid bounding box: {0}")]
    InvalidBoundingBox(#[from] GeoError),

    /// Date range with start after end.
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Errors returned by the queue's boundary operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    /// The submission was rejected before anything was persisted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Status query for an unknown job.
    #[error("job {0} not found")]
    JobNotFound(JobId),

    /// Batch query for an unknown batch.
    #[error("batch not found")]
    BatchNotFound,

    /// A cleanup run was requested while one was already in progress.
    #[error("cleanup is already running")]
    CleanupAlreadyRunning,

    /// The store rejected an operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}
