//! The job record and its identifiers.

use super::payload::AnalysisPayload;
use super::status::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default maximum execution attempts for a job.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Unique identifier for a job.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Creates a fresh random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Identifier shared by all children of one batch submission.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Creates a fresh random batch ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchId({})", self.0)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for BatchId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Scheduling priority; higher values are served first.
///
/// Any value is valid; the named levels cover the common submission paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority(i32);

impl Priority {
    /// User-facing requests that should jump the queue.
    pub const ON_DEMAND: Priority = Priority(100);

    /// Routine scheduled monitoring.
    pub const SCHEDULED: Priority = Priority(50);

    /// Historical backfill and other deferrable work.
    pub const BACKFILL: Priority = Priority(10);

    /// Creates a priority from a raw value.
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw priority value.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::SCHEDULED
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of submission a job originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Direct single-field analysis request.
    SingleFieldAnalysis,
    /// Child of a multi-field batch submission.
    BatchAnalysis,
}

impl JobKind {
    /// Returns a kebab-case string form for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleFieldAnalysis => "single-field-analysis",
            Self::BatchAnalysis => "batch-analysis",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One schedulable unit of analysis work.
///
/// The record is the store's unit of truth. Timestamps follow the lifecycle:
/// `created_at` at insertion, `started_at` when a worker claims the job,
/// `completed_at`/`processing_time_ms` only on success, `failed_at` only on
/// terminal failure. `not_before` delays retry eligibility after a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier.
    pub id: JobId,

    /// Submission kind.
    pub kind: JobKind,

    /// The work description.
    pub payload: AnalysisPayload,

    /// Scheduling priority; higher served first.
    pub priority: Priority,

    /// Current lifecycle state.
    pub status: JobStatus,

    /// Number of execution attempts that have failed so far.
    pub attempts: u32,

    /// Attempt limit; once reached the job fails terminally.
    pub max_attempts: u32,

    /// Insertion time.
    pub created_at: DateTime<Utc>,

    /// When the current (or last) execution started.
    pub started_at: Option<DateTime<Utc>>,

    /// Set when the job completed successfully.
    pub completed_at: Option<DateTime<Utc>>,

    /// Set when the job failed terminally.
    pub failed_at: Option<DateTime<Utc>>,

    /// Wall-clock duration of the successful execution.
    pub processing_time_ms: Option<u64>,

    /// Opaque provider result, present iff completed.
    pub result: Option<serde_json::Value>,

    /// Last error message, present iff failed.
    pub error: Option<String>,

    /// Owning caller.
    pub user_id: String,

    /// Batch this job belongs to, if any.
    pub batch_id: Option<BatchId>,

    /// Earliest time the scheduler may hand this job out again.
    pub not_before: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Creates a freshly queued record.
    pub fn new(
        kind: JobKind,
        payload: AnalysisPayload,
        priority: Priority,
        max_attempts: u32,
        user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            kind,
            payload,
            priority,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts,
            created_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            processing_time_ms: None,
            result: None,
            error: None,
            user_id: user_id.into(),
            batch_id: None,
            not_before: None,
        }
    }

    /// Attaches a batch identifier.
    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Returns true for terminal states.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// When the job reached a terminal state, if it has.
    pub fn terminal_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            JobStatus::Completed => self.completed_at,
            JobStatus::Failed => self.failed_at,
            _ => None,
        }
    }

    /// Whether the scheduler may hand this job out at `now`.
    ///
    /// Queued jobs under a retry backoff (`not_before` in the future) are
    /// held back; everything else queued is eligible.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Queued && self.not_before.is_none_or(|t| t <= now)
    }
}
