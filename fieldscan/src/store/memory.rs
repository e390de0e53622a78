//! In-memory job store.

use super::{JobStore, StoreError};
use crate::job::{BatchId, JobId, JobRecord, JobStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A record plus its insertion sequence number.
///
/// The sequence breaks `created_at` ties deterministically so FIFO ordering
/// within a priority band holds even when records share a timestamp.
struct Slot {
    record: JobRecord,
    sequence: u64,
}

struct Inner {
    jobs: HashMap<JobId, Slot>,
    next_sequence: u64,
}

/// In-process [`JobStore`] holding every record behind one mutex.
///
/// The single lock makes every operation - including select-and-transition
/// in [`claim_next`](JobStore::claim_next) - indivisible, which is the same
/// contract a durable backend provides through atomic conditional updates.
/// No lock is held across an await point.
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                next_sequence: 0,
            }),
        }
    }

    /// Locks the table, recovering from a poisoned mutex.
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_processing(
        &self,
        id: JobId,
        f: impl FnOnce(&mut JobRecord),
    ) -> Result<JobRecord, StoreError> {
        let mut inner = self.locked();
        let slot = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if slot.record.status != JobStatus::Processing {
            return Err(StoreError::InvalidTransition {
                id,
                actual: slot.record.status,
                expected: JobStatus::Processing,
            });
        }
        f(&mut slot.record);
        Ok(slot.record.clone())
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for MemoryJobStore {
    async fn insert(&self, record: JobRecord) -> Result<(), StoreError> {
        let mut inner = self.locked();
        if inner.jobs.contains_key(&record.id) {
            return Err(StoreError::DuplicateJob(record.id));
        }
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.jobs.insert(record.id, Slot { record, sequence });
        Ok(())
    }

    async fn insert_batch(&self, records: Vec<JobRecord>) -> Result<(), StoreError> {
        let mut inner = self.locked();
        for record in &records {
            if inner.jobs.contains_key(&record.id) {
                return Err(StoreError::DuplicateJob(record.id));
            }
        }
        for record in records {
            let sequence = inner.next_sequence;
            inner.next_sequence += 1;
            inner.jobs.insert(record.id, Slot { record, sequence });
        }
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.locked().jobs.get(&id).map(|s| s.record.clone()))
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, StoreError> {
        let mut inner = self.locked();

        let winner = inner
            .jobs
            .values()
            .filter(|s| s.record.is_eligible(now))
            .min_by_key(|s| {
                (
                    std::cmp::Reverse(s.record.priority),
                    s.record.created_at,
                    s.sequence,
                )
            })
            .map(|s| s.record.id);

        Ok(winner.map(|id| {
            // Still under the same lock, so the claim is indivisible.
            let slot = inner.jobs.get_mut(&id).expect("winner is present");
            slot.record.status = JobStatus::Processing;
            slot.record.started_at = Some(now);
            slot.record.not_before = None;
            slot.record.clone()
        }))
    }

    async fn complete(
        &self,
        id: JobId,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, StoreError> {
        self.update_processing(id, |record| {
            record.status = JobStatus::Completed;
            record.completed_at = Some(now);
            record.processing_time_ms = record
                .started_at
                .map(|started| (now - started).num_milliseconds().max(0) as u64);
            record.result = Some(result);
            record.error = None;
        })
    }

    async fn retry(
        &self,
        id: JobId,
        not_before: Option<DateTime<Utc>>,
    ) -> Result<JobRecord, StoreError> {
        self.update_processing(id, |record| {
            record.status = JobStatus::Queued;
            record.attempts += 1;
            record.error = None;
            record.started_at = None;
            record.not_before = not_before;
        })
    }

    async fn fail(
        &self,
        id: JobId,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, StoreError> {
        self.update_processing(id, |record| {
            record.status = JobStatus::Failed;
            record.attempts += 1;
            record.failed_at = Some(now);
            record.error = Some(error);
        })
    }

    async fn retry_failed(&self) -> Result<usize, StoreError> {
        let mut inner = self.locked();
        let mut requeued = 0;
        for slot in inner.jobs.values_mut() {
            if slot.record.status == JobStatus::Failed {
                slot.record.status = JobStatus::Queued;
                slot.record.attempts = 0;
                slot.record.error = None;
                slot.record.failed_at = None;
                slot.record.started_at = None;
                slot.record.not_before = None;
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = self.locked();
        let before = inner.jobs.len();
        inner
            .jobs
            .retain(|_, slot| !matches!(slot.record.terminal_at(), Some(t) if t < cutoff));
        Ok(before - inner.jobs.len())
    }

    async fn snapshot(&self) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self.locked().jobs.values().map(|s| s.record.clone()).collect())
    }

    async fn jobs_in_batch(&self, batch_id: BatchId) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self
            .locked()
            .jobs
            .values()
            .filter(|s| s.record.batch_id == Some(batch_id))
            .map(|s| s.record.clone())
            .collect())
    }
}
