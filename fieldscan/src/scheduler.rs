//! Scheduler / dequeuer.
//!
//! Thin policy layer over [`JobStore::claim_next`]. The store performs the
//! atomic select-and-transition; this wrapper gives workers a single place
//! to dequeue from and keeps the ordering policy (priority, then FIFO)
//! documented in one spot.

use crate::job::JobRecord;
use crate::store::{JobStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Hands out the next eligible job to whichever worker asks first.
pub struct Scheduler<S> {
    store: Arc<S>,
}

impl<S> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: JobStore> Scheduler<S> {
    /// Creates a scheduler over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Claims the next eligible queued job, if any.
    ///
    /// Selection is highest priority first, FIFO within a priority band,
    /// skipping jobs still under a retry backoff. `None` means the queue is
    /// idle - a normal condition, not an error. The claim records
    /// `started_at` as part of the same atomic transition, so two
    /// concurrent callers can never receive the same job.
    pub async fn dequeue(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, StoreError> {
        self.store.claim_next(now).await
    }
}
