//! Retention sweeper.
//!
//! Purges terminal jobs older than a retention window. Active jobs are
//! never touched regardless of age - a stuck processing job is a health
//! signal for the aggregator, not a cleanup target.

use crate::error::QueueError;
use crate::store::JobStore;
use crate::telemetry::{QueueEvent, SharedTelemetry};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Deletes terminal jobs past the retention window.
pub struct RetentionSweeper<S> {
    store: Arc<S>,
    telemetry: SharedTelemetry,
    /// Held for the duration of a sweep; a second concurrent run is
    /// rejected rather than queued behind the first.
    running: Mutex<()>,
}

impl<S: JobStore> RetentionSweeper<S> {
    /// Creates a sweeper over the given store.
    pub fn new(store: Arc<S>, telemetry: SharedTelemetry) -> Self {
        Self {
            store,
            telemetry,
            running: Mutex::new(()),
        }
    }

    /// Removes terminal jobs whose terminal timestamp precedes
    /// `now - retention_days`.
    ///
    /// Returns the number removed, or [`QueueError::CleanupAlreadyRunning`]
    /// when a sweep is already in progress. Queued and processing jobs
    /// survive any window.
    pub async fn cleanup(
        &self,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, QueueError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| QueueError::CleanupAlreadyRunning)?;

        let cutoff = now - ChronoDuration::days(i64::from(retention_days));
        let removed = self.store.delete_terminal_before(cutoff).await?;

        info!(
            retention_days = retention_days,
            removed = removed,
            "Retention cleanup finished"
        );
        self.telemetry
            .emit(QueueEvent::CleanupCompleted { removed });
        Ok(removed)
    }
}
