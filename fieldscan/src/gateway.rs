//! Submission gateway.
//!
//! Validates analysis requests and materializes job records, without ever
//! blocking on execution. A single-field request becomes one queued job; a
//! batch request is decomposed into one child job per field, all sharing a
//! batch ID, priority, and options, inserted atomically so a partially
//! created batch is never observable.
//!
//! Malformed geometry or dates are rejected here, before anything reaches
//! the store.

use crate::error::ValidationError;
use crate::geo::BoundingBox;
use crate::job::{
    AnalysisOptions, AnalysisPayload, BatchId, DateRange, JobId, JobKind, JobRecord, JobStatus,
    Priority, DEFAULT_MAX_ATTEMPTS,
};
use crate::store::{JobStore, StoreError};
use crate::telemetry::{QueueEvent, SharedTelemetry};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Errors from submission.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    /// The request was rejected before anything was persisted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The store rejected the insert.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A single-field analysis request.
#[derive(Debug, Clone)]
pub struct SingleRequest {
    /// Owning caller.
    pub user_id: String,
    /// Identifier of the monitored field.
    pub field_id: String,
    /// Area of interest.
    pub bounding_box: BoundingBox,
    /// The day the analysis should target.
    pub target_date: NaiveDate,
    /// Provider options.
    pub options: AnalysisOptions,
}

/// One field within a batch request.
#[derive(Debug, Clone)]
pub struct FieldRef {
    /// Identifier of the monitored field.
    pub field_id: String,
    /// Area of interest for this field.
    pub bounding_box: BoundingBox,
}

/// A multi-field batch request.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Owning caller.
    pub user_id: String,
    /// Fields to analyze; must be non-empty.
    pub fields: Vec<FieldRef>,
    /// Imagery search window shared by every child job.
    pub date_range: DateRange,
    /// Provider options shared by every child job.
    pub options: AnalysisOptions,
}

/// Per-submission scheduling options.
#[derive(Debug, Clone, Copy)]
pub struct SubmitOptions {
    /// Scheduling priority for the job(s).
    pub priority: Priority,
    /// Attempt limit for the job(s).
    pub max_attempts: u32,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            priority: Priority::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Receipt returned immediately after a batch submission.
#[derive(Debug, Clone)]
pub struct BatchReceipt {
    /// Identifier shared by every child job.
    pub batch_id: BatchId,
    /// IDs of the created children, in field order.
    pub job_ids: Vec<JobId>,
    /// Number of children created.
    pub jobs: usize,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

/// Aggregated view of a batch's child outcomes.
///
/// Partial success is expected: some children complete while others fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// The batch identifier.
    pub batch_id: BatchId,
    /// Total number of children.
    pub total: usize,
    /// Children still waiting in the queue.
    pub queued: usize,
    /// Children currently executing.
    pub processing: usize,
    /// Children that completed successfully.
    pub completed: usize,
    /// Children that failed terminally.
    pub failed: usize,
}

impl BatchSummary {
    /// Builds a summary from a batch's records.
    pub fn from_records(batch_id: BatchId, records: &[JobRecord]) -> Self {
        let mut summary = Self {
            batch_id,
            total: records.len(),
            queued: 0,
            processing: 0,
            completed: 0,
            failed: 0,
        };
        for record in records {
            match record.status {
                JobStatus::Queued => summary.queued += 1,
                JobStatus::Processing => summary.processing += 1,
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// Returns true once every child is terminal.
    pub fn is_settled(&self) -> bool {
        self.completed + self.failed == self.total
    }
}

/// Validates submissions and materializes queued job records.
pub struct SubmissionGateway<S> {
    store: Arc<S>,
    telemetry: SharedTelemetry,
}

impl<S: JobStore> SubmissionGateway<S> {
    /// Creates a gateway over the given store.
    pub fn new(store: Arc<S>, telemetry: SharedTelemetry) -> Self {
        Self { store, telemetry }
    }

    /// Submits a single-field analysis.
    ///
    /// Returns the queued record immediately; execution happens later in
    /// the worker pool.
    pub async fn submit(
        &self,
        request: SingleRequest,
        options: SubmitOptions,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, SubmitError> {
        request
            .bounding_box
            .validate()
            .map_err(ValidationError::InvalidBoundingBox)?;

        let payload = AnalysisPayload {
            field_id: request.field_id,
            bounding_box: request.bounding_box,
            target_date: request.target_date,
            window: None,
            options: request.options,
        };
        let record = JobRecord::new(
            JobKind::SingleFieldAnalysis,
            payload,
            options.priority,
            options.max_attempts,
            request.user_id,
            now,
        );

        self.store.insert(record.clone()).await?;
        self.telemetry.emit(QueueEvent::JobQueued {
            job_id: record.id,
            kind: record.kind,
            priority: record.priority,
        });
        Ok(record)
    }

    /// Submits a batch, decomposing it into one child job per field.
    ///
    /// Either all children are created or none are. Each child targets the
    /// window's last day and carries the full window for imagery search.
    pub async fn submit_batch(
        &self,
        request: BatchRequest,
        options: SubmitOptions,
        now: DateTime<Utc>,
    ) -> Result<BatchReceipt, SubmitError> {
        if request.fields.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        if !request.date_range.is_ordered() {
            return Err(ValidationError::InvalidDateRange {
                start: request.date_range.start,
                end: request.date_range.end,
            }
            .into());
        }
        for field in &request.fields {
            field
                .bounding_box
                .validate()
                .map_err(ValidationError::InvalidBoundingBox)?;
        }

        let batch_id = BatchId::new();
        let records: Vec<JobRecord> = request
            .fields
            .into_iter()
            .map(|field| {
                let payload = AnalysisPayload {
                    field_id: field.field_id,
                    bounding_box: field.bounding_box,
                    target_date: request.date_range.end,
                    window: Some(request.date_range),
                    options: request.options.clone(),
                };
                JobRecord::new(
                    JobKind::BatchAnalysis,
                    payload,
                    options.priority,
                    options.max_attempts,
                    request.user_id.clone(),
                    now,
                )
                .with_batch(batch_id)
            })
            .collect();

        let job_ids: Vec<JobId> = records.iter().map(|r| r.id).collect();
        let jobs = records.len();

        self.store.insert_batch(records).await?;
        self.telemetry
            .emit(QueueEvent::BatchQueued { batch_id, jobs });

        Ok(BatchReceipt {
            batch_id,
            job_ids,
            jobs,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryJobStore;
    use crate::telemetry::NullTelemetrySink;

    fn gateway() -> (Arc<MemoryJobStore>, SubmissionGateway<MemoryJobStore>) {
        let store = Arc::new(MemoryJobStore::new());
        let gateway = SubmissionGateway::new(Arc::clone(&store), Arc::new(NullTelemetrySink));
        (store, gateway)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(47.0, 48.0, 8.0, 9.0).unwrap()
    }

    fn single_request() -> SingleRequest {
        SingleRequest {
            user_id: "user-1".to_string(),
            field_id: "field-1".to_string(),
            bounding_box: bbox(),
            target_date: date(2025, 6, 15),
            options: Default::default(),
        }
    }

    fn batch_request(fields: &[&str]) -> BatchRequest {
        BatchRequest {
            user_id: "user-1".to_string(),
            fields: fields
                .iter()
                .map(|id| FieldRef {
                    field_id: id.to_string(),
                    bounding_box: bbox(),
                })
                .collect(),
            date_range: DateRange::new(date(2025, 6, 1), date(2025, 6, 30)).unwrap(),
            options: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_submit_returns_queued_record() {
        let (store, gateway) = gateway();
        let now = Utc::now();

        let record = gateway
            .submit(single_request(), SubmitOptions::default(), now)
            .await
            .unwrap();

        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.kind, JobKind::SingleFieldAnalysis);
        assert_eq!(record.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(store.get(record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_geometry_before_persisting() {
        let (store, gateway) = gateway();
        let mut request = single_request();
        request.bounding_box.south = 50.0; // south above north

        let result = gateway
            .submit(request, SubmitOptions::default(), Utc::now())
            .await;
        assert!(matches!(result, Err(SubmitError::Validation(_))));
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_batch_creates_one_job_per_field() {
        let (store, gateway) = gateway();
        let now = Utc::now();

        let receipt = gateway
            .submit_batch(batch_request(&["a", "b", "c"]), SubmitOptions::default(), now)
            .await
            .unwrap();

        assert_eq!(receipt.jobs, 3);
        assert_eq!(receipt.job_ids.len(), 3);

        let children = store.jobs_in_batch(receipt.batch_id).await.unwrap();
        assert_eq!(children.len(), 3);
        for child in &children {
            assert_eq!(child.status, JobStatus::Queued);
            assert_eq!(child.kind, JobKind::BatchAnalysis);
            assert_eq!(child.batch_id, Some(receipt.batch_id));
            assert_eq!(child.payload.target_date, date(2025, 6, 30));
            assert!(child.payload.window.is_some());
        }
    }

    #[tokio::test]
    async fn test_submit_batch_children_share_priority_and_options() {
        let (store, gateway) = gateway();
        let options = SubmitOptions {
            priority: Priority::ON_DEMAND,
            max_attempts: 5,
        };

        let receipt = gateway
            .submit_batch(batch_request(&["a", "b"]), options, Utc::now())
            .await
            .unwrap();

        for child in store.jobs_in_batch(receipt.batch_id).await.unwrap() {
            assert_eq!(child.priority, Priority::ON_DEMAND);
            assert_eq!(child.max_attempts, 5);
        }
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let (store, gateway) = gateway();

        let result = gateway
            .submit_batch(batch_request(&[]), SubmitOptions::default(), Utc::now())
            .await;

        assert!(matches!(
            result,
            Err(SubmitError::Validation(ValidationError::EmptyBatch))
        ));
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_with_inverted_range_rejected() {
        let (_, gateway) = gateway();
        let mut request = batch_request(&["a"]);
        request.date_range = DateRange {
            start: date(2025, 7, 1),
            end: date(2025, 6, 1),
        };

        let result = gateway
            .submit_batch(request, SubmitOptions::default(), Utc::now())
            .await;
        assert!(matches!(
            result,
            Err(SubmitError::Validation(
                ValidationError::InvalidDateRange { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_batch_with_one_bad_field_creates_nothing() {
        let (store, gateway) = gateway();
        let mut request = batch_request(&["a", "b"]);
        request.fields[1].bounding_box.west = 200.0;

        let result = gateway
            .submit_batch(request, SubmitOptions::default(), Utc::now())
            .await;
        assert!(matches!(result, Err(SubmitError::Validation(_))));
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[test]
    fn test_batch_summary_counts() {
        let batch_id = BatchId::new();
        let now = Utc::now();
        let mut records: Vec<JobRecord> = (0..4)
            .map(|i| {
                JobRecord::new(
                    JobKind::BatchAnalysis,
                    AnalysisPayload {
                        field_id: format!("f{i}"),
                        bounding_box: bbox(),
                        target_date: date(2025, 6, 15),
                        window: None,
                        options: Default::default(),
                    },
                    Priority::default(),
                    DEFAULT_MAX_ATTEMPTS,
                    "user-1",
                    now,
                )
                .with_batch(batch_id)
            })
            .collect();

        records[0].status = JobStatus::Completed;
        records[1].status = JobStatus::Completed;
        records[2].status = JobStatus::Failed;
        // records[3] stays queued

        let summary = BatchSummary::from_records(batch_id, &records);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.queued, 1);
        assert!(!summary.is_settled());
    }
}
