//! FieldScan - asynchronous geospatial analysis job queue
//!
//! This library schedules, executes, and tracks satellite-imagery analysis
//! jobs for field monitoring. Submissions are validated and queued
//! immediately; a worker pool executes them against an external analysis
//! provider with priority ordering, bounded concurrency, per-job timeouts,
//! and automatic retry with backoff. Metrics and health are derived on
//! demand from the job store, and a retention sweeper purges old terminal
//! jobs.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides the assembled queue:
//!
//! ```ignore
//! use fieldscan::config::QueueConfig;
//! use fieldscan::service::AnalysisQueueService;
//! use fieldscan::store::MemoryJobStore;
//!
//! let service = AnalysisQueueService::start(
//!     MemoryJobStore::new(),
//!     my_provider,
//!     QueueConfig::default(),
//! );
//!
//! let job = service.submit(request, Default::default()).await?;
//! ```
//!
//! The pieces compose individually as well: a [`store::JobStore`]
//! implementation supplies atomic state transitions, the
//! [`gateway::SubmissionGateway`] validates and persists submissions, and
//! [`worker::WorkerPool`] runs the poll-execute-report loops.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod gateway;
pub mod geo;
pub mod health;
pub mod job;
pub mod metrics;
pub mod provider;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod worker;

/// Version of the FieldScan library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
