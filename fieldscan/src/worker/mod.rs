//! Worker pool and job execution.
//!
//! Workers coordinate solely through the job store: each one repeatedly
//! polls the scheduler, runs whatever it claims, and reports the outcome.
//! There is no shared dispatcher - the store's atomic claim is the only
//! synchronization point, so workers can be added or removed freely.
//!
//! ```text
//! ┌────────────┐   claim    ┌───────────┐   analyze   ┌──────────────┐
//! │ WorkerPool │ ─────────> │ JobRunner │ ──────────> │   Provider   │
//! │ (N loops)  │            │ (timeout) │             │ (rate-limited│
//! └────────────┘            └───────────┘             │   external)  │
//!        │ report: complete / fail+retry              └──────────────┘
//!        ▼
//!   Job Store
//! ```
//!
//! The [`StallWatchdog`] runs alongside the pool and warns when the store
//! shows work that has stopped moving: processing jobs past the execution
//! budget, or eligible queued work that no worker is picking up.

mod pool;
mod runner;
mod watchdog;

pub use pool::WorkerPool;
pub use runner::{JobRunner, RunOutcome};
pub use watchdog::{
    StallStatus, StallWatchdog, STALL_GRACE_SECS, STALL_WATCHDOG_INTERVAL_SECS,
    UNCLAIMED_WORK_THRESHOLD_SECS,
};
