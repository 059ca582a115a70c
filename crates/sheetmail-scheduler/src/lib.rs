//! # Sheetmail Scheduler
//!
//! Persistent campaign scheduling. Jobs survive restarts; one background
//! loop checks triggers every tick and runs due campaigns one at a time.
//!
//! ## Architecture
//! ```text
//! spawn_scheduler (tokio interval, ~1s)
//!   └── CampaignScheduler::take_due(now)
//!         ├── once:    "2026-03-01T09:00" → Completed after firing
//!         ├── daily:   "09:00"
//!         ├── weekly:  "monday 10:30"
//!         └── monthly: "09:00", daily trigger, runs on the 1st only
//!   └── JobRunner::run(job) → SheetSource::fetch → DispatchEngine::send_bulk
//!   └── CampaignScheduler::record_run → JobStore (scheduled_jobs.json)
//! ```

pub mod cadence;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod runner;
pub mod store;

pub use cadence::{Cadence, ScheduleKind};
pub use engine::{CampaignScheduler, DueJob, JobRunSummary, run_due, spawn_scheduler};
pub use error::ScheduleError;
pub use jobs::{JobSpec, JobStatus, ScheduledJob};
pub use runner::{CampaignRunner, JobRunner};
pub use store::JobStore;
