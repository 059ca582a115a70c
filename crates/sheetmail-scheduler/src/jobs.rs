//! Scheduled campaign definitions.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sheetmail_core::Template;

use crate::cadence::{Cadence, ScheduleKind};
use crate::error::ScheduleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Completed,
    Cancelled,
    /// Stored schedule could no longer be parsed.
    Failed,
}

/// What the caller supplies to create a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub kind: ScheduleKind,
    pub schedule_time: String,
    pub template: Template,
    pub sheet_url: String,
    pub sheet_name: String,
    pub batch_size: usize,
    pub time_gap_secs: u64,
}

/// A persisted campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub name: String,
    #[serde(rename = "schedule_type")]
    pub kind: ScheduleKind,
    pub schedule_time: String,
    pub template: Template,
    pub sheet_url: String,
    pub sheet_name: String,
    pub batch_size: usize,
    #[serde(rename = "time_gap")]
    pub time_gap_secs: u64,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
    /// Local wall-clock time of the last executed trigger.
    #[serde(default)]
    pub last_run: Option<NaiveDateTime>,
    #[serde(default)]
    pub run_count: u32,
    #[serde(default)]
    pub last_sent: Option<usize>,
    #[serde(default)]
    pub last_failed: Option<usize>,
}

impl ScheduledJob {
    pub fn new(spec: JobSpec) -> Self {
        Self {
            id: format!("job-{}", uuid::Uuid::new_v4().simple()),
            name: spec.name,
            kind: spec.kind,
            schedule_time: spec.schedule_time,
            template: spec.template,
            sheet_url: spec.sheet_url,
            sheet_name: spec.sheet_name,
            batch_size: spec.batch_size,
            time_gap_secs: spec.time_gap_secs,
            created_at: Utc::now(),
            status: JobStatus::Active,
            last_run: None,
            run_count: 0,
            last_sent: None,
            last_failed: None,
        }
    }

    pub fn cadence(&self) -> Result<Cadence, ScheduleError> {
        Cadence::parse(self.kind, &self.schedule_time)
    }

    pub fn is_active(&self) -> bool {
        self.status == JobStatus::Active
    }
}
