//! Per-row outcomes and the end-of-run tally.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sheetmail_core::SenderIdentity;
use std::time::Duration;

use crate::attachments::SkippedAttachment;

/// Lifecycle of one dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Cancelled,
    Fatal,
}

/// Why a row counted as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    NoRecipientColumn,
    InvalidRecipient(String),
    Transport(String),
    Timeout(Duration),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRecipientColumn => write!(f, "no email column"),
            Self::InvalidRecipient(v) => write!(f, "invalid email address '{v}'"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::Timeout(d) => write!(f, "send timed out after {}s", d.as_secs()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RowStatus {
    Sent,
    Failed(FailureReason),
    /// Entirely blank row; not counted as processed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowOutcome {
    /// 0-based position in the dataset.
    pub row: usize,
    pub recipient: Option<String>,
    pub status: RowStatus,
    /// Placeholders that rendered as `[name]`.
    pub unresolved: Vec<String>,
}

/// Result of one dispatch run. `sent + failed == processed <= total`.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub state: RunState,
    pub total: usize,
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub batch_pauses: usize,
    pub sender: SenderIdentity,
    pub skipped_attachments: Vec<SkippedAttachment>,
    pub rows: Vec<RowOutcome>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl DispatchReport {
    pub fn is_cancelled(&self) -> bool {
        self.state == RunState::Cancelled
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowOutcome> {
        self.rows
            .iter()
            .filter(|r| matches!(r.status, RowStatus::Failed(_)))
    }
}

impl std::fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}: {} sent, {} failed, {} skipped of {} rows in {:.1}s",
            self.state,
            self.sent,
            self.failed,
            self.skipped,
            self.total,
            self.elapsed.as_secs_f64()
        )
    }
}
