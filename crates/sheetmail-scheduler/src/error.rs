use sheetmail_core::SheetmailError;
use sheetmail_dispatch::DispatchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid {kind} schedule time '{value}'")]
    InvalidTime { kind: String, value: String },

    #[error("unknown schedule kind '{0}' (expected once, daily, weekly or monthly)")]
    UnknownKind(String),

    #[error("invalid job: {0}")]
    InvalidJob(#[from] DispatchError),

    #[error("job store: {0}")]
    Store(String),

    #[error("job store is corrupt: {0}")]
    CorruptStore(String),
}

impl From<ScheduleError> for SheetmailError {
    fn from(e: ScheduleError) -> Self {
        SheetmailError::Schedule(e.to_string())
    }
}
