//! Fatal dispatch errors. Everything per-row is a [`crate::RowStatus`] instead.

use sheetmail_core::SheetmailError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dataset has no rows")]
    EmptyDataset,

    #[error("template has no {0}")]
    MissingTemplate(&'static str),

    #[error("invalid send options: {0}")]
    InvalidOptions(String),

    #[error("dispatch task aborted: {0}")]
    Aborted(String),
}

impl From<DispatchError> for SheetmailError {
    fn from(e: DispatchError) -> Self {
        SheetmailError::InvalidInput(e.to_string())
    }
}
