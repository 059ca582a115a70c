//! Error type shared across the Sheetmail crates.

use thiserror::Error;

/// Top-level Sheetmail error.
#[derive(Debug, Error)]
pub enum SheetmailError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sheet error: {0}")]
    Sheet(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

pub type Result<T> = std::result::Result<T, SheetmailError>;
