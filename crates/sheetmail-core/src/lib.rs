//! # Sheetmail Core
//!
//! Shared building blocks for spreadsheet-driven email campaigns.
//!
//! ## Architecture
//! ```text
//! SheetSource ──fetch──▶ DataSet (headers + DataRow…)
//!                           │
//! Template ──render per row─┤
//!                           ▼
//!                     OutgoingEmail ──▶ MailTransport
//!                                         └─ TelemetrySink (optional)
//! ```
//!
//! Everything in here is collaborator-agnostic: concrete transports and sheet
//! sources live in `sheetmail-channels`.

pub mod config;
pub mod error;
pub mod locator;
pub mod traits;
pub mod types;

pub use config::SheetmailConfig;
pub use error::{Result, SheetmailError};
pub use traits::{
    MailTransport, NoopTelemetry, SheetSource, TelemetryEvent, TelemetryRecord, TelemetrySink,
};
pub use types::{AttachmentBlob, DataRow, DataSet, OutgoingEmail, SenderIdentity, Template};
