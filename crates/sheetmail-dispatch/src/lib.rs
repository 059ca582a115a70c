//! # Sheetmail Dispatch
//!
//! Turns a dataset plus a template into one personalised email per row,
//! sent through any [`sheetmail_core::MailTransport`].
//!
//! - fixed delay between consecutive rows
//! - longer pause after every `batch_size` processed rows
//! - per-row failures are recorded, never fatal
//! - cancellable between rows, via token or [`DispatchHandle`]

pub mod attachments;
pub mod engine;
pub mod error;
pub mod handle;
pub mod report;
pub mod sender;

pub use attachments::{AttachmentIssue, AttachmentSet, SkippedAttachment, load_attachments};
pub use engine::{DispatchEngine, DispatchSettings, ProgressCallback, SendOptions, check_template, recipient_column};
pub use error::DispatchError;
pub use handle::DispatchHandle;
pub use report::{DispatchReport, FailureReason, RowOutcome, RowStatus, RunState};
pub use sender::{ResolvedSender, SenderRequest, choose_sender, resolve_sender};
pub use tokio_util::sync::CancellationToken;
