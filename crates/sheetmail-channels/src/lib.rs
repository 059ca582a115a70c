//! # Sheetmail Channels
//! Concrete collaborators for the core traits:
//! - [`SmtpTransport`]: `MailTransport` over async SMTP (lettre)
//! - [`CsvSheetSource`]: `SheetSource` over CSV exports on disk
//! - [`TelemetryReporter`]: buffered `TelemetrySink` posting to a collector

pub mod csv_sheets;
pub mod smtp;
pub mod telemetry;

pub use csv_sheets::{CsvSheetSource, detect_delimiter, parse_csv};
pub use smtp::{SmtpTransport, build_message};
pub use telemetry::{TelemetryBatch, TelemetryReporter};
