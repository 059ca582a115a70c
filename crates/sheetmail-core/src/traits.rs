//! Collaborator seams: mail transport, spreadsheet source, telemetry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{DataSet, OutgoingEmail, SenderIdentity};

/// Sends fully-built messages for one authenticated account.
///
/// Implementations are used sequentially by one dispatch run at a time.
/// Two concurrent runs need two transport instances.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Short transport name for logs ("smtp", "memory", ...).
    fn name(&self) -> &str;

    /// The authenticated account's own address.
    fn primary_identity(&self) -> SenderIdentity;

    /// Send a single message.
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;

    /// Verified alternate "send as" identities (the primary may be included).
    async fn send_as_identities(&self) -> Result<Vec<SenderIdentity>> {
        Ok(Vec::new())
    }

    /// The account's configured signature, as HTML.
    async fn signature_html(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Read-only access to spreadsheets.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Tab names inside the spreadsheet at `locator`.
    async fn sheet_names(&self, locator: &str) -> Result<Vec<String>>;

    /// All rows of one tab: header row + blank-padded data rows.
    async fn fetch(&self, locator: &str, sheet: &str) -> Result<DataSet>;
}

/// Anonymous usage events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    AppStart,
    AuthSuccess,
    EmailSent { count: u32 },
    TestEmailSent,
    CampaignScheduled { cadence: String },
    CampaignRun { sent: u32, failed: u32 },
}

/// A timestamped telemetry event as it goes over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(flatten)]
    pub event: TelemetryEvent,
    pub ts: DateTime<Utc>,
}

/// Receives telemetry events. Must never block or fail the caller.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Telemetry sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let rec = TelemetryRecord {
            event: TelemetryEvent::CampaignRun { sent: 3, failed: 1 },
            ts: Utc::now(),
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["event"], "campaign_run");
        assert_eq!(json["sent"], 3);
        assert!(json.get("ts").is_some());

        let json = serde_json::to_value(TelemetryEvent::AppStart).unwrap();
        assert_eq!(json, serde_json::json!({"event": "app_start"}));
    }
}
