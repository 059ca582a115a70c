//! Anonymous usage telemetry over HTTP.
//!
//! Events are buffered in memory and posted in one batch on `flush`:
//! `{installId, platform, appVersion, events: [{event, ts, ...}]}`.
//! Delivery is best effort. A failed post is logged and the batch dropped.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sheetmail_core::config::TelemetryConfig;
use sheetmail_core::{Result, SheetmailError, TelemetryEvent, TelemetryRecord, TelemetrySink};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryBatch<'a> {
    pub install_id: &'a str,
    pub platform: &'a str,
    pub app_version: &'a str,
    pub events: &'a [TelemetryRecord],
}

pub struct TelemetryReporter {
    client: reqwest::Client,
    endpoint: String,
    install_id: String,
    app_version: String,
    enabled: bool,
    pending: Mutex<Vec<TelemetryRecord>>,
}

impl TelemetryReporter {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            endpoint: config.endpoint.clone(),
            install_id: config.install_id.clone(),
            app_version: config.app_version.clone(),
            enabled: config.enabled && !config.install_id.is_empty(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn take_pending(&self) -> Vec<TelemetryRecord> {
        match self.pending.lock() {
            Ok(mut p) => std::mem::take(&mut *p),
            Err(_) => Vec::new(),
        }
    }

    /// Post everything buffered so far. Returns how many events went out.
    pub async fn flush(&self) -> Result<usize> {
        let events = self.take_pending();
        if events.is_empty() {
            return Ok(0);
        }
        let batch = TelemetryBatch {
            install_id: &self.install_id,
            platform: std::env::consts::OS,
            app_version: &self.app_version,
            events: &events,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&batch)
            .send()
            .await
            .map_err(|e| SheetmailError::Telemetry(format!("post: {e}")))?;
        if !resp.status().is_success() {
            return Err(SheetmailError::Telemetry(format!("collector returned {}", resp.status())));
        }
        tracing::debug!("📈 Sent {} telemetry events", events.len());
        Ok(events.len())
    }

    /// `flush` that only logs failures.
    pub async fn flush_quietly(&self) {
        if let Err(e) = self.flush().await {
            tracing::debug!("⚠️ Telemetry dropped: {e}");
        }
    }
}

impl TelemetrySink for TelemetryReporter {
    fn record(&self, event: TelemetryEvent) {
        if !self.enabled {
            return;
        }
        if let Ok(mut p) = self.pending.lock() {
            p.push(TelemetryRecord { event, ts: Utc::now() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool) -> TelemetryConfig {
        TelemetryConfig {
            enabled,
            endpoint: "http://127.0.0.1:9/telemetry".into(),
            install_id: "install-1".into(),
            ..TelemetryConfig::default()
        }
    }

    #[test]
    fn test_disabled_records_nothing() {
        let r = TelemetryReporter::new(&config(false));
        r.record(TelemetryEvent::AppStart);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn test_batch_wire_shape() {
        let events = vec![TelemetryRecord {
            event: TelemetryEvent::EmailSent { count: 4 },
            ts: Utc::now(),
        }];
        let batch = TelemetryBatch {
            install_id: "install-1",
            platform: "linux",
            app_version: "0.2.0",
            events: &events,
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["installId"], "install-1");
        assert_eq!(json["appVersion"], "0.2.0");
        assert_eq!(json["events"][0]["event"], "email_sent");
        assert_eq!(json["events"][0]["count"], 4);
    }

    #[tokio::test]
    async fn test_failed_flush_drops_batch() {
        let r = TelemetryReporter::new(&config(true));
        r.record(TelemetryEvent::AppStart);
        r.record(TelemetryEvent::TestEmailSent);
        assert_eq!(r.pending(), 2);
        assert!(r.flush().await.is_err());
        assert_eq!(r.pending(), 0);
        assert_eq!(r.flush().await.unwrap(), 0);
    }
}
