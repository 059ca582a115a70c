//! Executes a fired job: fresh data from the sheet source, then a dispatch run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sheetmail_core::{Result, SheetSource};
use sheetmail_dispatch::{DispatchEngine, DispatchReport, SendOptions};
use tokio_util::sync::CancellationToken;

use crate::jobs::ScheduledJob;

/// Runs one job snapshot to completion.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &ScheduledJob, cancel: &CancellationToken) -> Result<DispatchReport>;
}

/// Production runner backed by a [`SheetSource`] and a [`DispatchEngine`].
pub struct CampaignRunner {
    sheets: Arc<dyn SheetSource>,
    engine: Arc<DispatchEngine>,
    defaults: SendOptions,
}

impl CampaignRunner {
    /// `defaults` supplies everything a job does not store itself
    /// (sender, attachments, signature flag).
    pub fn new(sheets: Arc<dyn SheetSource>, engine: Arc<DispatchEngine>, defaults: SendOptions) -> Self {
        Self {
            sheets,
            engine,
            defaults,
        }
    }
}

#[async_trait]
impl JobRunner for CampaignRunner {
    async fn run(&self, job: &ScheduledJob, cancel: &CancellationToken) -> Result<DispatchReport> {
        let dataset = self.sheets.fetch(&job.sheet_url, &job.sheet_name).await?;
        tracing::info!("📊 Loaded {} rows from '{}' for job '{}'", dataset.len(), job.sheet_name, job.name);

        let options = SendOptions {
            batch_size: job.batch_size,
            time_gap: Duration::from_secs(job.time_gap_secs),
            ..self.defaults.clone()
        };
        let report = self.engine.send_bulk(&dataset, &job.template, &options, cancel).await?;
        Ok(report)
    }
}
