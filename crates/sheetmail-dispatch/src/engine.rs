//! Dispatch Engine — walks a dataset row by row and sends one message per row.
//!
//! Per row: find the recipient, render subject/body/html, append the
//! signature, attach the prepared files, send through the transport, report
//! progress. Between rows it sleeps `time_gap`; after every `batch_size`
//! processed rows it rests for the longer batch pause.
//!
//! Only malformed input aborts a run. Every per-row problem becomes a failed
//! row and the loop moves on. Cancellation is checked between rows.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sheetmail_core::config::DispatchConfig;
use sheetmail_core::{
    DataRow, DataSet, MailTransport, NoopTelemetry, OutgoingEmail, SenderIdentity, TelemetryEvent,
    TelemetrySink, Template,
};
use sheetmail_template::{append_signature, append_signature_html, html_to_text, render_template};
use tokio_util::sync::CancellationToken;

use crate::attachments::{AttachmentSet, load_attachments};
use crate::error::DispatchError;
use crate::report::{DispatchReport, FailureReason, RowOutcome, RowStatus, RunState};
use crate::sender::{SenderRequest, resolve_sender};

/// Called after every row with `(percent_complete, sent_so_far, failed_so_far)`.
/// Runs on the dispatch task, not the caller's thread.
pub type ProgressCallback = Arc<dyn Fn(f64, usize, usize) + Send + Sync>;

/// Engine-wide limits that do not change between runs.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub batch_pause: Duration,
    pub max_attachment_bytes: u64,
    /// Upper bound on a single transport call. `None` waits forever.
    pub send_timeout: Option<Duration>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(cfg: &DispatchConfig) -> Self {
        Self {
            batch_pause: Duration::from_secs(cfg.batch_pause_secs),
            max_attachment_bytes: cfg.max_attachment_bytes(),
            send_timeout: (cfg.send_timeout_secs > 0)
                .then(|| Duration::from_secs(cfg.send_timeout_secs)),
        }
    }
}

/// Per-run options.
#[derive(Clone)]
pub struct SendOptions {
    pub batch_size: usize,
    pub time_gap: Duration,
    pub sender: SenderRequest,
    pub attachments: Vec<PathBuf>,
    pub include_signature: bool,
    pub progress: Option<ProgressCallback>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for SendOptions {
    fn from(cfg: &DispatchConfig) -> Self {
        Self {
            batch_size: cfg.batch_size,
            time_gap: Duration::from_secs(cfg.time_gap_secs),
            sender: SenderRequest::default(),
            attachments: Vec::new(),
            include_signature: cfg.include_signature,
            progress: None,
        }
    }
}

impl std::fmt::Debug for SendOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendOptions")
            .field("batch_size", &self.batch_size)
            .field("time_gap", &self.time_gap)
            .field("sender", &self.sender)
            .field("attachments", &self.attachments)
            .field("include_signature", &self.include_signature)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// In-flight bookkeeping for one run. Never shared between runs.
struct SendJob {
    total: usize,
    processed: usize,
    sent: usize,
    failed: usize,
    skipped: usize,
    batch: usize,
    batch_pauses: usize,
    state: RunState,
    started_at: DateTime<Utc>,
    clock: Instant,
    rows: Vec<RowOutcome>,
}

impl SendJob {
    fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            sent: 0,
            failed: 0,
            skipped: 0,
            batch: 0,
            batch_pauses: 0,
            state: RunState::NotStarted,
            started_at: Utc::now(),
            clock: Instant::now(),
            rows: Vec::with_capacity(total),
        }
    }

    fn record(&mut self, outcome: RowOutcome) {
        match outcome.status {
            RowStatus::Sent => {
                self.sent += 1;
                self.processed += 1;
            }
            RowStatus::Failed(_) => {
                self.failed += 1;
                self.processed += 1;
            }
            RowStatus::Skipped => self.skipped += 1,
        }
        self.rows.push(outcome);
    }

    fn percent(&self, visited: usize) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            visited as f64 / self.total as f64 * 100.0
        }
    }

    fn finish(self, sender: SenderIdentity, attachments: &AttachmentSet) -> DispatchReport {
        DispatchReport {
            state: self.state,
            total: self.total,
            processed: self.processed,
            sent: self.sent,
            failed: self.failed,
            skipped: self.skipped,
            batch_pauses: self.batch_pauses,
            sender,
            skipped_attachments: attachments.skipped.clone(),
            rows: self.rows,
            started_at: self.started_at,
            elapsed: self.clock.elapsed(),
        }
    }
}

/// Everything resolved once per run and shared by every row.
struct RunContext<'a> {
    template: &'a Template,
    recipient_column: Option<usize>,
    sender: SenderIdentity,
    signature: Option<String>,
    include_signature: bool,
    attachments: AttachmentSet,
}

/// First header that looks like an email column.
pub fn recipient_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.to_lowercase().contains("mail"))
}

/// Sleep that ends early when the run is cancelled.
async fn pause(duration: Duration, cancel: &CancellationToken) {
    if duration.is_zero() {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = cancel.cancelled() => {}
    }
}

/// Data-independent pre-flight: subject, body (text or HTML) and batch size.
/// Callers that store a template for later sends run this up front.
pub fn check_template(template: &Template, batch_size: usize) -> Result<(), DispatchError> {
    if template.subject.trim().is_empty() {
        return Err(DispatchError::MissingTemplate("subject"));
    }
    let html_empty = template.html.as_deref().is_none_or(|h| h.trim().is_empty());
    if template.body.trim().is_empty() && html_empty {
        return Err(DispatchError::MissingTemplate("body"));
    }
    if batch_size == 0 {
        return Err(DispatchError::InvalidOptions("batch size must be at least 1".into()));
    }
    Ok(())
}

/// Bulk sender bound to one transport.
pub struct DispatchEngine {
    transport: Arc<dyn MailTransport>,
    settings: DispatchSettings,
    telemetry: Arc<dyn TelemetrySink>,
}

impl DispatchEngine {
    pub fn new(transport: Arc<dyn MailTransport>, settings: DispatchSettings) -> Self {
        Self {
            transport,
            settings,
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn transport(&self) -> &Arc<dyn MailTransport> {
        &self.transport
    }

    fn check_input(dataset: &DataSet, template: &Template, options: &SendOptions) -> Result<(), DispatchError> {
        if dataset.is_empty() {
            return Err(DispatchError::EmptyDataset);
        }
        check_template(template, options.batch_size)
    }

    async fn signature_text(&self, include: bool) -> Option<String> {
        if !include {
            return None;
        }
        match self.transport.signature_html().await {
            Ok(Some(html)) => Some(html_to_text(&html)).filter(|s| !s.is_empty()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("⚠️ Could not fetch signature: {e}");
                None
            }
        }
    }

    async fn prepare<'a>(&self, template: &'a Template, headers: &[String], options: &SendOptions) -> RunContext<'a> {
        let sender = resolve_sender(self.transport.as_ref(), &options.sender).await;
        let signature = self.signature_text(options.include_signature).await;
        let attachments = load_attachments(&options.attachments, self.settings.max_attachment_bytes).await;
        RunContext {
            template,
            recipient_column: recipient_column(headers),
            sender: sender.identity,
            signature,
            include_signature: options.include_signature,
            attachments,
        }
    }

    async fn deliver(&self, email: &OutgoingEmail) -> RowStatus {
        let send = self.transport.send(email);
        let result = match self.settings.send_timeout {
            Some(limit) => match tokio::time::timeout(limit, send).await {
                Ok(r) => r,
                Err(_) => return RowStatus::Failed(FailureReason::Timeout(limit)),
            },
            None => send.await,
        };
        match result {
            Ok(()) => RowStatus::Sent,
            Err(e) => RowStatus::Failed(FailureReason::Transport(e.to_string())),
        }
    }

    fn build_email(&self, ctx: &RunContext<'_>, to: &str, row: Option<&DataRow>) -> (OutgoingEmail, Vec<String>) {
        let (subject, body, html, unresolved) = match row {
            Some(row) => {
                let r = render_template(ctx.template, row);
                (r.subject, r.body, r.html, r.unresolved.into_iter().collect())
            }
            None => (
                ctx.template.subject.clone(),
                ctx.template.body.clone(),
                ctx.template.html.clone(),
                Vec::new(),
            ),
        };
        let sig = ctx.signature.as_deref().unwrap_or_default();
        let email = OutgoingEmail {
            to: to.to_string(),
            from: ctx.sender.clone(),
            subject,
            body_text: append_signature(&body, sig, ctx.include_signature),
            body_html: html.map(|h| append_signature_html(&h, sig, ctx.include_signature)),
            attachments: ctx.attachments.included.clone(),
        };
        (email, unresolved)
    }

    async fn process_row(&self, ctx: &RunContext<'_>, index: usize, row: &DataRow) -> RowOutcome {
        if row.is_blank() {
            return RowOutcome {
                row: index,
                recipient: None,
                status: RowStatus::Skipped,
                unresolved: Vec::new(),
            };
        }

        let Some(col) = ctx.recipient_column else {
            tracing::warn!("❌ Row {index}: no email column found");
            return RowOutcome {
                row: index,
                recipient: None,
                status: RowStatus::Failed(FailureReason::NoRecipientColumn),
                unresolved: Vec::new(),
            };
        };

        let to = row.value_at(col).unwrap_or_default().trim().to_string();
        if to.is_empty() || !to.contains('@') {
            tracing::warn!("❌ Row {index}: invalid email address '{to}'");
            return RowOutcome {
                row: index,
                recipient: Some(to.clone()),
                status: RowStatus::Failed(FailureReason::InvalidRecipient(to)),
                unresolved: Vec::new(),
            };
        }

        let (email, unresolved) = self.build_email(ctx, &to, Some(row));
        if !unresolved.is_empty() {
            tracing::warn!("⚠️ Row {index}: unresolved placeholders {:?}", unresolved);
        }

        let status = self.deliver(&email).await;
        match &status {
            RowStatus::Sent => tracing::info!("📤 Email sent to: {to}"),
            RowStatus::Failed(reason) => tracing::warn!("❌ Failed to send email to {to}: {reason}"),
            RowStatus::Skipped => {}
        }
        RowOutcome {
            row: index,
            recipient: Some(to),
            status,
            unresolved,
        }
    }

    /// Send one rendered message per row of `dataset`.
    ///
    /// Returns `Err` only for malformed input, before anything is sent.
    pub async fn send_bulk(
        &self,
        dataset: &DataSet,
        template: &Template,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, DispatchError> {
        if let Err(e) = Self::check_input(dataset, template, options) {
            tracing::error!("❌ Bulk send rejected: {e}");
            return Err(e);
        }

        let mut job = SendJob::new(dataset.len());
        let ctx = self.prepare(template, dataset.headers(), options).await;
        job.state = RunState::Running;
        tracing::info!(
            "🚀 Starting bulk send: {} rows via {} as {}",
            job.total,
            self.transport.name(),
            ctx.sender.mailbox()
        );

        // Trailing blank rows are skipped, so the final gap is decided by the last real row.
        let last = dataset.rows().iter().rposition(|r| !r.is_blank());
        for (i, row) in dataset.rows().iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("🛑 Bulk send cancelled before row {i}");
                job.state = RunState::Cancelled;
                break;
            }

            let outcome = self.process_row(&ctx, i, row).await;
            let counted = !matches!(outcome.status, RowStatus::Skipped);
            job.record(outcome);

            if let Some(cb) = &options.progress {
                cb(job.percent(i + 1), job.sent, job.failed);
            }

            if Some(i) == last || !counted {
                continue;
            }
            pause(options.time_gap, cancel).await;

            if job.processed % options.batch_size == 0 {
                job.batch += 1;
                job.batch_pauses += 1;
                tracing::info!(
                    "⏸️ Completed batch {}. Pausing for {}s...",
                    job.batch,
                    self.settings.batch_pause.as_secs()
                );
                pause(self.settings.batch_pause, cancel).await;
            }
        }

        if job.state == RunState::Running {
            job.state = RunState::Completed;
        }
        if job.sent > 0 {
            self.telemetry.record(TelemetryEvent::EmailSent { count: job.sent as u32 });
        }

        let report = job.finish(ctx.sender.clone(), &ctx.attachments);
        tracing::info!("✅ Bulk send finished. {report}");
        Ok(report)
    }

    /// Send one message to `to`, e.g. a test email before a campaign.
    /// With a `sample` row the template is rendered against it first.
    pub async fn send_test(
        &self,
        to: &str,
        template: &Template,
        sample: Option<&DataRow>,
        options: &SendOptions,
    ) -> Result<RowOutcome, DispatchError> {
        if template.subject.trim().is_empty() {
            return Err(DispatchError::MissingTemplate("subject"));
        }
        let to = to.trim();
        if !to.contains('@') {
            return Ok(RowOutcome {
                row: 0,
                recipient: Some(to.to_string()),
                status: RowStatus::Failed(FailureReason::InvalidRecipient(to.to_string())),
                unresolved: Vec::new(),
            });
        }

        let ctx = self.prepare(template, &[], options).await;
        let (email, unresolved) = self.build_email(&ctx, to, sample);
        let status = self.deliver(&email).await;
        if status == RowStatus::Sent {
            tracing::info!("🧪 Test email sent to {to}");
            self.telemetry.record(TelemetryEvent::TestEmailSent);
        }
        Ok(RowOutcome {
            row: 0,
            recipient: Some(to.to_string()),
            status,
            unresolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sheetmail_core::{Result as CoreResult, SheetmailError};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryTransport {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail_for: Vec<String>,
        aliases: Vec<SenderIdentity>,
        signature: Option<String>,
    }

    #[async_trait]
    impl MailTransport for MemoryTransport {
        fn name(&self) -> &str {
            "memory"
        }

        fn primary_identity(&self) -> SenderIdentity {
            SenderIdentity::new("me@x.com")
        }

        async fn send(&self, email: &OutgoingEmail) -> CoreResult<()> {
            if self.fail_for.contains(&email.to) {
                return Err(SheetmailError::Transport("550 mailbox unavailable".into()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }

        async fn send_as_identities(&self) -> CoreResult<Vec<SenderIdentity>> {
            Ok(self.aliases.clone())
        }

        async fn signature_html(&self) -> CoreResult<Option<String>> {
            Ok(self.signature.clone())
        }
    }

    fn dataset(n: usize) -> DataSet {
        DataSet::new(
            vec!["Email".into(), "First Name".into()],
            (0..n)
                .map(|i| vec![format!("user{i}@x.com"), format!("User{i}")])
                .collect(),
        )
    }

    fn fast_options(batch_size: usize) -> SendOptions {
        SendOptions {
            batch_size,
            time_gap: Duration::ZERO,
            include_signature: false,
            ..SendOptions::default()
        }
    }

    fn engine(transport: Arc<MemoryTransport>) -> DispatchEngine {
        DispatchEngine::new(transport, DispatchSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_pauses_after_every_nth_row() {
        let transport = Arc::new(MemoryTransport::default());
        let report = engine(transport.clone())
            .send_bulk(&dataset(12), &Template::new("Hi", "Body"), &fast_options(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.batch_pauses, 2);
        assert_eq!(report.sent, 12);
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(transport.sent.lock().unwrap().len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_after_final_row() {
        let transport = Arc::new(MemoryTransport::default());
        let report = engine(transport)
            .send_bulk(&dataset(10), &Template::new("Hi", "Body"), &fast_options(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.batch_pauses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_blank_rows_get_no_gap_or_pause() {
        let transport = Arc::new(MemoryTransport::default());
        let mut ds_rows: Vec<Vec<String>> = (0..10)
            .map(|i| vec![format!("user{i}@x.com"), format!("User{i}")])
            .collect();
        ds_rows.push(vec![String::new(), String::new()]);
        ds_rows.push(vec![" ".into(), String::new()]);
        let ds = DataSet::new(vec!["Email".into(), "First Name".into()], ds_rows);

        let mut opts = fast_options(5);
        opts.time_gap = Duration::from_secs(5);
        let engine = engine(transport.clone());
        let started = tokio::time::Instant::now();
        let report = engine
            .send_bulk(&ds, &Template::new("Hi", "Body"), &opts, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.processed, 10);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.batch_pauses, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(9 * 5) + engine.settings().batch_pause);
        assert_eq!(transport.sent.lock().unwrap().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_gap_between_rows_only() {
        let transport = Arc::new(MemoryTransport::default());
        let mut opts = fast_options(100);
        opts.time_gap = Duration::from_secs(5);
        let started = tokio::time::Instant::now();
        engine(transport)
            .send_bulk(&dataset(4), &Template::new("Hi", "Body"), &opts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_renders_per_row_and_keeps_sentinel() {
        let transport = Arc::new(MemoryTransport::default());
        let template = Template::new("Hi ((firstname))", "From ((Company))");
        let report = engine(transport.clone())
            .send_bulk(&dataset(2), &template, &fast_options(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.sent, 2);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].subject, "Hi User0");
        assert_eq!(sent[1].subject, "Hi User1");
        assert_eq!(sent[0].body_text, "From [Company]");
        assert_eq!(report.rows[0].unresolved, vec!["Company".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_row_failures_never_abort() {
        let transport = Arc::new(MemoryTransport {
            fail_for: vec!["user1@x.com".into()],
            ..Default::default()
        });
        let ds = DataSet::new(
            vec!["E-mail".into(), "Name".into()],
            vec![
                vec!["user0@x.com".into(), "A".into()],
                vec!["user1@x.com".into(), "B".into()],
                vec!["not-an-address".into(), "C".into()],
                vec!["".into(), "".into()],
                vec!["user4@x.com".into(), "E".into()],
            ],
        );
        let report = engine(transport)
            .send_bulk(&ds, &Template::new("s", "b"), &fast_options(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 4);
        assert_eq!(report.sent + report.failed, report.processed);
        assert!(report.processed <= report.total);
        assert!(matches!(report.rows[1].status, RowStatus::Failed(FailureReason::Transport(_))));
        assert!(matches!(report.rows[2].status, RowStatus::Failed(FailureReason::InvalidRecipient(_))));
        assert_eq!(report.rows[3].status, RowStatus::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_email_column_fails_every_row() {
        let transport = Arc::new(MemoryTransport::default());
        let ds = DataSet::new(vec!["Name".into()], vec![vec!["Ann".into()], vec!["Bob".into()]]);
        let report = engine(transport)
            .send_bulk(&ds, &Template::new("s", "b"), &fast_options(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.rows[0].status, RowStatus::Failed(FailureReason::NoRecipientColumn));
    }

    #[tokio::test]
    async fn test_empty_dataset_is_fatal() {
        let transport = Arc::new(MemoryTransport::default());
        let err = engine(transport.clone())
            .send_bulk(&dataset(0), &Template::new("s", "b"), &fast_options(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::EmptyDataset));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_subject_or_body_rejected() {
        let transport = Arc::new(MemoryTransport::default());
        let eng = engine(transport);
        let cancel = CancellationToken::new();
        let err = eng
            .send_bulk(&dataset(1), &Template::new(" ", "b"), &fast_options(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingTemplate("subject")));
        let err = eng
            .send_bulk(&dataset(1), &Template::new("s", ""), &fast_options(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingTemplate("body")));
        // An HTML-only body is fine.
        let ok = eng
            .send_bulk(&dataset(1), &Template::new("s", "").with_html("<p>hi</p>"), &fast_options(5), &cancel)
            .await;
        assert!(ok.is_ok());
        let err = eng
            .send_bulk(&dataset(1), &Template::new("s", "b"), &fast_options(0), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidOptions(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_rows_preserves_counts() {
        let transport = Arc::new(MemoryTransport::default());
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut opts = fast_options(50);
        let (c, k) = (calls.clone(), cancel.clone());
        opts.progress = Some(Arc::new(move |_pct, sent, _failed| {
            c.fetch_add(1, Ordering::SeqCst);
            if sent == 3 {
                k.cancel();
            }
        }));
        let report = engine(transport.clone())
            .send_bulk(&dataset(10), &Template::new("s", "b"), &opts, &cancel)
            .await
            .unwrap();
        assert_eq!(report.state, RunState::Cancelled);
        assert_eq!(report.sent, 3);
        assert_eq!(report.processed, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(transport.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reports_percent() {
        let transport = Arc::new(MemoryTransport::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut opts = fast_options(50);
        let s = seen.clone();
        opts.progress = Some(Arc::new(move |pct, sent, failed| {
            s.lock().unwrap().push((pct, sent, failed));
        }));
        engine(transport)
            .send_bulk(&dataset(4), &Template::new("s", "b"), &opts, &CancellationToken::new())
            .await
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], (25.0, 1, 0));
        assert_eq!(seen[3], (100.0, 4, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sender_and_signature_applied() {
        let transport = Arc::new(MemoryTransport {
            aliases: vec![SenderIdentity::new("team@x.com").named("Team")],
            signature: Some("<b>Ann</b><br>Sales".into()),
            ..Default::default()
        });
        let mut opts = fast_options(5);
        opts.include_signature = true;
        opts.sender = SenderRequest::new(Some("team@x.com".into()), None);
        let template = Template::new("s", "Hello").with_html("<p>Hello</p>");
        engine(transport.clone())
            .send_bulk(&dataset(1), &template, &opts, &CancellationToken::new())
            .await
            .unwrap();
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].from.mailbox(), "Team <team@x.com>");
        assert_eq!(sent[0].body_text, "Hello\n\n--\nAnn\nSales");
        assert_eq!(sent[0].body_html.as_deref(), Some("<p>Hello</p><br><br>--<br>Ann<br>Sales"));
    }

    #[tokio::test]
    async fn test_attachments_ride_on_every_message() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("menu.pdf");
        std::fs::write(&good, b"%PDF-1.4").unwrap();
        let mut opts = fast_options(5);
        opts.attachments = vec![good, dir.path().join("missing.pdf")];

        let transport = Arc::new(MemoryTransport::default());
        let report = engine(transport.clone())
            .send_bulk(&dataset(2), &Template::new("s", "b"), &opts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.skipped_attachments.len(), 1);
        let sent = transport.sent.lock().unwrap();
        assert!(sent.iter().all(|m| m.attachments.len() == 1));
        assert_eq!(sent[0].attachments[0].filename, "menu.pdf");
    }

    #[tokio::test]
    async fn test_send_test_renders_sample() {
        let transport = Arc::new(MemoryTransport::default());
        let ds = dataset(1);
        let out = engine(transport.clone())
            .send_test("qa@x.com", &Template::new("Hi ((First Name))", "b"), ds.rows().first(), &fast_options(5))
            .await
            .unwrap();
        assert_eq!(out.status, RowStatus::Sent);
        assert_eq!(transport.sent.lock().unwrap()[0].subject, "Hi User0");

        let bad = engine(transport)
            .send_test("nobody", &Template::new("s", "b"), None, &fast_options(5))
            .await
            .unwrap();
        assert!(matches!(bad.status, RowStatus::Failed(FailureReason::InvalidRecipient(_))));
    }

    #[test]
    fn test_recipient_column_detection() {
        let h = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(recipient_column(&h(&["Name", "E-Mail Address"])), Some(1));
        assert_eq!(recipient_column(&h(&["Gmail", "Email"])), Some(0));
        assert_eq!(recipient_column(&h(&["Name", "Phone"])), None);
    }
}
