//! Scheduler Engine — owns the job registry and fires due jobs.
//!
//! One [`CampaignScheduler`] per process, shared as `Arc<Mutex<_>>` between
//! the tick loop and whoever edits jobs. The lock covers every
//! load-modify-save sequence but is released while a job runs, so cancelling
//! a running job reaches its token.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use sheetmail_core::{NoopTelemetry, TelemetryEvent, TelemetrySink};
use sheetmail_dispatch::check_template;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cadence::Cadence;
use crate::error::ScheduleError;
use crate::jobs::{JobSpec, JobStatus, ScheduledJob};
use crate::runner::JobRunner;
use crate::store::JobStore;

struct Entry {
    job: ScheduledJob,
    cadence: Option<Cadence>,
    next_run: Option<NaiveDateTime>,
    cancel: CancellationToken,
}

impl Entry {
    fn register(job: ScheduledJob, cadence: Option<Cadence>, now: NaiveDateTime) -> Self {
        let next_run = match (&cadence, job.is_active()) {
            (Some(c), true) => c.first_fire(now),
            _ => None,
        };
        Self {
            job,
            cadence,
            next_run,
            cancel: CancellationToken::new(),
        }
    }
}

/// A job whose trigger fired, detached from the registry while it runs.
#[derive(Debug, Clone)]
pub struct DueJob {
    pub job: ScheduledJob,
    pub fired_at: NaiveDateTime,
    pub cancel: CancellationToken,
}

/// Result of one executed job, as the tick loop saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRunSummary {
    pub job_id: String,
    pub name: String,
    pub sent: usize,
    pub failed: usize,
    pub error: Option<String>,
}

pub struct CampaignScheduler {
    entries: Vec<Entry>,
    store: JobStore,
    telemetry: Arc<dyn TelemetrySink>,
}

impl CampaignScheduler {
    /// Load persisted jobs and re-register their triggers against `now`.
    /// An unreadable store starts empty. A corrupt one is moved aside first so
    /// the next save cannot overwrite it. A job whose time no longer parses
    /// is kept as `Failed`.
    pub fn restore(store: JobStore, now: NaiveDateTime) -> Self {
        let jobs = match store.load() {
            Ok(jobs) => jobs,
            Err(e @ ScheduleError::CorruptStore(_)) => {
                match store.quarantine() {
                    Ok(moved) => tracing::error!("❌ {e}. Moved to {}, starting empty", moved.display()),
                    Err(qe) => tracing::error!("❌ {e}. {qe}"),
                }
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to load scheduled jobs: {e}");
                Vec::new()
            }
        };

        let mut entries = Vec::with_capacity(jobs.len());
        for mut job in jobs {
            let cadence = match job.cadence() {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!("⚠️ Job '{}' ({}) has a bad schedule: {e}", job.name, job.id);
                    if job.is_active() {
                        job.status = JobStatus::Failed;
                    }
                    None
                }
            };
            entries.push(Entry::register(job, cadence, now));
        }

        let active = entries.iter().filter(|e| e.next_run.is_some()).count();
        tracing::info!("📅 Restored {} scheduled jobs ({active} active)", entries.len());
        Self {
            entries,
            store,
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Validate, register and persist a new job.
    pub fn create_job(&mut self, spec: JobSpec, now: NaiveDateTime) -> Result<String, ScheduleError> {
        let cadence = Cadence::parse(spec.kind, &spec.schedule_time)?;
        check_template(&spec.template, spec.batch_size)?;
        let job = ScheduledJob::new(spec);
        let id = job.id.clone();
        let kind = job.kind;

        let entry = Entry::register(job, Some(cadence), now);
        tracing::info!(
            "📅 Job added: '{}' ({id}) {kind} {}, next run {:?}",
            entry.job.name,
            entry.job.schedule_time,
            entry.next_run
        );
        self.entries.push(entry);
        self.save();
        self.telemetry.record(TelemetryEvent::CampaignScheduled {
            cadence: kind.to_string(),
        });
        Ok(id)
    }

    /// Remove a job and stop it if it is running. `false` if the id is unknown.
    pub fn cancel_job(&mut self, id: &str) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.job.id == id) else {
            tracing::warn!("⚠️ Cancel requested for unknown job {id}");
            return false;
        };
        let entry = self.entries.remove(pos);
        entry.cancel.cancel();
        tracing::info!("🗑️ Job cancelled: '{}' ({id})", entry.job.name);
        self.save();
        true
    }

    pub fn list_jobs(&self) -> Vec<ScheduledJob> {
        self.entries.iter().map(|e| e.job.clone()).collect()
    }

    pub fn get_job(&self, id: &str) -> Option<ScheduledJob> {
        self.entries.iter().find(|e| e.job.id == id).map(|e| e.job.clone())
    }

    pub fn next_run_time(&self, id: &str) -> Option<NaiveDateTime> {
        self.entries.iter().find(|e| e.job.id == id)?.next_run
    }

    pub fn job_count(&self) -> usize {
        self.entries.len()
    }

    /// Collect jobs whose trigger is at or before `now` and advance their
    /// triggers. Monthly triggers off day 1 advance without being returned.
    pub fn take_due(&mut self, now: NaiveDateTime) -> Vec<DueJob> {
        let mut due = Vec::new();
        for entry in self.entries.iter_mut() {
            let (Some(cadence), Some(fire_at)) = (entry.cadence, entry.next_run) else {
                continue;
            };
            if fire_at > now {
                continue;
            }
            entry.next_run = cadence.next_after(now);
            if !cadence.should_execute(now) {
                tracing::debug!("⏭️ Monthly job '{}' waits for the 1st", entry.job.name);
                continue;
            }
            tracing::info!("🔔 Job triggered: '{}'", entry.job.name);
            due.push(DueJob {
                job: entry.job.clone(),
                fired_at: now,
                cancel: entry.cancel.clone(),
            });
        }
        due
    }

    /// Record a finished execution. One-shot jobs become `Completed` whatever
    /// the result. Ignored if the job was cancelled meanwhile.
    pub fn record_run(&mut self, id: &str, fired_at: NaiveDateTime, tally: Option<(usize, usize)>) {
        let Some(entry) = self.entries.iter_mut().find(|e| e.job.id == id) else {
            return;
        };
        let job = &mut entry.job;
        job.last_run = Some(fired_at);
        job.run_count += 1;
        if let Some((sent, failed)) = tally {
            job.last_sent = Some(sent);
            job.last_failed = Some(failed);
        }
        if !job.kind.is_recurring() {
            job.status = JobStatus::Completed;
            entry.next_run = None;
        }
        self.save();
    }

    /// In-memory state stays authoritative when the store is unwritable.
    fn save(&self) {
        let jobs: Vec<ScheduledJob> = self.entries.iter().map(|e| e.job.clone()).collect();
        if let Err(e) = self.store.save(&jobs) {
            tracing::warn!("⚠️ Failed to save jobs: {e}");
        }
    }
}

/// Run every job due at `now`, one after another.
/// A failing job is logged and never stops the others.
pub async fn run_due(
    scheduler: &Mutex<CampaignScheduler>,
    runner: &dyn JobRunner,
    now: NaiveDateTime,
) -> Vec<JobRunSummary> {
    let (due, telemetry) = {
        let mut sched = scheduler.lock().await;
        (sched.take_due(now), sched.telemetry.clone())
    };

    let mut summaries = Vec::with_capacity(due.len());
    for DueJob { job, fired_at, cancel } in due {
        tracing::info!("🚀 Executing scheduled job: '{}'", job.name);
        let summary = match runner.run(&job, &cancel).await {
            Ok(report) => {
                tracing::info!("✅ Job '{}' completed: {} sent, {} failed", job.name, report.sent, report.failed);
                telemetry.record(TelemetryEvent::CampaignRun {
                    sent: report.sent as u32,
                    failed: report.failed as u32,
                });
                JobRunSummary {
                    job_id: job.id.clone(),
                    name: job.name.clone(),
                    sent: report.sent,
                    failed: report.failed,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!("❌ Job '{}' ({}) failed: {e}", job.name, job.id);
                JobRunSummary {
                    job_id: job.id.clone(),
                    name: job.name.clone(),
                    sent: 0,
                    failed: 0,
                    error: Some(e.to_string()),
                }
            }
        };

        let tally = summary.error.is_none().then_some((summary.sent, summary.failed));
        scheduler.lock().await.record_run(&job.id, fired_at, tally);
        summaries.push(summary);
    }
    summaries
}

/// Spawn-able scheduler loop: ticks every `tick`, runs due jobs against the
/// local wall clock, and returns when `shutdown` is cancelled.
pub async fn spawn_scheduler(
    scheduler: Arc<Mutex<CampaignScheduler>>,
    runner: Arc<dyn JobRunner>,
    tick: Duration,
    shutdown: CancellationToken,
) {
    tracing::info!("⏰ Scheduler started (check every {}s)", tick.as_secs());
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }
        let now = Local::now().naive_local();
        run_due(&scheduler, runner.as_ref(), now).await;
    }
    tracing::info!("⏹️ Scheduler stopped");
}
