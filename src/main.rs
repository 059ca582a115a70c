//! # Sheetmail — spreadsheet-driven email campaigns
//!
//! Usage:
//!   sheetmail validate --sheet <url> --tab Leads --template welcome
//!   sheetmail send --sheet <url> --tab Leads --subject "Hi ((First Name))" --body-file body.txt
//!   sheetmail schedule add --name weekly --kind weekly --at "monday 10:30" --sheet <url> --tab Leads --template welcome
//!   sheetmail run                        # scheduler loop until Ctrl-C

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use sheetmail_channels::{CsvSheetSource, SmtpTransport, TelemetryReporter};
use sheetmail_core::config::expand_path;
use sheetmail_core::{DataSet, SheetSource, SheetmailConfig, TelemetryEvent, TelemetrySink, Template};
use sheetmail_dispatch::{
    CancellationToken, DispatchEngine, DispatchSettings, RowStatus, SendOptions, SenderRequest,
};
use sheetmail_scheduler::{
    CampaignRunner, CampaignScheduler, JobSpec, JobStore, ScheduleKind, spawn_scheduler,
};
use sheetmail_template::{TemplateRecord, TemplateStore, extract_placeholders, suggest, validate};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sheetmail",
    version,
    about = "📧 Sheetmail — personalised bulk email from spreadsheets"
)]
struct Cli {
    /// Config file (default: ~/.sheetmail/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one email per spreadsheet row
    Send {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        template: TemplateArgs,
        #[command(flatten)]
        send: SendArgs,
    },
    /// Send a single test email, rendered against the first row if a sheet is given
    TestSend {
        #[arg(long)]
        to: String,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long, default_value = "Sheet1")]
        tab: String,
        #[command(flatten)]
        template: TemplateArgs,
        #[command(flatten)]
        send: SendArgs,
    },
    /// Check a template's placeholders against a sheet's headers
    Validate {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        template: TemplateArgs,
    },
    /// List the tabs of a spreadsheet
    Sheets { locator: String },
    /// Manage scheduled campaigns
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
    /// Run the scheduler until Ctrl-C
    Run,
    /// Manage saved templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    Add {
        #[arg(long)]
        name: String,
        /// once | daily | weekly | monthly
        #[arg(long)]
        kind: String,
        /// ISO datetime for once, HH:MM for daily/monthly, "monday 10:30" for weekly
        #[arg(long)]
        at: String,
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        template: TemplateArgs,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        gap: Option<u64>,
    },
    List,
    Cancel { id: String },
    Next { id: String },
}

#[derive(Subcommand)]
enum TemplateAction {
    Save {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        template: TemplateArgs,
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        from_name: Option<String>,
        #[arg(long)]
        no_signature: bool,
    },
    List,
    Show { id: String },
    Delete { id: String },
}

#[derive(Args, Clone)]
struct SourceArgs {
    /// Spreadsheet URL, key= link or bare id
    #[arg(long)]
    sheet: String,
    #[arg(long, default_value = "Sheet1")]
    tab: String,
}

#[derive(Args, Clone, Default)]
struct TemplateArgs {
    /// Saved template id
    #[arg(long = "template")]
    template_id: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    body: Option<String>,
    #[arg(long)]
    body_file: Option<PathBuf>,
    #[arg(long)]
    html_file: Option<PathBuf>,
}

#[derive(Args, Clone, Default)]
struct SendArgs {
    #[arg(long)]
    batch_size: Option<usize>,
    /// Seconds between messages
    #[arg(long)]
    gap: Option<u64>,
    #[arg(long)]
    from: Option<String>,
    #[arg(long)]
    from_name: Option<String>,
    #[arg(long = "attach")]
    attachments: Vec<PathBuf>,
    #[arg(long)]
    no_signature: bool,
}

/// Everything the commands share.
struct App {
    config: SheetmailConfig,
    telemetry: Arc<TelemetryReporter>,
}

impl App {
    fn templates(&self) -> TemplateStore {
        TemplateStore::new(&expand_path(&self.config.templates.dir))
    }

    fn sheets(&self) -> Arc<dyn SheetSource> {
        Arc::new(CsvSheetSource::new(expand_path(&self.config.sheets.root)))
    }

    fn engine(&self) -> Result<Arc<DispatchEngine>> {
        let transport = SmtpTransport::new(self.config.smtp.clone()).context("SMTP transport")?;
        self.telemetry.record(TelemetryEvent::AuthSuccess);
        Ok(Arc::new(
            DispatchEngine::new(Arc::new(transport), DispatchSettings::from(&self.config.dispatch))
                .with_telemetry(self.telemetry.clone()),
        ))
    }

    fn scheduler(&self) -> CampaignScheduler {
        let store = JobStore::new(expand_path(&self.config.scheduler.jobs_file));
        CampaignScheduler::restore(store, Local::now().naive_local()).with_telemetry(self.telemetry.clone())
    }

    /// Resolve template args into a template plus the saved record, if any.
    fn template(&self, args: &TemplateArgs) -> Result<(Template, Option<TemplateRecord>)> {
        let record = match &args.template_id {
            Some(id) => Some(self.templates().load(id).with_context(|| format!("template '{id}'"))?),
            None => None,
        };
        let mut template = record.as_ref().map(|r| r.template.clone()).unwrap_or_default();
        if let Some(s) = &args.subject {
            template.subject = s.clone();
        }
        if let Some(b) = &args.body {
            template.body = b.clone();
        }
        if let Some(p) = &args.body_file {
            template.body = read_text(p)?;
        }
        if let Some(p) = &args.html_file {
            template.html = Some(read_text(p)?);
        }
        if template.subject.trim().is_empty() {
            bail!("no subject: pass --subject or --template");
        }
        Ok((template, record))
    }

    fn send_options(&self, args: &SendArgs, record: Option<&TemplateRecord>) -> SendOptions {
        let mut opts = SendOptions::from(&self.config.dispatch);
        if let Some(n) = args.batch_size {
            opts.batch_size = n;
        }
        if let Some(g) = args.gap {
            opts.time_gap = Duration::from_secs(g);
        }
        let (saved_from, saved_name) = record
            .map(|r| (r.sender_address.clone(), r.sender_name.clone()))
            .unwrap_or_default();
        opts.sender = SenderRequest::new(args.from.clone().or(saved_from), args.from_name.clone().or(saved_name));
        opts.attachments = if args.attachments.is_empty() {
            record.map(|r| r.attachments.clone()).unwrap_or_default()
        } else {
            args.attachments.clone()
        };
        opts.include_signature = opts.include_signature
            && !args.no_signature
            && record.is_none_or(|r| r.include_signature);
        opts
    }

    async fn fetch(&self, source: &SourceArgs) -> Result<DataSet> {
        let ds = self
            .sheets()
            .fetch(&source.sheet, &source.tab)
            .await
            .with_context(|| format!("loading '{}' from {}", source.tab, source.sheet))?;
        Ok(ds)
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "sheetmail=debug,sheetmail_core=debug,sheetmail_template=debug,sheetmail_dispatch=debug,sheetmail_scheduler=debug,sheetmail_channels=debug"
    } else {
        "sheetmail=info,sheetmail_dispatch=info,sheetmail_scheduler=info,sheetmail_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .as_deref()
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
        .unwrap_or_else(SheetmailConfig::default_path);
    let mut config = if config_path.exists() {
        SheetmailConfig::load_from(&config_path)?
    } else {
        SheetmailConfig::default()
    };
    if config.telemetry.enabled && config.telemetry.install_id.is_empty() {
        config.telemetry.ensure_install_id();
        if let Err(e) = config.save_to(&config_path) {
            tracing::warn!("⚠️ Could not persist install id: {e}");
        }
    }

    let app = App {
        telemetry: Arc::new(TelemetryReporter::new(&config.telemetry)),
        config,
    };
    app.telemetry.record(TelemetryEvent::AppStart);

    let result = run(&app, cli.command).await;
    app.telemetry.flush_quietly().await;
    result
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Send { source, template, send } => {
            let (template, record) = app.template(&template)?;
            let dataset = app.fetch(&source).await?;
            let missing = validate(&template, &dataset);
            if !missing.is_empty() {
                tracing::warn!("⚠️ Unresolved placeholders will render as [name]: {missing:?}");
            }
            let options = app.send_options(&send, record.as_ref());
            let engine = app.engine()?;

            let handle = engine.spawn_bulk(dataset, template, options);
            let cancel = handle.cancellation_token();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    println!("🛑 Cancelling after the current row...");
                    cancel.cancel();
                }
            });
            let report = handle.wait().await?;
            ctrl_c.abort();
            println!("{report}");
            for row in report.failures() {
                if let RowStatus::Failed(reason) = &row.status {
                    println!("  ❌ row {}: {} ({reason})", row.row + 1, row.recipient.as_deref().unwrap_or("-"));
                }
            }
        }

        Command::TestSend { to, sheet, tab, template, send } => {
            let (template, record) = app.template(&template)?;
            let sample = match sheet {
                Some(sheet) => Some(app.fetch(&SourceArgs { sheet, tab }).await?),
                None => None,
            };
            let options = app.send_options(&send, record.as_ref());
            let outcome = app
                .engine()?
                .send_test(&to, &template, sample.as_ref().and_then(|d| d.rows().first()), &options)
                .await?;
            match outcome.status {
                RowStatus::Sent => println!("✅ Test email sent to {to}"),
                RowStatus::Failed(reason) => bail!("test email to {to} failed: {reason}"),
                RowStatus::Skipped => {}
            }
        }

        Command::Validate { source, template } => {
            let (template, _) = app.template(&template)?;
            let dataset = app.fetch(&source).await?;
            let mut used = extract_placeholders(&template.subject);
            used.extend(extract_placeholders(&template.body));
            if let Some(html) = &template.html {
                used.extend(extract_placeholders(html));
            }
            println!("📋 {} placeholders, {} rows, headers: {:?}", used.len(), dataset.len(), dataset.headers());
            let missing = validate(&template, &dataset);
            if missing.is_empty() {
                println!("✅ Every placeholder resolves");
            }
            for name in &missing {
                let hints = suggest(name, dataset.headers());
                if hints.is_empty() {
                    println!("❌ (({name})) has no matching column");
                } else {
                    println!("❌ (({name})) has no matching column. Did you mean: {}?", hints.join(", "));
                }
            }
        }

        Command::Sheets { locator } => {
            for name in app.sheets().sheet_names(&locator).await? {
                println!("{name}");
            }
        }

        Command::Schedule { action } => schedule(app, action)?,

        Command::Run => {
            let engine = app.engine()?;
            let runner = Arc::new(CampaignRunner::new(
                app.sheets(),
                engine,
                SendOptions::from(&app.config.dispatch),
            ));
            let scheduler = Arc::new(Mutex::new(app.scheduler()));
            let shutdown = CancellationToken::new();
            let tick = Duration::from_secs(app.config.scheduler.tick_secs.max(1));
            let loop_task = tokio::spawn(spawn_scheduler(scheduler, runner, tick, shutdown.clone()));

            tokio::signal::ctrl_c().await?;
            println!("🛑 Stopping scheduler...");
            shutdown.cancel();
            loop_task.await?;
        }

        Command::Template { action } => template(app, action)?,
    }
    Ok(())
}

fn schedule(app: &App, action: ScheduleAction) -> Result<()> {
    let mut scheduler = app.scheduler();
    match action {
        ScheduleAction::Add { name, kind, at, source, template, batch_size, gap } => {
            let kind: ScheduleKind = kind.parse()?;
            let (template, _) = app.template(&template)?;
            let id = scheduler.create_job(
                JobSpec {
                    name,
                    kind,
                    schedule_time: at,
                    template,
                    sheet_url: source.sheet,
                    sheet_name: source.tab,
                    batch_size: batch_size.unwrap_or(app.config.dispatch.batch_size),
                    time_gap_secs: gap.unwrap_or(app.config.dispatch.time_gap_secs),
                },
                Local::now().naive_local(),
            )?;
            println!("📅 Scheduled {id} (next run {:?})", scheduler.next_run_time(&id));
        }
        ScheduleAction::List => print_json(&scheduler.list_jobs())?,
        ScheduleAction::Cancel { id } => {
            if !scheduler.cancel_job(&id) {
                bail!("no scheduled job with id {id}");
            }
            println!("🗑️ Cancelled {id}");
        }
        ScheduleAction::Next { id } => match scheduler.next_run_time(&id) {
            Some(at) => println!("{}", at.format("%Y-%m-%d %H:%M")),
            None => println!("no upcoming run"),
        },
    }
    Ok(())
}

fn template(app: &App, action: TemplateAction) -> Result<()> {
    let store = app.templates();
    match action {
        TemplateAction::Save { name, template, attachments, from, from_name, no_signature } => {
            let (template, _) = app.template(&template)?;
            let mut record = TemplateRecord::new(&name, template);
            record.attachments = attachments;
            record.sender_address = from;
            record.sender_name = from_name;
            record.include_signature = !no_signature;
            let path = store.save(&record)?;
            println!("💾 Saved '{}' as {} ({})", record.name, record.id, path.display());
        }
        TemplateAction::List => {
            for r in store.list()? {
                println!("{}\t{}\t{}", r.id, r.name, r.created_at.format("%Y-%m-%d"));
            }
        }
        TemplateAction::Show { id } => print_json(&store.load(&id)?)?,
        TemplateAction::Delete { id } => {
            if !store.delete(&id)? {
                bail!("no template with id {id}");
            }
            println!("🗑️ Deleted {id}");
        }
    }
    Ok(())
}
