//! Sheetmail configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SheetmailError};
use crate::types::SenderIdentity;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetmailConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl SheetmailConfig {
    /// Load config from the default path (~/.sheetmail/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SheetmailError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SheetmailError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SheetmailError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Sheetmail home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sheetmail")
    }
}

/// Expand a leading `~` against the user's home directory.
pub fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).into_owned())
}

fn bool_true() -> bool { true }

/// Bulk-send pacing and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds between two messages.
    #[serde(default = "default_time_gap")]
    pub time_gap_secs: u64,
    /// Seconds to rest after every full batch.
    #[serde(default = "default_batch_pause")]
    pub batch_pause_secs: u64,
    #[serde(default = "default_max_attachment_mb")]
    pub max_attachment_mb: u64,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    #[serde(default = "bool_true")]
    pub include_signature: bool,
}

fn default_batch_size() -> usize { 50 }
fn default_time_gap() -> u64 { 5 }
fn default_batch_pause() -> u64 { 10 }
fn default_max_attachment_mb() -> u64 { 25 }
fn default_send_timeout() -> u64 { 60 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            time_gap_secs: default_time_gap(),
            batch_pause_secs: default_batch_pause(),
            max_attachment_mb: default_max_attachment_mb(),
            send_timeout_secs: default_send_timeout(),
            include_signature: true,
        }
    }
}

impl DispatchConfig {
    pub fn max_attachment_bytes(&self) -> u64 {
        self.max_attachment_mb * 1024 * 1024
    }
}

/// Scheduler loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    #[serde(default = "default_jobs_file")]
    pub jobs_file: String,
}

fn default_tick() -> u64 { 1 }
fn default_jobs_file() -> String { "~/.sheetmail/scheduled_jobs.json".into() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick(),
            jobs_file: default_jobs_file(),
        }
    }
}

/// SMTP account used as the mail transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Primary sender address. Falls back to `username` when empty.
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Verified alternate sender identities.
    #[serde(default)]
    pub send_as: Vec<SenderIdentity>,
    #[serde(default)]
    pub signature_html: Option<String>,
}

fn default_smtp_host() -> String { "smtp.gmail.com".into() }
fn default_smtp_port() -> u16 { 587 }

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_address: String::new(),
            display_name: None,
            send_as: Vec::new(),
            signature_html: None,
        }
    }
}

impl SmtpConfig {
    pub fn primary_address(&self) -> &str {
        if self.from_address.is_empty() {
            &self.username
        } else {
            &self.from_address
        }
    }
}

/// Where CSV-exported spreadsheets live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default = "default_sheets_root")]
    pub root: String,
}

fn default_sheets_root() -> String { "~/.sheetmail/sheets".into() }

impl Default for SheetsConfig {
    fn default() -> Self {
        Self { root: default_sheets_root() }
    }
}

/// Saved template records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_templates_dir")]
    pub dir: String,
}

fn default_templates_dir() -> String { "~/.sheetmail/templates".into() }

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self { dir: default_templates_dir() }
    }
}

/// Anonymous usage reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_telemetry_endpoint")]
    pub endpoint: String,
    /// Generated on first use when empty.
    #[serde(default)]
    pub install_id: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
}

fn default_telemetry_endpoint() -> String { "http://127.0.0.1:8080/telemetry".into() }
fn default_app_version() -> String { env!("CARGO_PKG_VERSION").into() }

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_telemetry_endpoint(),
            install_id: String::new(),
            app_version: default_app_version(),
        }
    }
}

impl TelemetryConfig {
    /// Return the install id, generating and storing one if missing.
    pub fn ensure_install_id(&mut self) -> &str {
        if self.install_id.is_empty() {
            self.install_id = uuid::Uuid::new_v4().to_string();
        }
        &self.install_id
    }
}
