//! File-based template store — one JSON file per saved template.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sheetmail_core::{Result, SheetmailError, Template};
use std::path::{Path, PathBuf};

/// A saved template with its send options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub template: Template,
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
    #[serde(default)]
    pub sender_address: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default = "default_true")]
    pub include_signature: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl TemplateRecord {
    pub fn new(name: &str, template: Template) -> Self {
        Self {
            id: slugify(name),
            name: name.to_string(),
            template,
            attachments: Vec::new(),
            sender_address: None,
            sender_name: None,
            include_signature: true,
            created_at: Utc::now(),
        }
    }
}

/// File-safe id derived from a template name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        format!("template-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
    } else {
        slug
    }
}

/// Directory of `<id>.json` template records.
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn file_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slugify(id)))
    }

    /// Write a record, replacing any record with the same id.
    pub fn save(&self, record: &TemplateRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let file = self.file_for(&record.id);
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&file, json)?;
        tracing::debug!("💾 Saved template '{}' to {}", record.name, file.display());
        Ok(file)
    }

    /// Read one record by id (or by name, which slugs to the same id).
    pub fn load(&self, id: &str) -> Result<TemplateRecord> {
        let file = self.file_for(id);
        let json = std::fs::read_to_string(&file).map_err(|e| {
            SheetmailError::Template(format!("Cannot read template '{id}': {e}"))
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// All readable records, oldest first. Unparseable files are skipped.
    pub fn list(&self) -> Result<Vec<TemplateRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(SheetmailError::from)
                .and_then(|json| serde_json::from_str::<TemplateRecord>(&json).map_err(Into::into))
            {
                Ok(rec) => records.push(rec),
                Err(e) => tracing::warn!("⚠️ Skipping template {}: {e}", path.display()),
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    /// Delete a record. Returns false if it did not exist.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let file = self.file_for(id);
        if !file.exists() {
            return Ok(false);
        }
        std::fs::remove_file(file)?;
        Ok(true)
    }
}
