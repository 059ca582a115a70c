//! Attachment loading with a cumulative size ceiling.
//!
//! Files are checked in the given order. A file is skipped if it is missing,
//! empty, unreadable, or would push the running total past the ceiling; the
//! remaining files still go out.

use serde::Serialize;
use sheetmail_core::AttachmentBlob;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Why a file was left off the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttachmentIssue {
    Missing,
    Empty,
    NotAFile,
    Unreadable(String),
    TooLarge { size: u64, ceiling: u64 },
    ExceedsTotal { size: u64, total: u64, ceiling: u64 },
}

impl std::fmt::Display for AttachmentIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const MB: f64 = 1024.0 * 1024.0;
        match self {
            Self::Missing => write!(f, "file not found"),
            Self::Empty => write!(f, "file is empty"),
            Self::NotAFile => write!(f, "not a regular file"),
            Self::Unreadable(e) => write!(f, "unreadable: {e}"),
            Self::TooLarge { size, ceiling } => write!(
                f,
                "too large: {:.1}MB (max {:.0}MB)",
                *size as f64 / MB,
                *ceiling as f64 / MB
            ),
            Self::ExceedsTotal { size, total, ceiling } => write!(
                f,
                "{:.1}MB would bring the total to {:.1}MB (max {:.0}MB)",
                *size as f64 / MB,
                (*total + *size) as f64 / MB,
                *ceiling as f64 / MB
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAttachment {
    pub path: PathBuf,
    pub issue: AttachmentIssue,
}

/// Files accepted for a message plus the ones that were dropped.
#[derive(Debug, Clone, Default)]
pub struct AttachmentSet {
    pub included: Vec<AttachmentBlob>,
    pub skipped: Vec<SkippedAttachment>,
}

impl AttachmentSet {
    pub fn total_bytes(&self) -> u64 {
        self.included.iter().map(|a| a.size() as u64).sum()
    }
}

fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

async fn check(path: &Path, total: u64, ceiling: u64) -> Result<AttachmentBlob, AttachmentIssue> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AttachmentIssue::Missing),
        Err(e) => return Err(AttachmentIssue::Unreadable(e.to_string())),
    };
    if !meta.is_file() {
        return Err(AttachmentIssue::NotAFile);
    }
    let size = meta.len();
    if size == 0 {
        return Err(AttachmentIssue::Empty);
    }
    if size > ceiling {
        return Err(AttachmentIssue::TooLarge { size, ceiling });
    }
    if total + size > ceiling {
        return Err(AttachmentIssue::ExceedsTotal { size, total, ceiling });
    }
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| AttachmentIssue::Unreadable(e.to_string()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".into());
    Ok(AttachmentBlob {
        filename,
        mime_type: mime_for(path),
        data: Arc::from(data),
    })
}

/// Load attachments in order, keeping the included total ≤ `ceiling` bytes.
pub async fn load_attachments(paths: &[PathBuf], ceiling: u64) -> AttachmentSet {
    let mut set = AttachmentSet::default();
    let mut total = 0u64;
    for path in paths {
        match check(path, total, ceiling).await {
            Ok(blob) => {
                total += blob.size() as u64;
                tracing::info!("📎 Attached {} ({} bytes)", blob.filename, blob.size());
                set.included.push(blob);
            }
            Err(issue) => {
                tracing::warn!("⚠️ Skipping attachment {}: {issue}", path.display());
                set.skipped.push(SkippedAttachment {
                    path: path.clone(),
                    issue,
                });
            }
        }
    }
    set
}
