//! Spreadsheet source backed by CSV exports on disk.
//!
//! Layout: `<root>/<sheet id>/<tab name>.csv`. The sheet id is extracted from
//! the locator the same way a share URL would be, so full URLs, `key=` links
//! and bare ids all resolve to the same directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sheetmail_core::locator::extract_sheet_id;
use sheetmail_core::{DataSet, Result, SheetSource, SheetmailError};

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Pick the delimiter that occurs most often in the header line.
/// Ties and headers with no delimiter at all fall back to `,`.
pub fn detect_delimiter(header_line: &str) -> u8 {
    let mut best = (b',', 0usize);
    for d in DELIMITERS {
        let count = header_line.bytes().filter(|b| *b == d).count();
        if count > best.1 {
            best = (d, count);
        }
    }
    best.0
}

/// Parse CSV text into a dataset: first record is the header row.
pub fn parse_csv(text: &str) -> Result<DataSet> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_line = text.lines().next().unwrap_or_default();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(first_line))
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(rec) => rec
            .map_err(|e| SheetmailError::Sheet(format!("CSV header: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect(),
        None => return Ok(DataSet::new(Vec::new(), Vec::new())),
    };

    let mut rows = Vec::new();
    for rec in records {
        let rec = rec.map_err(|e| SheetmailError::Sheet(format!("CSV row: {e}")))?;
        rows.push(rec.iter().map(str::to_string).collect());
    }
    Ok(DataSet::new(headers, rows))
}

pub struct CsvSheetSource {
    root: PathBuf,
}

impl CsvSheetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn sheet_dir(&self, locator: &str) -> Result<PathBuf> {
        let id = extract_sheet_id(locator)
            .ok_or_else(|| SheetmailError::Sheet(format!("Unrecognised spreadsheet locator '{locator}'")))?;
        let dir = self.root.join(&id);
        if !dir.is_dir() {
            return Err(SheetmailError::Sheet(format!("Spreadsheet '{id}' not found under {}", self.root.display())));
        }
        Ok(dir)
    }
}

/// Tab names map to file stems inside the sheet directory and nowhere else.
fn check_tab_name(sheet: &str) -> Result<()> {
    let name = sheet.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(SheetmailError::Sheet(format!("Invalid sheet name '{sheet}'")));
    }
    Ok(())
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

#[async_trait]
impl SheetSource for CsvSheetSource {
    async fn sheet_names(&self, locator: &str) -> Result<Vec<String>> {
        let dir = self.sheet_dir(locator)?;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_csv(&path)
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn fetch(&self, locator: &str, sheet: &str) -> Result<DataSet> {
        check_tab_name(sheet)?;
        let path = self.sheet_dir(locator)?.join(format!("{sheet}.csv"));
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SheetmailError::Sheet(format!("Read {}: {e}", path.display())))?;
        let dataset = parse_csv(&text)?;
        tracing::debug!("📊 Loaded {} rows × {} columns from {}", dataset.len(), dataset.headers().len(), path.display());
        Ok(dataset)
    }
}
