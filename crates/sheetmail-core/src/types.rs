//! Value types that flow between sheet sources, the renderer, and transports.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One spreadsheet row: an ordered column → value mapping.
///
/// Column order follows the owning [`DataSet`]'s headers. Cells missing from
/// the source are stored as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRow {
    cells: Vec<(String, String)>,
}

impl DataRow {
    /// Build a row from explicit `(column, value)` pairs.
    pub fn new<K, V>(cells: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: cells
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build a row against a header list, blank-padding short records and
    /// dropping cells beyond the header width.
    pub fn from_record(headers: &[String], values: &[String]) -> Self {
        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let value = values.get(i).map(|v| v.trim()).unwrap_or_default();
                (h.trim().to_string(), value.to_string())
            })
            .collect();
        Self { cells }
    }

    /// Exact (case-sensitive) lookup.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    /// Value at a column position.
    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(|(_, v)| v.as_str())
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn cells(&self) -> &[(String, String)] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when every cell is empty or whitespace (trailing spreadsheet rows).
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

/// Rectangular table pulled from a sheet source for one send operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSet {
    headers: Vec<String>,
    rows: Vec<DataRow>,
}

impl DataSet {
    /// Build from a header row plus raw records. Every row is reconciled
    /// against the headers (trimmed, blank-padded).
    pub fn new(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let rows = records
            .iter()
            .map(|r| DataRow::from_record(&headers, r))
            .collect();
        Self { headers, rows }
    }

    /// Build from already-keyed rows, reconciling each against `headers`.
    pub fn from_rows(headers: Vec<String>, rows: Vec<DataRow>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|row| {
                let values: Vec<String> = headers
                    .iter()
                    .map(|h| row.get(h).unwrap_or_default().to_string())
                    .collect();
                DataRow::from_record(&headers, &values)
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Subject + body (+ optional HTML body) with `((placeholder))` markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub html: Option<String>,
}

impl Template {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            html: None,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }
}

/// An address a message can be sent from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub address: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

impl SenderIdentity {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
            is_primary: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.display_name = (!name.trim().is_empty()).then_some(name);
        self
    }

    /// RFC 5322 mailbox form: `Name <addr>` or bare `addr`.
    pub fn mailbox(&self) -> String {
        match self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => format!("{name} <{}>", self.address),
            None => self.address.clone(),
        }
    }
}

/// A loaded attachment. Bytes are shared so one file can ride on many messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentBlob {
    pub filename: String,
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl AttachmentBlob {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A fully rendered, transport-ready message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub from: SenderIdentity,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub attachments: Vec<AttachmentBlob>,
}
