//! Placeholder extraction and per-row substitution.
//!
//! Markers are `((name))`. Rendering is a single pass over the input: each
//! marker is replaced by its resolved value (or `[name]`), and substituted
//! values are never re-scanned.

use regex::{Captures, Regex};
use sheetmail_core::{DataRow, Template};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::matcher::resolve;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\(([^)]+)\)\)").expect("static regex"));

/// Distinct, trimmed placeholder names referenced by `text`.
pub fn extract_placeholders(text: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps[1].trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

/// Substitute every placeholder in `text` with values from `row`.
pub fn render(text: &str, row: &DataRow) -> String {
    render_tracking(text, row, &mut BTreeSet::new())
}

/// Like [`render`], also collecting unresolved names into `unresolved`.
pub fn render_tracking(text: &str, row: &DataRow, unresolved: &mut BTreeSet<String>) -> String {
    if !text.contains("((") {
        return text.to_string();
    }
    let mut cache: HashMap<String, String> = HashMap::new();
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| {
            let name = caps[1].trim();
            if name.is_empty() {
                return caps[0].to_string();
            }
            cache
                .entry(name.to_string())
                .or_insert_with(|| {
                    let res = resolve(name, row);
                    if !res.is_resolved() {
                        unresolved.insert(name.to_string());
                    }
                    res.value
                })
                .clone()
        })
        .into_owned()
}

/// A template rendered for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub subject: String,
    pub body: String,
    pub html: Option<String>,
    /// Placeholders that fell back to the sentinel.
    pub unresolved: BTreeSet<String>,
}

/// Render subject, body, and HTML body of a template for one row.
pub fn render_template(template: &Template, row: &DataRow) -> RenderedTemplate {
    let mut unresolved = BTreeSet::new();
    let subject = render_tracking(&template.subject, row, &mut unresolved);
    let body = render_tracking(&template.body, row, &mut unresolved);
    let html = template
        .html
        .as_deref()
        .map(|h| render_tracking(h, row, &mut unresolved));
    RenderedTemplate {
        subject,
        body,
        html,
        unresolved,
    }
}
