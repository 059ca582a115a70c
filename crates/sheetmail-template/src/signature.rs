//! Account signatures: HTML → plain text and appending below a body.

use regex::Regex;
use std::sync::LazyLock;

static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|tr|h[1-6])\s*>").expect("static regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Separator line between a body and its signature.
pub const SEPARATOR: &str = "--";

/// Convert an HTML signature into plain text.
///
/// Line-breaking tags become newlines, other tags are dropped, the five common
/// entities are decoded, and blank lines are removed.
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let text = BREAK_RE.replace_all(html, "\n");
    let text = TAG_RE.replace_all(&text, "");
    // &amp; last so "&amp;lt;" stays "&lt;".
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append a plain-text signature below `body`.
pub fn append_signature(body: &str, signature: &str, include: bool) -> String {
    if !include || signature.trim().is_empty() {
        return body.to_string();
    }
    if body.trim().is_empty() {
        format!("{body}\n\n{signature}")
    } else {
        format!("{body}\n\n{SEPARATOR}\n{signature}")
    }
}

/// Append a plain-text signature below an HTML body.
pub fn append_signature_html(html: &str, signature: &str, include: bool) -> String {
    if !include || signature.trim().is_empty() {
        return html.to_string();
    }
    let sig = signature.replace('\n', "<br>");
    format!("{html}<br><br>{SEPARATOR}<br>{sig}")
}
