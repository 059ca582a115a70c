//! Placeholder → column matching.
//!
//! Resolution order, first hit wins:
//! 1. exact column name (case-sensitive)
//! 2. case-insensitive name
//! 3. case-insensitive substring either way, first column in header order
//! 4. the same ignoring spaces/`_`/`-`: equality (`firstname` ≙ `First Name`),
//!    then substring
//!
//! Anything else is unresolved and renders as the `[name]` sentinel.

use sheetmail_core::{DataRow, DataSet, Template};

use crate::render::extract_placeholders;

/// Cap on [`suggest`] results.
pub const MAX_SUGGESTIONS: usize = 5;

/// Which rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    CaseInsensitive,
    Compact,
    Substring,
}

/// Result of resolving one placeholder against one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub value: String,
    pub column: Option<String>,
    pub rule: Option<MatchRule>,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.column.is_some()
    }
}

/// Visible stand-in for an unresolved placeholder.
pub fn sentinel(placeholder: &str) -> String {
    format!("[{}]", placeholder.trim())
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find the column a placeholder refers to. Returns its index and the rule used.
pub fn match_column<'a, I>(placeholder: &str, columns: I) -> Option<(usize, MatchRule)>
where
    I: IntoIterator<Item = &'a str>,
{
    let name = placeholder.trim();
    if name.is_empty() {
        return None;
    }
    let columns: Vec<&str> = columns.into_iter().collect();

    if let Some(i) = columns.iter().position(|c| *c == name) {
        return Some((i, MatchRule::Exact));
    }

    let name_fold = fold(name);
    let folded: Vec<String> = columns.iter().map(|c| fold(c)).collect();
    if let Some(i) = folded.iter().position(|c| *c == name_fold) {
        return Some((i, MatchRule::CaseInsensitive));
    }

    // Blank headers would contain-match everything; they never participate.
    if let Some(i) = folded
        .iter()
        .position(|c| !c.is_empty() && (c.contains(&name_fold) || name_fold.contains(c.as_str())))
    {
        return Some((i, MatchRule::Substring));
    }

    let name_compact = compact(name);
    let compacted: Vec<String> = columns.iter().map(|c| compact(c)).collect();
    if !name_compact.is_empty()
        && let Some(i) = compacted.iter().position(|c| *c == name_compact)
    {
        return Some((i, MatchRule::Compact));
    }
    if !name_compact.is_empty()
        && let Some(i) = compacted.iter().position(|c| {
            !c.is_empty() && (c.contains(&name_compact) || name_compact.contains(c.as_str()))
        })
    {
        return Some((i, MatchRule::Substring));
    }

    None
}

/// Resolve a placeholder against a row.
pub fn resolve(placeholder: &str, row: &DataRow) -> Resolution {
    match match_column(placeholder, row.columns()) {
        Some((i, rule)) => {
            let (column, value) = &row.cells()[i];
            Resolution {
                value: value.clone(),
                column: Some(column.clone()),
                rule: Some(rule),
            }
        }
        None => Resolution {
            value: sentinel(placeholder),
            column: None,
            rule: None,
        },
    }
}

/// Method form of [`resolve`] on rows.
pub trait ResolvePlaceholder {
    fn resolve(&self, placeholder: &str) -> Resolution;
}

impl ResolvePlaceholder for DataRow {
    fn resolve(&self, placeholder: &str) -> Resolution {
        resolve(placeholder, self)
    }
}

/// Up to [`MAX_SUGGESTIONS`] headers sharing a word fragment with the placeholder.
pub fn suggest(placeholder: &str, headers: &[String]) -> Vec<String> {
    let p_fold = fold(placeholder);
    let p_words: Vec<&str> = p_fold.split_whitespace().collect();
    let mut suggestions: Vec<String> = Vec::new();

    for header in headers {
        let header = header.trim();
        let h_fold = fold(header);
        let related = h_fold.split_whitespace().any(|hw| {
            p_words
                .iter()
                .any(|pw| pw.contains(hw) || hw.contains(pw))
        });
        if related && !suggestions.iter().any(|s| s == header) {
            suggestions.push(header.to_string());
            if suggestions.len() == MAX_SUGGESTIONS {
                break;
            }
        }
    }
    suggestions
}

/// Pre-flight check: placeholders in subject/body/html that no header satisfies.
/// Sorted by name.
pub fn validate(template: &Template, dataset: &DataSet) -> Vec<String> {
    let mut names = extract_placeholders(&template.subject);
    names.extend(extract_placeholders(&template.body));
    if let Some(html) = &template.html {
        names.extend(extract_placeholders(html));
    }

    let headers: Vec<&str> = dataset.headers().iter().map(String::as_str).collect();
    names
        .into_iter()
        .filter(|name| match_column(name, headers.iter().copied()).is_none())
        .collect()
}
