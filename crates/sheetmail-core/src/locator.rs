//! Spreadsheet locator parsing.
//!
//! Accepts a full share URL (`.../spreadsheets/d/<id>/edit`), a legacy
//! `?key=<id>` URL, or a bare identifier.

use regex::Regex;
use std::sync::LazyLock;

static LOCATOR_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("static regex"),
        Regex::new(r"key=([a-zA-Z0-9_-]+)").expect("static regex"),
        Regex::new(r"^([a-zA-Z0-9_-]+)$").expect("static regex"),
    ]
});

/// Extract the opaque sheet identifier from a spreadsheet locator.
pub fn extract_sheet_id(locator: &str) -> Option<String> {
    let locator = locator.trim();
    LOCATOR_PATTERNS
        .iter()
        .find_map(|re| re.captures(locator))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_url() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC-d_9/edit#gid=0";
        assert_eq!(extract_sheet_id(url).as_deref(), Some("1AbC-d_9"));
    }

    #[test]
    fn test_key_param() {
        let url = "https://spreadsheets.google.com/ccc?key=0Xyz_1&hl=en";
        assert_eq!(extract_sheet_id(url).as_deref(), Some("0Xyz_1"));
    }

    #[test]
    fn test_bare_id() {
        assert_eq!(extract_sheet_id("  contacts_2026 ").as_deref(), Some("contacts_2026"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(extract_sheet_id("not a sheet/at all").is_none());
        assert!(extract_sheet_id("").is_none());
    }
}
