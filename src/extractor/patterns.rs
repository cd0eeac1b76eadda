// file: src/extractor/patterns.rs
// description: compiled regex patterns for lookup ids, content ids and status markers
// reference: https://docs.rs/regex

use crate::config::DEFAULT_LOOKUP_ID_PATTERN;
use lazy_static::lazy_static;
use regex::Regex;

pub const EXPIRED_MARKER: &str = " - Expired";
pub const NOT_FOUND_MARKER: &str = " - Not Found";

lazy_static! {
    // Lookup identifiers embedded in hyperlink targets
    pub static ref LOOKUP_ID: Regex = Regex::new(DEFAULT_LOOKUP_ID_PATTERN)
        .expect("LOOKUP_ID regex is valid");

    pub static ref DOCID_PARAM: Regex = Regex::new(
        r"(?i)docid=([^&]*)"
    ).expect("DOCID_PARAM regex is valid");

    // Display text decorations
    pub static ref CONTENT_ID_SUFFIX: Regex = Regex::new(
        r"\s*\((\d{5,})\)\s*$"
    ).expect("CONTENT_ID_SUFFIX regex is valid");

    pub static ref STATUS_MARKER: Regex = Regex::new(
        r"(?i)\s+-\s+(expired|not found)\s*$"
    ).expect("STATUS_MARKER regex is valid");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMarker {
    Expired,
    NotFound,
}

/// Pattern match first (upper-cased), then the `docid=` query parameter verbatim.
pub fn extract_lookup_id_with(pattern: &Regex, target: &str) -> Option<String> {
    if let Some(found) = pattern.find(target) {
        return Some(found.as_str().to_uppercase());
    }
    extract_docid(target)
}

pub fn extract_lookup_id(target: &str) -> Option<String> {
    extract_lookup_id_with(&LOOKUP_ID, target)
}

pub fn extract_docid(target: &str) -> Option<String> {
    DOCID_PARAM
        .captures(target)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn status_marker(display: &str) -> Option<StatusMarker> {
    STATUS_MARKER.captures(display).map(|caps| {
        if caps[1].eq_ignore_ascii_case("expired") {
            StatusMarker::Expired
        } else {
            StatusMarker::NotFound
        }
    })
}

pub fn strip_status_marker(display: &str) -> String {
    STATUS_MARKER.replace(display, "").into_owned()
}

pub fn extract_content_id(display: &str) -> Option<String> {
    let without_marker = strip_status_marker(display);
    CONTENT_ID_SUFFIX
        .captures(&without_marker)
        .map(|caps| caps[1].to_string())
}

pub fn strip_content_id(display: &str) -> String {
    CONTENT_ID_SUFFIX.replace(display, "").into_owned()
}

/// Display text with any trailing status marker and content id removed.
pub fn base_title(display: &str) -> String {
    strip_content_id(&strip_status_marker(display))
        .trim()
        .to_string()
}

/// Five-digit ids gain a leading zero, longer ids keep their last six digits,
/// anything shorter is returned as given.
pub fn format_content_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let length = trimmed.chars().count();
    match length {
        5 => format!("0{}", trimmed),
        n if n > 6 => trimmed.chars().skip(n - 6).collect(),
        _ => trimmed.to_string(),
    }
}
