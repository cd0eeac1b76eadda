// file: src/rewrite/url.rs
// description: target url construction from the configured template and fragment sanitizing
// reference: https://www.rfc-editor.org/rfc/rfc3986#section-3.5

use crate::error::{PipelineError, Result};

pub const DOCUMENT_ID_PLACEHOLDER: &str = "{document_id}";

fn is_unsafe(c: char) -> bool {
    matches!(c, '!' | '<' | '>' | '&' | '"' | '\'') || c.is_whitespace() || c.is_control()
}

fn is_strict_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '/' | '?' | '=' | '%')
}

fn percent_encode(c: char, out: &mut String) {
    let mut buffer = [0u8; 4];
    for byte in c.encode_utf8(&mut buffer).bytes() {
        out.push_str(&format!("%{:02X}", byte));
    }
}

fn encode_where(fragment: &str, should_encode: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if should_encode(c) {
            percent_encode(c, &mut out);
        } else {
            out.push(c);
        }
    }
    out
}

/// Percent-encodes characters that must not appear raw in a relationship
/// target fragment. A fragment that still fails the check after the first
/// pass is re-encoded strictly; if that also fails it is rejected.
pub fn sanitize_fragment(fragment: &str) -> Result<String> {
    let first = encode_where(fragment, is_unsafe);
    if !first.chars().any(is_unsafe) {
        return Ok(first);
    }

    let strict = encode_where(fragment, |c| !is_strict_safe(c));
    if strict.chars().any(is_unsafe) {
        return Err(PipelineError::Content(format!(
            "URL fragment cannot be made safe: {:?}",
            fragment
        )));
    }
    Ok(strict)
}

/// Substitutes `document_id` into `template` and sanitizes the fragment.
pub fn build_target_url(template: &str, document_id: &str) -> Result<String> {
    let document_id = document_id.trim();
    if document_id.is_empty() {
        return Err(PipelineError::Content(
            "cannot build a target URL without a document id".to_string(),
        ));
    }
    if !template.contains(DOCUMENT_ID_PLACEHOLDER) {
        return Err(PipelineError::Config(format!(
            "URL template has no {} placeholder: {}",
            DOCUMENT_ID_PLACEHOLDER, template
        )));
    }

    let url = template.replace(DOCUMENT_ID_PLACEHOLDER, document_id);
    match url.split_once('#') {
        Some((address, fragment)) => Ok(format!("{}#{}", address, sanitize_fragment(fragment)?)),
        None => Ok(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "https://docs.example.com/library/#!/view?docid={document_id}";

    #[test]
    fn test_build_target_url() {
        assert_eq!(
            build_target_url(TEMPLATE, "DOC-411364").unwrap(),
            "https://docs.example.com/library/#%21/view?docid=DOC-411364"
        );
    }

    #[test]
    fn test_template_without_fragment_is_unchanged() {
        assert_eq!(
            build_target_url("https://docs.example.com/doc/{document_id}", " 42 ").unwrap(),
            "https://docs.example.com/doc/42"
        );
    }

    #[test]
    fn test_missing_placeholder_or_id_fails() {
        assert!(build_target_url("https://docs.example.com/", "42").is_err());
        assert!(build_target_url(TEMPLATE, "  ").is_err());
    }

    #[test]
    fn test_sanitize_fragment_encodes_xml_unsafe_characters() {
        assert_eq!(
            sanitize_fragment(r#"!/view?a=1&b="x" <y>'z'"#).unwrap(),
            "%21/view?a=1%26b=%22x%22%20%3Cy%3E%27z%27"
        );
        assert_eq!(sanitize_fragment("already%21safe").unwrap(), "already%21safe");
        assert_eq!(sanitize_fragment("line\nbreak").unwrap(), "line%0Abreak");
    }

    #[test]
    fn test_sanitized_fragments_contain_no_unsafe_characters() {
        for fragment in ["!!", "&&&", "a b\tc", "\"'<>", "résumé!"] {
            let sanitized = sanitize_fragment(fragment).unwrap();
            assert!(!sanitized.chars().any(is_unsafe), "{}", sanitized);
        }
    }
}
