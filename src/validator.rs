//! Response validation and bounded textual repair.
//!
//! Generator output is expected to be a single JSON object, but models
//! routinely wrap it in prose ("Sure, here is the JSON: ...") or leave a
//! trailing comma before a closing delimiter. Validation attempts a strict
//! parse first, then falls back to extracting the outermost balanced object
//! span and stripping trailing separators before re-parsing. Anything beyond
//! that is unrecoverable and counts as an attempt failure upstream.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ValidateError;

/// Trailing separator immediately before a closing delimiter, e.g. `,}` or
/// `, ]`, the most common near-miss defect in generated JSON.
static TRAILING_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([\]\}])").expect("trailing separator pattern is valid"));

/// Parses raw generator output into a JSON document, repairing near-valid
/// text where possible.
///
/// Returns the parsed document together with the normalized text that
/// actually parsed (the raw input when strict parsing succeeded, otherwise
/// the extracted and cleaned span), so the store persists exactly what was
/// validated.
///
/// # Errors
///
/// - `ValidateError::NoObjectFound` when no balanced `{...}` span exists
///   (e.g. truncated output).
/// - `ValidateError::Unparseable` when the cleaned span still fails to
///   parse; the underlying serde error is preserved for diagnostics.
pub fn validate(raw: &str) -> Result<(Value, String), ValidateError> {
    if let Ok(doc) = serde_json::from_str::<Value>(raw) {
        return Ok((doc, raw.to_string()));
    }

    let span = extract_object_span(raw).ok_or(ValidateError::NoObjectFound)?;
    let cleaned = TRAILING_SEPARATOR.replace_all(span, "$1").into_owned();

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(doc) => Ok((doc, cleaned)),
        Err(err) => Err(ValidateError::Unparseable(err)),
    }
}

/// Locates the outermost balanced object span: from the first `{` to its
/// matching `}`, tolerant of leading and trailing prose.
///
/// Braces inside JSON string literals (and escaped quotes inside those
/// strings) do not affect the depth count. Returns `None` when the first
/// `{` is never closed.
fn extract_object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_parse_passes_through() {
        let (doc, normalized) = validate(r#"{"a":1}"#).expect("valid JSON");
        assert_eq!(doc["a"], 1);
        assert_eq!(normalized, r#"{"a":1}"#);
    }

    #[test]
    fn test_trailing_comma_is_repaired() {
        let (doc, normalized) = validate(r#"{"a":1,}"#).expect("repairable JSON");
        assert_eq!(doc["a"], 1);
        assert_eq!(normalized, r#"{"a":1}"#);
    }

    #[test]
    fn test_trailing_comma_in_array_is_repaired() {
        let (doc, _) = validate(r#"{"forms": ["a", "b",], "n": 2,}"#).expect("repairable JSON");
        assert_eq!(doc["forms"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(doc["n"], 2);
    }

    #[test]
    fn test_leading_prose_is_stripped() {
        let raw = "Sure, here is the JSON:\n{\"a\":1}";
        let (doc, normalized) = validate(raw).expect("extractable JSON");
        assert_eq!(doc["a"], 1);
        assert_eq!(normalized, r#"{"a":1}"#);
    }

    #[test]
    fn test_surrounding_prose_is_stripped() {
        let raw = "Here you go: {\"word\": \"run\"} — let me know if you need more.";
        let (doc, _) = validate(raw).expect("extractable JSON");
        assert_eq!(doc["word"], "run");
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_extraction() {
        let raw = "note {\"def\": \"set {x} of values\", \"n\": 1,} trailing";
        let (doc, _) = validate(raw).expect("extractable JSON");
        assert_eq!(doc["def"], "set {x} of values");
        assert_eq!(doc["n"], 1);
    }

    #[test]
    fn test_truncated_object_is_unrecoverable() {
        let result = validate(r#"{"a":1"#);
        assert!(matches!(result, Err(ValidateError::NoObjectFound)));
    }

    #[test]
    fn test_no_object_at_all_is_unrecoverable() {
        let result = validate("I cannot help with that.");
        assert!(matches!(result, Err(ValidateError::NoObjectFound)));
    }

    #[test]
    fn test_garbage_inside_braces_preserves_parse_error() {
        let result = validate("{not json at all}");
        match result {
            Err(ValidateError::Unparseable(_)) => {}
            other => panic!("expected Unparseable, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_object_span() {
        let raw = "prefix {\"senses\": [{\"pos\": \"n.\"}]} suffix";
        let (doc, _) = validate(raw).expect("extractable JSON");
        assert_eq!(doc["senses"][0]["pos"], "n.");
    }
}
