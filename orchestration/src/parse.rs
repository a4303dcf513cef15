//! Best-effort extraction of structured blocks embedded in model prose.
//!
//! The arbiter verdict, the remediation decision, and worker source lists
//! all arrive as a JSON object buried in free-form text. Extraction is an
//! explicit fallible step: callers get `None` and apply their own safe
//! default instead of assuming the decode succeeded.

use regex::Regex;
use serde_json::Value;

/// Matches a JSON object with at most one level of nesting, which covers
/// every structured block the panel emits.
const OBJECT_PATTERN: &str = r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}";

/// Extract the last parseable JSON object embedded in `text`.
///
/// Later objects win because models tend to restate their structured
/// output at the end of a response.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let re = Regex::new(OBJECT_PATTERN).ok()?;
    re.find_iter(text)
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_embedded_object() {
        let text = r#"After weighing both sides: {"should_continue": false, "reason": "consensus"}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["should_continue"], Value::Bool(false));
    }

    #[test]
    fn test_last_object_wins() {
        let text = r#"{"action": "rephrase"} ... correction: {"action": "abort"}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["action"], "abort");
    }

    #[test]
    fn test_nested_object() {
        let text = r#"Decision: {"action": "rephrase", "new_args": {"query": "HHI post-merger"}}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["new_args"]["query"], "HHI post-merger");
    }

    #[test]
    fn test_plain_prose_yields_none() {
        assert!(extract_json_object("no structure here, just prose").is_none());
    }

    #[test]
    fn test_malformed_json_skipped() {
        // The first braces are not valid JSON; the second block is.
        let text = r#"{broken: yes} but also {"ok": true}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["ok"], Value::Bool(true));
    }
}
