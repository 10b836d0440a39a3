//! Structured-response parser: pull a JSON payload out of model output.
//!
//! Models asked for JSON frequently wrap it in a Markdown code fence even when
//! told not to. This module strips one leading fence (` ```json ` or bare
//! ` ``` `) and then decodes strictly. There is no lenient repair here: a
//! payload that `serde_json` rejects is a [`ParseError`] and each stage applies
//! its own recovery policy.

use crate::error::ParseError;
use serde::de::DeserializeOwned;
use serde_json::Value;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Return the slice of `text` that should hold the JSON payload.
///
/// - Leading ` ```json ` fence: content up to the next fence.
/// - Leading bare fence: content up to the next fence.
/// - Otherwise: the trimmed text as-is.
///
/// An opening fence without a closing one yields everything after the opener.
pub fn extract_payload(text: &str) -> &str {
    let trimmed = text.trim();
    let body = if let Some(rest) = trimmed.strip_prefix(JSON_FENCE) {
        rest
    } else if let Some(rest) = trimmed.strip_prefix(FENCE) {
        rest
    } else {
        return trimmed;
    };

    match body.find(FENCE) {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Decode model output into a JSON value.
pub fn parse_structured(text: &str) -> Result<Value, ParseError> {
    serde_json::from_str(extract_payload(text)).map_err(|e| ParseError {
        reason: e.to_string(),
        raw: text.to_string(),
    })
}

/// Decode model output directly into `T`.
///
/// Valid JSON of the wrong shape (missing fields, wrong types) is reported the
/// same way as malformed JSON.
pub fn parse_structured_as<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let value = parse_structured(text)?;
    serde_json::from_value(value).map_err(|e| ParseError {
        reason: format!("unexpected shape: {e}"),
        raw: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Graph;
    use serde_json::json;

    #[test]
    fn plain_json() {
        assert_eq!(parse_structured(r#"  {"a": 1}  "#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn json_fence() {
        let text = "```json\n{\"topics\": []}\n```";
        assert_eq!(extract_payload(text), "{\"topics\": []}");
        assert_eq!(parse_structured(text).unwrap(), json!({"topics": []}));
    }

    #[test]
    fn generic_fence() {
        let text = "\n```\n[1, 2, 3]\n```\n";
        assert_eq!(parse_structured(text).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn text_after_closing_fence_is_ignored() {
        let text = "```json\n{\"ok\": true}\n```\nHope this helps!";
        assert_eq!(parse_structured(text).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn unterminated_fence_uses_remainder() {
        let text = "```json\n{\"ok\": true}";
        assert_eq!(parse_structured(text).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn leading_prose_is_not_repaired() {
        let text = "Here is the graph: {\"nodes\": []}";
        let err = parse_structured(text).unwrap_err();
        assert_eq!(err.raw, text);
    }

    #[test]
    fn malformed_json_keeps_raw_text() {
        let text = "```json\n{\"nodes\": [\n```";
        let err = parse_structured(text).unwrap_err();
        assert_eq!(err.raw, text);
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        let err = parse_structured_as::<Graph>(r#"{"nodes": "nope"}"#).unwrap_err();
        assert!(err.reason.contains("unexpected shape"), "got: {}", err.reason);
    }

    #[test]
    fn typed_graph() {
        let g: Graph = parse_structured_as(
            "```json\n{\"nodes\":[{\"id\":\"c1\",\"title\":\"Intro\",\"type\":\"central\"}],\"edges\":[]}\n```",
        )
        .unwrap();
        assert_eq!(g.nodes.len(), 1);
    }
}
