//! Tolerant extraction of structured answers embedded in model prose
//!
//! Generative collaborators often wrap their JSON in Markdown fences or
//! surrounding sentences. Extraction locates the first well-formed JSON object
//! before giving up.

use serde_json::Value;

/// Outcome of extracting `risk_level` from a collaborator answer
#[derive(Debug, Clone, PartialEq)]
pub struct RiskExtraction {
    /// Risk in [0,1]; 0.0 when degraded
    pub risk_level: f64,
    /// No usable `risk_level` was found
    pub degraded: bool,
    /// The embedded object, when one was found
    pub object: Option<Value>,
}

/// First well-formed JSON object in `raw`
///
/// Tries the whole (trimmed) string first, then stream-parses from each `{`.
pub fn extract_json_object(raw: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(value);
    }

    for (idx, _) in raw.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&raw[idx..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
    }
    None
}

/// Extract `risk_level` (number or numeric string), clamped into [0,1]
pub fn extract_risk_level(raw: &str) -> RiskExtraction {
    let object = extract_json_object(raw);
    let risk = object
        .as_ref()
        .and_then(|o| o.get("risk_level"))
        .and_then(number_like)
        .filter(|r| r.is_finite());

    match risk {
        Some(risk_level) => RiskExtraction {
            risk_level: risk_level.clamp(0.0, 1.0),
            degraded: false,
            object,
        },
        None => RiskExtraction {
            risk_level: 0.0,
            degraded: true,
            object,
        },
    }
}

/// String field of the extracted object, if present and non-empty
pub fn string_field(object: Option<&Value>, key: &str) -> Option<String> {
    object?
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_in_prose() {
        let raw = "Here is the result: ```json {\"risk_level\": 0.42} ``` Thanks.";
        let extraction = extract_risk_level(raw);
        assert_eq!(extraction.risk_level, 0.42);
        assert!(!extraction.degraded);
    }

    #[test]
    fn test_no_object_is_degraded_zero() {
        let extraction = extract_risk_level("I cannot assess this document.");
        assert_eq!(extraction.risk_level, 0.0);
        assert!(extraction.degraded);
        assert!(extraction.object.is_none());
    }

    #[test]
    fn test_plain_json() {
        let raw = r#"{"summary": "Altered total", "risk_level": "0.8", "explanation": "Fonts differ."}"#;
        let extraction = extract_risk_level(raw);
        assert_eq!(extraction.risk_level, 0.8);
        assert_eq!(
            string_field(extraction.object.as_ref(), "summary").as_deref(),
            Some("Altered total")
        );
    }

    #[test]
    fn test_skips_malformed_braces_before_object() {
        let raw = "Scores {not json} follow:\n```json\n{\"risk_level\": 0.1, \"nested\": {\"a\": 1}}\n```";
        let extraction = extract_risk_level(raw);
        assert_eq!(extraction.risk_level, 0.1);
        assert!(!extraction.degraded);
    }

    #[test]
    fn test_object_without_risk_level_is_degraded() {
        let extraction = extract_risk_level(r#"{"summary": "ok"}"#);
        assert!(extraction.degraded);
        assert_eq!(extraction.risk_level, 0.0);
        assert!(extraction.object.is_some());
    }

    #[test]
    fn test_out_of_range_risk_clamped() {
        assert_eq!(extract_risk_level(r#"{"risk_level": 7}"#).risk_level, 1.0);
        assert_eq!(extract_risk_level(r#"{"risk_level": -1}"#).risk_level, 0.0);
    }
}
