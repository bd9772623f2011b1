//! Payload redaction for the public broadcast channel.

use serde_json::Value;

/// Key prefixes stripped from broadcast payloads, lowercased.
///
/// Covers fuel state, tire wear/temperature/pressure, strategy and
/// lap-delta hints, and steward/AI fault or recommendation fields.
const SENSITIVE_PREFIXES: &[&str] = &["fuel", "tire", "tyre", "strategy", "lapdelta", "steward"];

fn is_sensitive(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    if SENSITIVE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }
    // "ai" only as a word boundary, so "airTemp" survives.
    key == "ai"
        || key.starts_with("ai_")
        || (key.starts_with("ai") && key[2..].starts_with(|c: char| c.is_ascii_uppercase()))
}

/// Strip sensitive fields from a payload, recursively.
///
/// Matching keys are removed wherever they appear, including inside nested
/// objects and arrays. Everything else is passed through unchanged.
pub fn redact(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_sensitive(key))
                .map(|(key, value)| (key.clone(), redact(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
