use crate::constants::audit::MAX_PAYLOAD_CHARS;
use crate::utils::text::truncate_utf8_prefix;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const MASK: &str = "******";

static SENSITIVE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)password|token|secret|key|auth|credential").expect("sensitive key regex")
});

static INLINE_SECRET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(password|token|secret|key)\s*=").expect("inline secret regex"));

/// Masks sensitive values in a payload before it is logged. JSON payloads
/// keep their shape with sensitive keys replaced by the mask marker;
/// non-JSON payloads that carry an inline secret pattern are masked whole.
pub fn obfuscate_payload(raw: &str) -> String {
    if raw.trim().is_empty() {
        return raw.to_string();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(parsed) => {
            serde_json::to_string(&obfuscate_value(&parsed)).unwrap_or_else(|_| MASK.to_string())
        }
        Err(_) => {
            if INLINE_SECRET_RE.is_match(raw) {
                MASK.to_string()
            } else {
                raw.to_string()
            }
        }
    }
}

pub fn obfuscate_capped(raw: &str) -> String {
    let masked = obfuscate_payload(raw);
    if masked.len() > MAX_PAYLOAD_CHARS {
        truncate_utf8_prefix(&masked, MAX_PAYLOAD_CHARS)
    } else {
        masked
    }
}

fn obfuscate_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in map.iter() {
                if SENSITIVE_KEY_RE.is_match(key) {
                    out.insert(key.clone(), Value::String(MASK.to_string()));
                } else {
                    out.insert(key.clone(), obfuscate_value(entry));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(obfuscate_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::{obfuscate_capped, obfuscate_payload, MASK};

    #[test]
    fn masks_sensitive_keys_in_json() {
        let raw = r#"{"api_token":"s3cret","city":"Oslo"}"#;
        let masked = obfuscate_payload(raw);
        assert!(masked.contains(MASK));
        assert!(!masked.contains("s3cret"));
        assert!(masked.contains("Oslo"));
    }

    #[test]
    fn masks_nested_sensitive_subtrees() {
        let raw = r#"{"auth":{"user":"bob","password":"pw"},"count":2}"#;
        let masked = obfuscate_payload(raw);
        assert!(!masked.contains("bob"));
        assert!(!masked.contains("pw"));
        assert!(masked.contains("\"count\":2"));
    }

    #[test]
    fn passes_through_plain_text() {
        assert_eq!(obfuscate_payload("request timed out"), "request timed out");
    }

    #[test]
    fn masks_plain_text_with_inline_secret() {
        assert_eq!(obfuscate_payload("retry with token=abc123"), MASK);
        assert_eq!(obfuscate_payload("password = hunter2"), MASK);
    }

    #[test]
    fn caps_oversized_payloads() {
        let raw = format!("{{\"note\":\"{}\"}}", "x".repeat(20_000));
        let masked = obfuscate_capped(&raw);
        assert!(masked.len() <= crate::constants::audit::MAX_PAYLOAD_CHARS);
    }
}
