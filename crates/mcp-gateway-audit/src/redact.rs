//! Redaction of sensitive fields before an audit entry is hashed or written
//! (§4.8).
//!
//! Any object key containing (case-insensitively) `password`, `token`,
//! `key`, or `secret` is replaced with a fixed marker before hashing, so the
//! `dataHash` on an audit entry never leaks the value it's meant to attest
//! to.

use sha2::{Digest, Sha256};

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_MARKERS: [&str; 4] = ["password", "token", "key", "secret"];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Walk a JSON value, replacing any object value whose key matches a
/// sensitive marker with `[REDACTED]`. Arrays and nested objects are walked
/// recursively; scalars and non-sensitive keys pass through unchanged.
pub fn redact(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), serde_json::Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact(val));
                }
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact).collect())
        }
        other => other.clone(),
    }
}

/// The first 16 hex characters of the SHA-256 digest of the redacted value's
/// canonical JSON serialization. Short enough to fit an audit log line,
/// unique enough to correlate entries without round-tripping arguments.
#[must_use]
pub fn redacted_hash(value: &serde_json::Value) -> String {
    let redacted = redact(value);
    let canonical = serde_json::to_vec(&redacted).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    let full_hex = format!("{digest:x}");
    full_hex[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_password_and_token_keys_case_insensitively() {
        let value = json!({
            "Password": "hunter2",
            "apiToken": "abc123",
            "username": "alice",
        });
        let redacted = redact(&value);
        assert_eq!(redacted["Password"], json!(REDACTED));
        assert_eq!(redacted["apiToken"], json!(REDACTED));
        assert_eq!(redacted["username"], json!("alice"));
    }

    #[test]
    fn redacts_nested_objects_and_arrays() {
        let value = json!({
            "args": [{"secretKey": "shh"}, {"note": "fine"}],
        });
        let redacted = redact(&value);
        assert_eq!(redacted["args"][0]["secretKey"], json!(REDACTED));
        assert_eq!(redacted["args"][1]["note"], json!("fine"));
    }

    #[test]
    fn hash_is_stable_for_equivalent_input_and_differs_on_change() {
        let a = json!({"password": "x", "n": 1});
        let b = json!({"password": "y", "n": 1});
        assert_eq!(redacted_hash(&a), redacted_hash(&b));

        let c = json!({"password": "x", "n": 2});
        assert_ne!(redacted_hash(&a), redacted_hash(&c));
    }

    #[test]
    fn hash_is_sixteen_hex_characters() {
        let hash = redacted_hash(&json!({"a": 1}));
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
