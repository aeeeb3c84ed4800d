//! Canonical JSON encoding for deterministic plaintext hashing.
//!
//! Record bodies are JSON values assembled by callers, so the same logical
//! record can arrive with object keys in any order. The canonical encoding
//! sorts object keys recursively (byte-wise) and uses compact separators, so
//! identical logical records always produce identical bytes and therefore
//! identical [`DataHash`] values across all platforms.
//!
//! Array order is semantic and preserved. Strings are escaped with the
//! standard JSON rules; numbers render exactly as serde_json prints them.

use serde_json::Value;

use crate::types::DataHash;

/// Encode a JSON value to canonical bytes.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value);
    buf
}

/// Compute the [`DataHash`] of a JSON value's canonical encoding.
pub fn hash_value(value: &Value) -> DataHash {
    DataHash::hash(&canonical_bytes(value))
}

/// Recursively encode a value with sorted object keys.
fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => buf.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => encode_string(buf, s),
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                encode_value(buf, item);
            }
            buf.push(b']');
        }
        Value::Object(map) => {
            // Sort keys byte-wise; serde_json's default map may or may not
            // preserve insertion order depending on features, so never rely
            // on its iteration order.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            buf.push(b'{');
            for (i, (key, val)) in entries.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                encode_string(buf, key);
                buf.push(b':');
                encode_value(buf, val);
            }
            buf.push(b'}');
        }
    }
}

/// Encode a string with standard JSON escaping.
fn encode_string(buf: &mut Vec<u8>, s: &str) {
    // serde_json handles all escaping rules; strings never fail to encode.
    let quoted = serde_json::to_string(s).expect("string serialization is infallible");
    buf.extend_from_slice(quoted.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_independent() {
        let a = json!({"diagnosis": "flu", "treatment": "rest", "date": "2025-01-15"});
        let b = json!({"treatment": "rest", "date": "2025-01-15", "diagnosis": "flu"});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_nested_objects_sorted() {
        let a = json!({"outer": {"b": 2, "a": 1}, "x": true});
        let b = json!({"x": true, "outer": {"a": 1, "b": 2}});
        assert_eq!(hash_value(&a), hash_value(&b));

        let encoded = String::from_utf8(canonical_bytes(&a)).unwrap();
        assert_eq!(encoded, r#"{"outer":{"a":1,"b":2},"x":true}"#);
    }

    #[test]
    fn test_array_order_preserved() {
        let a = json!({"meds": ["ibuprofen", "paracetamol"]});
        let b = json!({"meds": ["paracetamol", "ibuprofen"]});
        assert_ne!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_scalars() {
        assert_eq!(canonical_bytes(&json!(null)), b"null");
        assert_eq!(canonical_bytes(&json!(true)), b"true");
        assert_eq!(canonical_bytes(&json!(42)), b"42");
        assert_eq!(canonical_bytes(&json!(-7)), b"-7");
    }

    #[test]
    fn test_string_escaping() {
        let v = json!({"note": "line1\nline2 \"quoted\""});
        let encoded = String::from_utf8(canonical_bytes(&v)).unwrap();
        assert_eq!(encoded, r#"{"note":"line1\nline2 \"quoted\""}"#);
    }

    #[test]
    fn test_unicode_stable() {
        let a = json!({"name": "Søren Müller"});
        let b = json!({"name": "Søren Müller"});
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = json!({"diagnosis": "flu"});
        let b = json!({"diagnosis": "cold"});
        assert_ne!(hash_value(&a), hash_value(&b));
    }
}
