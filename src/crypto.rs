//! Hashing primitives for PressLedger
//!
//! Blocks are hashed over a canonical JSON rendering: compact, no insignificant
//! whitespace, object keys sorted at every nesting level. The rendering does not
//! depend on how `serde_json` was built (`preserve_order` or not), so a digest
//! recomputed after a reload always matches the one taken at append time.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest, as stored in `hash` / `previous_hash`.
pub type HexDigest = String;

/// SHA-256 of arbitrary bytes, hex encoded.
pub fn sha256_hex(bytes: &[u8]) -> HexDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Canonical JSON text for `value`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Null, Bool and Number have a single compact rendering in serde_json.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

/// Digest of the canonical rendering of `value`.
pub fn hash_value(value: &Value) -> HexDigest {
    sha256_hex(canonical_json(value).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [3, {"y": null, "x": true}], "c": "s"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"s","z":[3,{"x":true,"y":null}]},"b":1}"#
        );
    }

    #[test]
    fn test_key_order_does_not_change_digest() {
        let a: Value = serde_json::from_str(r#"{"title":"T","cid":"abc","n":1.5}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{ "n" : 1.5, "cid":"abc",  "title":"T" }"#).unwrap();
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_single_field_change_changes_digest() {
        let a = json!({"title": "T", "cid": "abc"});
        let b = json!({"title": "T", "cid": "abd"});
        assert_ne!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_strings_are_escaped() {
        let value = json!({"q": "say \"hi\"\n"});
        assert_eq!(canonical_json(&value), r#"{"q":"say \"hi\"\n"}"#);
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
