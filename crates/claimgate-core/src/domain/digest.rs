//! Canonical JSON and SHA-256 digests.
//!
//! Canonical form: object keys sorted by UTF-16 code units, integer-valued
//! floats collapsed to integers, compact `,`/`:` separators. Arrays keep
//! their order.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::domain::error::{GatewayError, Result};

fn normalize_numbers(value: &Value) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let mut normalized = Map::new();
            for (key, v) in map {
                normalized.insert(key.clone(), normalize_numbers(v)?);
            }
            Ok(Value::Object(normalized))
        }
        Value::Array(items) => items
            .iter()
            .map(normalize_numbers)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Number(n) if !(n.is_i64() || n.is_u64()) => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err(GatewayError::NonCanonical(format!("non-finite number {n}")));
            }
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(Value::Number(Number::from(f as i64)))
            } else {
                Ok(Value::Number(n.clone()))
            }
        }
        other => Ok(other.clone()),
    }
}

/// Render `value` in canonical compact form.
pub fn canonical_json(value: &Value) -> Result<String> {
    // serde_json's map order is UTF-8 byte order (or insertion order with
    // `preserve_order`), so keys are emitted by hand in UTF-16 order.
    let canonical = normalize_numbers(value)?;
    let mut out = String::new();
    write_canonical(&canonical, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

/// SHA-256 hex digest of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 hex digest of the canonical JSON form of `value`.
pub fn canonical_digest<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    Ok(sha256_hex(canonical_json(&json)?.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let input = json!({ "to": "supported", "from": "proposed", "meta": { "z": 1, "a": 2 } });
        let canonical = canonical_json(&input).expect("canonical_json");
        assert_eq!(
            canonical,
            r#"{"from":"proposed","meta":{"a":2,"z":1},"to":"supported"}"#
        );
    }

    #[test]
    fn test_canonical_json_key_order_invariant() {
        let a = json!({ "claim_id": "claim-001", "evidence_id": "ev-002", "from": "proposed" });
        let b = json!({ "from": "proposed", "evidence_id": "ev-002", "claim_id": "claim-001" });
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn test_canonical_json_array_order_preserved() {
        let a = json!({ "authority_requirements": ["reviewer", "orchestrator"] });
        let b = json!({ "authority_requirements": ["orchestrator", "reviewer"] });
        assert_ne!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn test_canonical_json_integer_valued_float() {
        let canonical = canonical_json(&json!({ "value": 2.0 })).unwrap();
        assert_eq!(canonical, r#"{"value":2}"#);
        let canonical = canonical_json(&json!({ "value": 2.5 })).unwrap();
        assert_eq!(canonical, r#"{"value":2.5}"#);
    }

    #[test]
    fn test_canonical_json_utf16_key_order() {
        // U+1F600 is encoded with surrogates (0xD83D..), so it sorts before
        // U+FF61 in UTF-16 although it sorts after it in UTF-8.
        let input = json!({ "\u{FF61}": 1, "\u{1F600}": 2 });
        let canonical = canonical_json(&input).unwrap();
        let emoji = canonical.find('\u{1F600}').unwrap();
        let halfwidth = canonical.find('\u{FF61}').unwrap();
        assert!(emoji < halfwidth);
    }

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_canonical_digest_shape() {
        let digest = canonical_digest(&json!({ "type": "claim_transition" })).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
