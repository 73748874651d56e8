//! Canonical fingerprint codec.
//!
//! Every fingerprint is SHA-256 over an explicit little-endian byte layout,
//! rendered as lowercase hex. The payload encoders are public so callers and
//! tests can pin the layout independently of the digest.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ParityError;

/// Encoded in place of an absent word or sequence index.
pub const SENTINEL_NONE: i32 = i32::MIN;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// True for a 64-character lowercase hex digest.
pub fn is_fingerprint(value: &str) -> bool {
    value.len() == 64
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

pub fn encode_string(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + value.len());
    push_string(&mut out, value);
    out
}

pub fn encode_string_sequence<S: AsRef<str>>(values: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        push_string(&mut out, value.as_ref());
    }
    out
}

pub fn encode_int32_sequence(values: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn encode_uint32_sequence(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn encode_optional_int32_sequence(values: &[Option<i32>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.unwrap_or(SENTINEL_NONE).to_le_bytes());
    }
    out
}

pub fn encode_offsets(values: &[(i32, i32)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for (start, end) in values {
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&end.to_le_bytes());
    }
    out
}

fn push_string(out: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    // Saturates past u32::MAX bytes.
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
}

pub fn hash_string(value: &str) -> String {
    sha256_hex(&encode_string(value))
}

pub fn hash_string_sequence<S: AsRef<str>>(values: &[S]) -> String {
    sha256_hex(&encode_string_sequence(values))
}

pub fn hash_int32_sequence(values: &[i32]) -> String {
    sha256_hex(&encode_int32_sequence(values))
}

/// Token ids go through this layout. A non-negative id produces the same
/// bytes as its `hash_int32_sequence` counterpart.
pub fn hash_uint32_sequence(values: &[u32]) -> String {
    sha256_hex(&encode_uint32_sequence(values))
}

pub fn hash_optional_int32_sequence(values: &[Option<i32>]) -> String {
    sha256_hex(&encode_optional_int32_sequence(values))
}

pub fn hash_offsets(values: &[(i32, i32)]) -> String {
    sha256_hex(&encode_offsets(values))
}

/// Sorted-key, whitespace-free JSON.
pub fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>, ParityError> {
    let mut out = String::new();
    write_canonical_json(value, &mut out)?;
    Ok(out.into_bytes())
}

fn write_canonical_json(value: &Value, out: &mut String) -> Result<(), ParityError> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            let s = serde_json::to_string(value)
                .map_err(|err| ParityError::Json(format!("canonical json: {}", err)))?;
            out.push_str(&s);
            Ok(())
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out)?;
            }
            out.push(']');
            Ok(())
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                let key_json = serde_json::to_string(key)
                    .map_err(|err| ParityError::Json(format!("canonical json: {}", err)))?;
                out.push_str(&key_json);
                out.push(':');
                if let Some(val) = map.get(*key) {
                    write_canonical_json(val, out)?;
                }
            }
            out.push('}');
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_payload_is_length_prefixed() {
        assert_eq!(encode_string("ab"), vec![0x02, 0x00, 0x00, 0x00, 0x61, 0x62]);
        assert_eq!(encode_string(""), vec![0, 0, 0, 0]);
    }

    #[test]
    fn multibyte_length_counts_bytes_not_chars() {
        let payload = encode_string("é");
        assert_eq!(&payload[..4], &[2, 0, 0, 0]);
    }

    #[test]
    fn optional_sentinel_is_int_min() {
        assert_eq!(
            encode_optional_int32_sequence(&[None]),
            i32::MIN.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let value = serde_json::json!({"b": 1, "a": {"d": [1, 2], "c": null}});
        let bytes = canonical_json_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":{"c":null,"d":[1,2]},"b":1}"#
        );
    }

    #[test]
    fn fingerprint_shape() {
        assert!(is_fingerprint(&hash_string("x")));
        assert!(!is_fingerprint("ABC"));
        assert!(!is_fingerprint(&"G".repeat(64)));
    }
}
