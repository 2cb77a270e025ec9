//! Canonical CBOR encoding for deterministic serialization.
//!
//! Implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//!
//! Link hashes and signatures are computed over canonical bytes, so the same
//! link body must produce identical bytes on every platform regardless of
//! how the in-memory value was constructed.

use ciborium::value::Value;
use serde::Serialize;

use crate::error::GraphError;

/// Serialize a value to canonical CBOR bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, GraphError> {
    let value = Value::serialized(value).map_err(|e| GraphError::Encoding(e.to_string()))?;
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value)?;
    Ok(buf)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), GraphError> {
    match value {
        Value::Integer(i) => {
            encode_integer(buf, *i);
            Ok(())
        }
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
            Ok(())
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
            Ok(())
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
            Ok(())
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => {
            buf.push(if *b { 0xf5 } else { 0xf4 });
            Ok(())
        }
        Value::Null => {
            buf.push(0xf6);
            Ok(())
        }
        Value::Float(f) => {
            // Always 64-bit; shortest-float encoding would make the output
            // depend on the value's representability.
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_be_bytes());
            Ok(())
        }
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner)
        }
        _ => Err(GraphError::Encoding("unsupported CBOR value type".into())),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), GraphError> {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        key_value_pairs.push((key_buf, v));
    }

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u64,
        data: Vec<u8>,
    }

    #[test]
    fn test_encoding_deterministic() {
        let sample = Sample {
            name: "test".into(),
            count: 42,
            data: vec![1, 2, 3],
        };

        let b1 = to_canonical_bytes(&sample).unwrap();
        let b2 = to_canonical_bytes(&sample).unwrap();
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_map_keys_sorted() {
        // Insertion order must not affect the encoding.
        let mut a = BTreeMap::new();
        a.insert("zebra".to_string(), 1u64);
        a.insert("apple".to_string(), 2u64);

        let encoded = to_canonical_bytes(&a).unwrap();

        // Map header with 2 entries, then "apple" before "zebra".
        assert_eq!(encoded[0], 0xa2);
        assert_eq!(&encoded[2..7], b"apple");
    }

    #[test]
    fn test_integer_encoding_smallest() {
        let mut buf = Vec::new();

        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 65536);
        assert_eq!(buf, vec![0x1a, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_negative_integer_encoding() {
        let encoded = to_canonical_bytes(&-1i64).unwrap();
        assert_eq!(encoded, vec![0x20]);

        let encoded = to_canonical_bytes(&-25i64).unwrap();
        assert_eq!(encoded, vec![0x38, 24]);
    }

    #[test]
    fn test_option_encoding() {
        let none: Option<u64> = None;
        assert_eq!(to_canonical_bytes(&none).unwrap(), vec![0xf6]);

        let some: Option<u64> = Some(5);
        assert_eq!(to_canonical_bytes(&some).unwrap(), vec![0x05]);
    }
}
