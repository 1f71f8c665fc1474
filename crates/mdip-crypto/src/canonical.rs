use serde::Serialize;
use serde_json::{Number, Value};
use std::cmp::Ordering;

use crate::error::CryptoError;

/// Serialize `value` as canonical JSON (RFC 8785).
///
/// Object keys are sorted by UTF-16 code units, no insignificant whitespace
/// is emitted, and integral floats are written without a fractional part.
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> Result<String, CryptoError> {
    let value = serde_json::to_value(value)?;
    let mut out = String::new();
    write_value(&value, &mut out)?;
    Ok(out)
}

/// Canonical JSON as bytes, the input to every hash and content id.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CryptoError> {
    canonicalize(value).map(String::into_bytes)
}

fn write_value(value: &Value, out: &mut String) -> Result<(), CryptoError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => out.push_str(&serde_json::to_string(s)?),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| utf16_cmp(a.0, b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_value(item, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(n: &Number, out: &mut String) -> Result<(), CryptoError> {
    if n.is_i64() || n.is_u64() {
        out.push_str(&n.to_string());
        return Ok(());
    }
    let f = n
        .as_f64()
        .ok_or_else(|| CryptoError::InvalidInput(format!("number {}", n)))?;
    if !f.is_finite() {
        return Err(CryptoError::InvalidInput(format!("number {}", n)));
    }
    if f.fract() == 0.0 && f.abs() < 1e21 {
        out.push_str(&format!("{}", f as i128));
    } else {
        out.push_str(&n.to_string());
    }
    Ok(())
}

fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_recursively() {
        let value = json!({"b": 1, "a": {"d": true, "c": null}, "arr": [{"z": 1, "y": 2}]});
        assert_eq!(
            canonicalize(&value).unwrap(),
            r#"{"a":{"c":null,"d":true},"arr":[{"y":2,"z":1}],"b":1}"#
        );
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let a = json!({"type": "create", "created": "now", "mdip": {"version": 1}});
        let b = json!({"mdip": {"version": 1}, "created": "now", "type": "create"});
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn test_integral_float_written_as_integer() {
        let value: Value = serde_json::from_str(r#"{"n": 1.0, "m": 2.5}"#).unwrap();
        assert_eq!(canonicalize(&value).unwrap(), r#"{"m":2.5,"n":1}"#);
    }

    #[test]
    fn test_utf16_key_order() {
        // U+1F600 sorts after U+FF61 by code point but before it in UTF-16.
        let value = json!({"\u{1F600}": 1, "\u{FF61}": 2});
        assert_eq!(canonicalize(&value).unwrap(), "{\"\u{1F600}\":1,\"\u{FF61}\":2}");
    }

    #[test]
    fn test_string_escaping() {
        let value = json!({"s": "line\nbreak \"quoted\" / é"});
        assert_eq!(
            canonicalize(&value).unwrap(),
            "{\"s\":\"line\\nbreak \\\"quoted\\\" / é\"}"
        );
    }
}
