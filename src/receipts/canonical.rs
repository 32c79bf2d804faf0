//! Canonical JSON serialization for receipt signing.
//!
//! Signatures are computed over a deterministic byte representation of the
//! receipt content, so two structurally equal receipts always canonicalize to
//! identical bytes regardless of map iteration order or field declaration
//! order. The rules follow RFC 8785 (JCS):
//!
//! - Object keys sorted lexicographically by Unicode code point, at every level
//! - No insignificant whitespace
//! - Minimal string escaping (only `"`, `\`, and control characters)
//! - Integer-only numbers; floats are rejected outright
//!
//! Costs never appear as JSON numbers: they are Decimal values serialized as
//! strings before reaching this module, and timestamps are pre-formatted
//! RFC 3339 strings. The float rejection here is the backstop that makes a
//! nondeterministic encoding a hard error instead of a silent drift.

use serde_json::{Map, Number, Value};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalError {
    /// A float reached the canonicalizer. Receipt content must encode
    /// non-integer quantities as strings.
    #[error("float not allowed in canonical receipt content")]
    FloatNotAllowed,
}

/// Serialize a JSON value to its canonical byte representation.
pub fn to_canonical_bytes(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out.into_bytes())
}

fn write_value(value: &Value, out: &mut String) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => write_string(s, out),
        Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(obj) => write_object(obj, out)?,
    }
    Ok(())
}

fn write_number(n: &Number, out: &mut String) -> Result<(), CanonicalError> {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
        Ok(())
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
        Ok(())
    } else {
        Err(CanonicalError::FloatNotAllowed)
    }
}

/// Minimal escaping per RFC 8785 section 3.2.2.2: only `"`, `\`, and
/// U+0000..U+001F are escaped, short forms where JSON defines them.
fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if ('\u{0000}'..='\u{001F}').contains(&c) => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_object(obj: &Map<String, Value>, out: &mut String) -> Result<(), CanonicalError> {
    let mut keys: Vec<&String> = obj.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, out);
        out.push(':');
        write_value(&obj[*key], out)?;
    }
    out.push('}');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical_str(value: &Value) -> String {
        String::from_utf8(to_canonical_bytes(value).unwrap()).unwrap()
    }

    #[test]
    fn keys_sorted_at_every_level() {
        let value = json!({"z": 1, "a": {"y": 2, "b": 3}});
        assert_eq!(canonical_str(&value), r#"{"a":{"b":3,"y":2},"z":1}"#);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut a = Map::new();
        a.insert("total_cost".into(), json!("0.06"));
        a.insert("by_model".into(), json!({}));

        let mut b = Map::new();
        b.insert("by_model".into(), json!({}));
        b.insert("total_cost".into(), json!("0.06"));

        assert_eq!(
            to_canonical_bytes(&Value::Object(a)).unwrap(),
            to_canonical_bytes(&Value::Object(b)).unwrap()
        );
    }

    #[test]
    fn arrays_preserve_order() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonical_str(&value), "[3,1,2]");
    }

    #[test]
    fn no_whitespace_emitted() {
        let value = json!({"key": "value", "num": 42, "list": [1, 2]});
        let s = canonical_str(&value);
        assert!(!s.contains(' '));
        assert_eq!(s, r#"{"key":"value","list":[1,2],"num":42}"#);
    }

    #[test]
    fn floats_rejected() {
        let value = json!({"cost": 0.1});
        assert_eq!(
            to_canonical_bytes(&value),
            Err(CanonicalError::FloatNotAllowed)
        );
    }

    #[test]
    fn float_nested_in_array_rejected() {
        let value = json!({"xs": [1, 2.5]});
        assert_eq!(
            to_canonical_bytes(&value),
            Err(CanonicalError::FloatNotAllowed)
        );
    }

    #[test]
    fn integers_and_negatives_pass() {
        let value = json!({"a": 0, "b": -42, "c": i64::MAX});
        assert_eq!(
            canonical_str(&value),
            format!(r#"{{"a":0,"b":-42,"c":{}}}"#, i64::MAX)
        );
    }

    #[test]
    fn control_characters_escaped_minimally() {
        let value = json!({"text": "line1\nline2\ttab \"q\" \u{0001}"});
        assert_eq!(
            canonical_str(&value),
            r#"{"text":"line1\nline2\ttab \"q\" \u0001"}"#
        );
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let value = json!({"b": {"d": 1, "c": 2}, "a": [1, {"y": 1, "x": 2}]});
        let once = canonical_str(&value);
        let reparsed: Value = serde_json::from_str(&once).unwrap();
        assert_eq!(canonical_str(&reparsed), once);
    }
}
