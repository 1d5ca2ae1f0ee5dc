//! Canonical JSON for schema content.
//!
//! - Object keys sorted lexicographically (UTF-8 byte order)
//! - No whitespace
//! - Array order preserved
//!
//! Unlike canonical forms meant for cross-language signing, client schema
//! documents may legitimately contain floats (JSON Schema `multipleOf`,
//! OpenAPI examples), so numbers are passed through with `serde_json`'s
//! deterministic formatting instead of being rejected.

use serde_json::{Map, Number, Value};

use tabula_core::ArtifactType;

use super::{CanonError, Canonicalizer};

/// Canonicalizer for JSON-based schema content.
pub struct JsonCanonicalizer;

impl Canonicalizer for JsonCanonicalizer {
    fn artifact_type(&self) -> ArtifactType {
        ArtifactType::json()
    }

    fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>, CanonError> {
        let value: Value = serde_json::from_slice(content)
            .map_err(|e| CanonError::malformed(format!("invalid JSON: {e}")))?;
        let mut out = Vec::with_capacity(content.len());
        write_value(&value, &mut out)?;
        Ok(out)
    }
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => write_string(s, out)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => write_object(map, out)?,
    }
    Ok(())
}

fn write_object(map: &Map<String, Value>, out: &mut Vec<u8>) -> Result<(), CanonError> {
    out.push(b'{');

    // Sort explicitly rather than relying on serde_json's map backing, which
    // flips to insertion order if any dependency enables `preserve_order`.
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        write_string(key, out)?;
        out.push(b':');
        if let Some(value) = map.get(*key) {
            write_value(value, out)?;
        }
    }

    out.push(b'}');
    Ok(())
}

fn write_number(n: &Number, out: &mut Vec<u8>) {
    // Display for serde_json::Number goes through itoa/ryu, which render a
    // given value identically on every platform.
    out.extend_from_slice(n.to_string().as_bytes());
}

fn write_string(s: &str, out: &mut Vec<u8>) -> Result<(), CanonError> {
    serde_json::to_writer(&mut *out, s)
        .map_err(|e| CanonError::render(format!("string encoding failed: {e}")))
}
