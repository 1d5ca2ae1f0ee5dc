//! Avro schema canonicalization (Parsing Canonical Form).
//!
//! Transforms applied, per the Avro specification:
//! - `{"type": "int"}` and friends reduce to the bare primitive string
//! - Named types and references are emitted as fullnames; `namespace`
//!   attributes disappear
//! - Only parsing-relevant attributes survive (`type`, `name`, `fields`,
//!   `symbols`, `items`, `values`, `size`); `doc`, `aliases`, `default`,
//!   field `order` and logical types are stripped
//! - Attributes are emitted in the fixed PCF order with no whitespace
//!
//! PCF mandates a field order (`name` before `type` before `fields`, ...),
//! so output is rendered directly instead of going through a JSON map, whose
//! key ordering we do not control.

use serde_json::{Map, Value};

use tabula_core::ArtifactType;

use super::{CanonError, Canonicalizer};

const PRIMITIVES: [&str; 8] = [
    "null", "boolean", "int", "long", "float", "double", "bytes", "string",
];

/// Canonicalizer for Avro schema content.
pub struct AvroCanonicalizer;

impl Canonicalizer for AvroCanonicalizer {
    fn artifact_type(&self) -> ArtifactType {
        ArtifactType::avro()
    }

    fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>, CanonError> {
        let schema: Value = serde_json::from_slice(content)
            .map_err(|e| CanonError::malformed(format!("invalid JSON: {e}")))?;
        let mut out = String::with_capacity(content.len());
        write_schema(&schema, None, &mut out)?;
        Ok(out.into_bytes())
    }
}

fn write_schema(
    schema: &Value,
    enclosing_namespace: Option<&str>,
    out: &mut String,
) -> Result<(), CanonError> {
    match schema {
        Value::String(name) => write_reference(name, enclosing_namespace, out),
        Value::Array(branches) => {
            out.push('[');
            for (i, branch) in branches.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_schema(branch, enclosing_namespace, out)?;
            }
            out.push(']');
            Ok(())
        }
        Value::Object(map) => write_complex(map, enclosing_namespace, out),
        other => Err(CanonError::malformed(format!(
            "expected schema, found {other}"
        ))),
    }
}

fn write_complex(
    map: &Map<String, Value>,
    enclosing_namespace: Option<&str>,
    out: &mut String,
) -> Result<(), CanonError> {
    let type_name = required_str(map, "type", "schema object")?;
    match type_name {
        // Attributes such as logicalType are dropped, so primitive objects
        // always collapse to the bare name.
        primitive if PRIMITIVES.contains(&primitive) => push_quoted(primitive, out),
        "record" => write_record(map, enclosing_namespace, out),
        "enum" => write_enum(map, enclosing_namespace, out),
        "fixed" => write_fixed(map, enclosing_namespace, out),
        "array" => {
            let items = map
                .get("items")
                .ok_or_else(|| CanonError::malformed("array schema requires \"items\""))?;
            out.push_str("{\"type\":\"array\",\"items\":");
            write_schema(items, enclosing_namespace, out)?;
            out.push('}');
            Ok(())
        }
        "map" => {
            let values = map
                .get("values")
                .ok_or_else(|| CanonError::malformed("map schema requires \"values\""))?;
            out.push_str("{\"type\":\"map\",\"values\":");
            write_schema(values, enclosing_namespace, out)?;
            out.push('}');
            Ok(())
        }
        reference => write_reference(reference, enclosing_namespace, out),
    }
}

fn write_record(
    map: &Map<String, Value>,
    enclosing_namespace: Option<&str>,
    out: &mut String,
) -> Result<(), CanonError> {
    let fullname = resolve_fullname(map, enclosing_namespace, "record")?;
    let child_namespace = namespace_of(&fullname);

    let fields = map
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| CanonError::malformed("record schema requires a \"fields\" array"))?;

    out.push_str("{\"name\":");
    push_quoted(&fullname, out)?;
    out.push_str(",\"type\":\"record\",\"fields\":[");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let field = field
            .as_object()
            .ok_or_else(|| CanonError::malformed("record field must be an object"))?;
        let field_name = required_str(field, "name", "record field")?;
        let field_type = field
            .get("type")
            .ok_or_else(|| CanonError::malformed("record field requires a \"type\""))?;

        out.push_str("{\"name\":");
        push_quoted(field_name, out)?;
        out.push_str(",\"type\":");
        write_schema(field_type, child_namespace, out)?;
        out.push('}');
    }
    out.push_str("]}");
    Ok(())
}

fn write_enum(
    map: &Map<String, Value>,
    enclosing_namespace: Option<&str>,
    out: &mut String,
) -> Result<(), CanonError> {
    let fullname = resolve_fullname(map, enclosing_namespace, "enum")?;
    let symbols = map
        .get("symbols")
        .and_then(Value::as_array)
        .ok_or_else(|| CanonError::malformed("enum schema requires a \"symbols\" array"))?;

    out.push_str("{\"name\":");
    push_quoted(&fullname, out)?;
    out.push_str(",\"type\":\"enum\",\"symbols\":[");
    for (i, symbol) in symbols.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let symbol = symbol
            .as_str()
            .ok_or_else(|| CanonError::malformed("enum symbols must be strings"))?;
        push_quoted(symbol, out)?;
    }
    out.push_str("]}");
    Ok(())
}

fn write_fixed(
    map: &Map<String, Value>,
    enclosing_namespace: Option<&str>,
    out: &mut String,
) -> Result<(), CanonError> {
    let fullname = resolve_fullname(map, enclosing_namespace, "fixed")?;
    let size = map
        .get("size")
        .and_then(Value::as_u64)
        .ok_or_else(|| CanonError::malformed("fixed schema requires an integer \"size\""))?;

    out.push_str("{\"name\":");
    push_quoted(&fullname, out)?;
    out.push_str(",\"type\":\"fixed\",\"size\":");
    out.push_str(&size.to_string());
    out.push('}');
    Ok(())
}

fn write_reference(
    name: &str,
    enclosing_namespace: Option<&str>,
    out: &mut String,
) -> Result<(), CanonError> {
    if PRIMITIVES.contains(&name) {
        return push_quoted(name, out);
    }
    push_quoted(&qualify(name, None, enclosing_namespace), out)
}

fn resolve_fullname(
    map: &Map<String, Value>,
    enclosing_namespace: Option<&str>,
    context: &str,
) -> Result<String, CanonError> {
    let name = required_str(map, "name", context)?;
    let namespace = map.get("namespace").and_then(Value::as_str);
    Ok(qualify(name, namespace, enclosing_namespace))
}

/// Resolves a (possibly short) name to its fullname.
///
/// A dotted name is already full and ignores namespaces entirely. An
/// explicit empty `namespace` attribute selects the null namespace rather
/// than inheriting the enclosing one.
fn qualify(name: &str, namespace: Option<&str>, enclosing_namespace: Option<&str>) -> String {
    if name.contains('.') {
        return name.to_string();
    }
    let namespace = match namespace {
        Some("") => None,
        Some(ns) => Some(ns),
        None => enclosing_namespace,
    };
    match namespace {
        Some(ns) => format!("{ns}.{name}"),
        None => name.to_string(),
    }
}

fn namespace_of(fullname: &str) -> Option<&str> {
    fullname.rsplit_once('.').map(|(namespace, _)| namespace)
}

fn required_str<'a>(
    map: &'a Map<String, Value>,
    attr: &str,
    context: &str,
) -> Result<&'a str, CanonError> {
    map.get(attr).and_then(Value::as_str).ok_or_else(|| {
        CanonError::malformed(format!("{context} requires a string \"{attr}\" attribute"))
    })
}

fn push_quoted(s: &str, out: &mut String) -> Result<(), CanonError> {
    let rendered = serde_json::to_string(s)
        .map_err(|e| CanonError::render(format!("string encoding failed: {e}")))?;
    out.push_str(&rendered);
    Ok(())
}
