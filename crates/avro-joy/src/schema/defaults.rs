//! Structural validation of JSON default values.

use serde_json::Value;

use super::{Schema, SchemaKind};

/// Spellings accepted for non-finite float/double defaults.
pub(crate) fn non_finite_default(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

/// `true` if `default` is a structurally valid value of `schema`.
///
/// A union default must satisfy the first branch. Record defaults may omit
/// fields that carry their own default.
pub(crate) fn is_valid_default(schema: &Schema, default: &Value) -> bool {
    match schema.kind() {
        SchemaKind::String | SchemaKind::Bytes | SchemaKind::Fixed(_) => default.is_string(),
        SchemaKind::Enum(e) => default
            .as_str()
            .is_some_and(|symbol| e.ordinal(symbol).is_some()),
        SchemaKind::Int => default
            .as_i64()
            .is_some_and(|n| i32::try_from(n).is_ok()),
        SchemaKind::Long => default.is_i64(),
        SchemaKind::Float | SchemaKind::Double => match default {
            Value::Number(_) => true,
            Value::String(text) => non_finite_default(text).is_some(),
            _ => false,
        },
        SchemaKind::Boolean => default.is_boolean(),
        SchemaKind::Null => default.is_null(),
        SchemaKind::Array(items) => default
            .as_array()
            .is_some_and(|values| values.iter().all(|v| is_valid_default(items, v))),
        SchemaKind::Map(values) => default
            .as_object()
            .is_some_and(|entries| entries.values().all(|v| is_valid_default(values, v))),
        SchemaKind::Union(u) => u
            .types()
            .first()
            .is_some_and(|first| is_valid_default(first, default)),
        SchemaKind::Record(record) => {
            let (Some(object), Ok(fields)) = (default.as_object(), record.fields()) else {
                return false;
            };
            fields.iter().all(|field| {
                match object.get(field.name()).or(field.default_value()) {
                    Some(value) => is_valid_default(field.schema(), value),
                    None => false,
                }
            })
        }
    }
}
