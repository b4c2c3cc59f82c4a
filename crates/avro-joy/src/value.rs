//! Generic Avro values.

use serde_json::Value;

use crate::error::{AvroError, Result};
use crate::json::latin1_bytes;
use crate::schema::defaults::non_finite_default;
use crate::schema::{Schema, SchemaKind};

/// Avro runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Str(String),
    Record(Vec<(String, AvroValue)>),
    Enum(String),
    Array(Vec<AvroValue>),
    Map(Vec<(String, AvroValue)>),
    Fixed(Vec<u8>),
    Union { index: usize, value: Box<AvroValue> },
}

impl AvroValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AvroValue::Null => "null",
            AvroValue::Bool(_) => "boolean",
            AvroValue::Int(_) => "int",
            AvroValue::Long(_) => "long",
            AvroValue::Float(_) => "float",
            AvroValue::Double(_) => "double",
            AvroValue::Bytes(_) => "bytes",
            AvroValue::Str(_) => "string",
            AvroValue::Record(_) => "record",
            AvroValue::Enum(_) => "enum",
            AvroValue::Array(_) => "array",
            AvroValue::Map(_) => "map",
            AvroValue::Fixed(_) => "fixed",
            AvroValue::Union { .. } => "union",
        }
    }

    /// Value of a record field by name.
    pub fn field(&self, name: &str) -> Option<&AvroValue> {
        match self {
            AvroValue::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn union(index: usize, value: AvroValue) -> Self {
        AvroValue::Union {
            index,
            value: Box::new(value),
        }
    }
}

/// Materializes a JSON default under `schema`.
///
/// Union defaults belong to the first branch. Bytes and fixed defaults are
/// strings with one ISO-8859-1 character per byte. Float and double accept
/// `"NaN"`, `"Infinity"` and `"-Infinity"`.
pub fn default_value(schema: &Schema, json: &Value) -> Result<AvroValue> {
    let invalid = || {
        AvroError::encoding(format!(
            "invalid default {json} for {} schema",
            schema.schema_type()
        ))
    };
    let value = match schema.kind() {
        SchemaKind::Null if json.is_null() => AvroValue::Null,
        SchemaKind::Boolean => AvroValue::Bool(json.as_bool().ok_or_else(invalid)?),
        SchemaKind::Int => {
            let n = json.as_i64().ok_or_else(invalid)?;
            AvroValue::Int(i32::try_from(n).map_err(|_| invalid())?)
        }
        SchemaKind::Long => AvroValue::Long(json.as_i64().ok_or_else(invalid)?),
        SchemaKind::Float => AvroValue::Float(float_default(json).ok_or_else(invalid)? as f32),
        SchemaKind::Double => AvroValue::Double(float_default(json).ok_or_else(invalid)?),
        SchemaKind::String => AvroValue::Str(json.as_str().ok_or_else(invalid)?.to_string()),
        SchemaKind::Bytes => {
            let text = json.as_str().ok_or_else(invalid)?;
            AvroValue::Bytes(latin1_bytes(text).map_err(|_| invalid())?)
        }
        SchemaKind::Fixed(f) => {
            let text = json.as_str().ok_or_else(invalid)?;
            let bytes = latin1_bytes(text).map_err(|_| invalid())?;
            if bytes.len() != f.size() {
                return Err(invalid());
            }
            AvroValue::Fixed(bytes)
        }
        SchemaKind::Enum(e) => {
            let symbol = json.as_str().ok_or_else(invalid)?;
            if e.ordinal(symbol).is_none() {
                return Err(invalid());
            }
            AvroValue::Enum(symbol.to_string())
        }
        SchemaKind::Array(items) => AvroValue::Array(
            json.as_array()
                .ok_or_else(invalid)?
                .iter()
                .map(|v| default_value(items, v))
                .collect::<Result<_>>()?,
        ),
        SchemaKind::Map(values) => AvroValue::Map(
            json.as_object()
                .ok_or_else(invalid)?
                .iter()
                .map(|(k, v)| Ok((k.clone(), default_value(values, v)?)))
                .collect::<Result<_>>()?,
        ),
        SchemaKind::Union(u) => {
            let first = u.types().first().ok_or_else(invalid)?;
            AvroValue::union(0, default_value(first, json)?)
        }
        SchemaKind::Record(record) => {
            let object = json.as_object().ok_or_else(invalid)?;
            let mut fields = Vec::new();
            for field in record.fields()? {
                let value = object
                    .get(field.name())
                    .or(field.default_value())
                    .ok_or_else(|| {
                        AvroError::encoding(format!(
                            "default for {} is missing field {}",
                            schema.full_name(),
                            field.name()
                        ))
                    })?;
                fields.push((field.name().to_string(), default_value(field.schema(), value)?));
            }
            AvroValue::Record(fields)
        }
        SchemaKind::Null => return Err(invalid()),
    };
    Ok(value)
}

fn float_default(json: &Value) -> Option<f64> {
    match json {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => non_finite_default(text),
        _ => None,
    }
}
