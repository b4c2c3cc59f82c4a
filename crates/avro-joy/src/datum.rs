//! Schema-driven datum writer and reader over any [`Encoder`]/[`Decoder`].

use crate::error::{AvroError, Result};
use crate::io::{Decoder, Encoder};
use crate::schema::{Schema, SchemaKind};
use crate::value::{default_value, AvroValue};

/// Writes `value` under `schema`.
///
/// Record fields missing from the value are written from the field default.
pub fn write_datum<E: Encoder + ?Sized>(
    encoder: &mut E,
    schema: &Schema,
    value: &AvroValue,
) -> Result<()> {
    match (schema.kind(), value) {
        (SchemaKind::Null, AvroValue::Null) => encoder.write_null(),
        (SchemaKind::Boolean, AvroValue::Bool(b)) => encoder.write_boolean(*b),
        (SchemaKind::Int, AvroValue::Int(n)) => encoder.write_int(*n),
        (SchemaKind::Long, AvroValue::Long(n)) => encoder.write_long(*n),
        (SchemaKind::Float, AvroValue::Float(f)) => encoder.write_float(*f),
        (SchemaKind::Double, AvroValue::Double(f)) => encoder.write_double(*f),
        (SchemaKind::Bytes, AvroValue::Bytes(b)) => encoder.write_bytes(b),
        (SchemaKind::String, AvroValue::Str(s)) => encoder.write_string(s),
        (SchemaKind::Record(record), AvroValue::Record(pairs)) => {
            for field in record.fields()? {
                let given = pairs.iter().find(|(k, _)| k == field.name()).map(|(_, v)| v);
                match (given, field.default_value()) {
                    (Some(v), _) => write_datum(encoder, field.schema(), v)?,
                    (None, Some(json)) => {
                        let v = default_value(field.schema(), json)?;
                        write_datum(encoder, field.schema(), &v)?;
                    }
                    (None, None) => {
                        return Err(AvroError::encoding(format!(
                            "required field {} missing from {} value",
                            field.name(),
                            schema.full_name()
                        )))
                    }
                }
            }
            Ok(())
        }
        (SchemaKind::Enum(e), AvroValue::Enum(symbol)) => {
            let ordinal = e.ordinal(symbol).ok_or_else(|| {
                AvroError::encoding(format!(
                    "enum symbol {symbol} not found in {}",
                    schema.full_name()
                ))
            })?;
            encoder.write_enum(ordinal)
        }
        (SchemaKind::Array(items), AvroValue::Array(values)) => {
            encoder.write_array_start()?;
            encoder.set_item_count(values.len())?;
            for item in values {
                encoder.start_item()?;
                write_datum(encoder, items, item)?;
            }
            encoder.write_array_end()
        }
        (SchemaKind::Map(values), AvroValue::Map(entries)) => {
            encoder.write_map_start()?;
            encoder.set_item_count(entries.len())?;
            for (key, value) in entries {
                encoder.start_item()?;
                encoder.write_string(key)?;
                write_datum(encoder, values, value)?;
            }
            encoder.write_map_end()
        }
        (SchemaKind::Fixed(f), AvroValue::Fixed(bytes)) => {
            if bytes.len() != f.size() {
                return Err(AvroError::encoding(format!(
                    "fixed size mismatch for {}: expected {}, found {}",
                    schema.full_name(),
                    f.size(),
                    bytes.len()
                )));
            }
            encoder.write_fixed(bytes)
        }
        (SchemaKind::Union(u), AvroValue::Union { index, value }) => {
            let branch = u.types().get(*index).ok_or_else(|| {
                AvroError::encoding(format!(
                    "union index {index} out of range for {} branches",
                    u.types().len()
                ))
            })?;
            encoder.write_index(*index)?;
            write_datum(encoder, branch, value)
        }
        (_, value) => Err(AvroError::encoding(format!(
            "{} value does not match {} schema",
            value.type_name(),
            schema.schema_type()
        ))),
    }
}

/// Options for [`read_datum_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatumReaderConfig {
    max_collection_items: usize,
}

impl DatumReaderConfig {
    pub const DEFAULT_MAX_COLLECTION_ITEMS: usize = 1 << 24;

    pub fn new() -> Self {
        Self {
            max_collection_items: Self::DEFAULT_MAX_COLLECTION_ITEMS,
        }
    }

    /// Largest number of items a single array or map may hold. Block
    /// counts are read from the input, and items such as `null` take no
    /// bytes, so the input length alone does not bound them.
    pub fn with_max_collection_items(mut self, max: usize) -> Self {
        self.max_collection_items = max;
        self
    }

    pub fn max_collection_items(&self) -> usize {
        self.max_collection_items
    }

    fn check_items(&self, what: &str, held: usize, incoming: usize) -> Result<()> {
        match held.checked_add(incoming) {
            Some(total) if total <= self.max_collection_items => Ok(()),
            _ => Err(AvroError::malformed(format!(
                "{what} of more than {} items",
                self.max_collection_items
            ))),
        }
    }
}

impl Default for DatumReaderConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads one value of `schema` with the default [`DatumReaderConfig`].
///
/// When the decoder reports a field order (see
/// [`Decoder::read_field_order`]) record fields are read in that order; the
/// result always lists them in declaration order.
pub fn read_datum<D: Decoder + ?Sized>(decoder: &mut D, schema: &Schema) -> Result<AvroValue> {
    read_datum_with(decoder, schema, &DatumReaderConfig::default())
}

pub fn read_datum_with<D: Decoder + ?Sized>(
    decoder: &mut D,
    schema: &Schema,
    config: &DatumReaderConfig,
) -> Result<AvroValue> {
    let value = match schema.kind() {
        SchemaKind::Null => {
            decoder.read_null()?;
            AvroValue::Null
        }
        SchemaKind::Boolean => AvroValue::Bool(decoder.read_boolean()?),
        SchemaKind::Int => AvroValue::Int(decoder.read_int()?),
        SchemaKind::Long => AvroValue::Long(decoder.read_long()?),
        SchemaKind::Float => AvroValue::Float(decoder.read_float()?),
        SchemaKind::Double => AvroValue::Double(decoder.read_double()?),
        SchemaKind::Bytes => AvroValue::Bytes(decoder.read_bytes()?),
        SchemaKind::String => AvroValue::Str(decoder.read_string()?),
        SchemaKind::Record(record) => {
            let declared = record.fields()?;
            let mut slots: Vec<Option<AvroValue>> = vec![None; declared.len()];
            match decoder.read_field_order()? {
                Some(order) => {
                    for field in order.iter() {
                        let pos = declared
                            .iter()
                            .position(|f| f.name() == field.name())
                            .ok_or_else(|| {
                                AvroError::mismatch(
                                    format!("field of {}", schema.full_name()),
                                    field.name(),
                                )
                            })?;
                        slots[pos] = Some(read_datum_with(decoder, field.schema(), config)?);
                    }
                }
                None => {
                    for (slot, field) in slots.iter_mut().zip(declared) {
                        *slot = Some(read_datum_with(decoder, field.schema(), config)?);
                    }
                }
            }
            let mut fields = Vec::with_capacity(declared.len());
            for (field, slot) in declared.iter().zip(slots) {
                let value = slot.ok_or_else(|| {
                    AvroError::mismatch(format!("field {}", field.name()), "nothing")
                })?;
                fields.push((field.name().to_string(), value));
            }
            AvroValue::Record(fields)
        }
        SchemaKind::Enum(e) => {
            let ordinal = decoder.read_enum()?;
            let symbol = e.symbols().get(ordinal).ok_or_else(|| {
                AvroError::malformed(format!(
                    "enum ordinal {ordinal} out of range for {}",
                    schema.full_name()
                ))
            })?;
            AvroValue::Enum(symbol.clone())
        }
        SchemaKind::Array(items) => {
            let mut values = Vec::new();
            let mut n = decoder.read_array_start()?;
            while n > 0 {
                config.check_items("array", values.len(), n)?;
                for _ in 0..n {
                    values.push(read_datum_with(decoder, items, config)?);
                }
                n = decoder.array_next()?;
            }
            AvroValue::Array(values)
        }
        SchemaKind::Map(values) => {
            let mut entries = Vec::new();
            let mut n = decoder.read_map_start()?;
            while n > 0 {
                config.check_items("map", entries.len(), n)?;
                for _ in 0..n {
                    let key = decoder.read_string()?;
                    entries.push((key, read_datum_with(decoder, values, config)?));
                }
                n = decoder.map_next()?;
            }
            AvroValue::Map(entries)
        }
        SchemaKind::Fixed(f) => AvroValue::Fixed(decoder.read_fixed(f.size())?),
        SchemaKind::Union(u) => {
            let index = decoder.read_index()?;
            let branch = u.types().get(index).ok_or_else(|| {
                AvroError::malformed(format!(
                    "union index {index} out of range for {} branches",
                    u.types().len()
                ))
            })?;
            AvroValue::union(index, read_datum_with(decoder, branch, config)?)
        }
    };
    Ok(value)
}
