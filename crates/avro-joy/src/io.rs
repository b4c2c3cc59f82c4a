//! The codec interfaces shared by the binary, JSON and resolving codecs.

use std::sync::Arc;

use crate::error::Result;
use crate::schema::Field;

/// Streams Avro values out.
///
/// Arrays and maps are written as `*_start`, then `set_item_count` and one
/// `start_item` per element, then `*_end`. A union value is its branch
/// index followed by the branch value.
pub trait Encoder {
    fn write_null(&mut self) -> Result<()>;
    fn write_boolean(&mut self, value: bool) -> Result<()>;
    fn write_int(&mut self, value: i32) -> Result<()>;
    fn write_long(&mut self, value: i64) -> Result<()>;
    fn write_float(&mut self, value: f32) -> Result<()>;
    fn write_double(&mut self, value: f64) -> Result<()>;
    fn write_string(&mut self, value: &str) -> Result<()>;
    fn write_bytes(&mut self, value: &[u8]) -> Result<()>;
    fn write_fixed(&mut self, value: &[u8]) -> Result<()>;
    fn write_enum(&mut self, ordinal: usize) -> Result<()>;
    fn write_array_start(&mut self) -> Result<()>;
    fn set_item_count(&mut self, count: usize) -> Result<()>;
    fn start_item(&mut self) -> Result<()>;
    fn write_array_end(&mut self) -> Result<()>;
    fn write_map_start(&mut self) -> Result<()>;
    fn write_map_end(&mut self) -> Result<()>;
    fn write_index(&mut self, index: usize) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Streams Avro values in.
///
/// `read_array_start` and `array_next` return the number of items in the
/// next block, zero once the array is exhausted. Maps work the same way.
pub trait Decoder {
    fn read_null(&mut self) -> Result<()>;
    fn read_boolean(&mut self) -> Result<bool>;
    fn read_int(&mut self) -> Result<i32>;
    fn read_long(&mut self) -> Result<i64>;
    fn read_float(&mut self) -> Result<f32>;
    fn read_double(&mut self) -> Result<f64>;
    fn read_string(&mut self) -> Result<String>;
    fn skip_string(&mut self) -> Result<()>;
    fn read_bytes(&mut self) -> Result<Vec<u8>>;
    fn skip_bytes(&mut self) -> Result<()>;
    fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>>;
    fn skip_fixed(&mut self, size: usize) -> Result<()>;
    fn read_enum(&mut self) -> Result<usize>;
    fn read_array_start(&mut self) -> Result<usize>;
    fn array_next(&mut self) -> Result<usize>;
    /// Skips whole blocks where the encoding allows it and returns the item
    /// count of the first block that must be skipped item by item.
    fn skip_array(&mut self) -> Result<usize>;
    fn read_map_start(&mut self) -> Result<usize>;
    fn map_next(&mut self) -> Result<usize>;
    fn skip_map(&mut self) -> Result<usize>;
    fn read_index(&mut self) -> Result<usize>;

    /// Reader fields in the order their values arrive, for decoders that
    /// reorder record fields. Must be called once at the start of a record.
    fn read_field_order(&mut self) -> Result<Option<Arc<[Field]>>> {
        Ok(None)
    }
}
