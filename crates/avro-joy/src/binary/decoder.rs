use avro_joy_buffers::ByteSource;

use super::{unzigzag_int, unzigzag_long, MAX_INT_BYTES, MAX_LONG_BYTES};
use crate::error::{AvroError, Result};
use crate::io::Decoder;

/// Avro binary decoder pulling from any [`ByteSource`].
pub struct BinaryDecoder<S: ByteSource> {
    source: S,
}

impl<S: ByteSource> BinaryDecoder<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// `true` once the source is exhausted.
    pub fn is_end(&mut self) -> Result<bool> {
        self.source
            .is_end()
            .map_err(|e| AvroError::from_buffer("is_end", e))
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    // ---------------------------------------------------------------- helpers

    fn read_byte(&mut self, op: &'static str) -> Result<u8> {
        self.source
            .read_u8()
            .map_err(|e| AvroError::from_buffer(op, e))
    }

    /// Reads a variable-length unsigned integer (max 10 bytes).
    fn read_varint_u64(&mut self, op: &'static str) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0u32;
        for _ in 0..MAX_LONG_BYTES {
            let b = self.read_byte(op)? as u64;
            result |= (b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(AvroError::malformed(format!("{op}: invalid long encoding")))
    }

    /// Reads a variable-length unsigned integer (max 5 bytes).
    fn read_varint_u32(&mut self, op: &'static str) -> Result<u32> {
        let mut result: u32 = 0;
        let mut shift = 0u32;
        for _ in 0..MAX_INT_BYTES {
            let b = self.read_byte(op)? as u32;
            result |= (b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(AvroError::malformed(format!("{op}: invalid int encoding")))
    }

    fn read_len(&mut self, op: &'static str) -> Result<usize> {
        let len = unzigzag_long(self.read_varint_u64(op)?);
        if len < 0 {
            return Err(AvroError::malformed(format!("{op}: negative length {len}")));
        }
        usize::try_from(len).map_err(|_| AvroError::malformed(format!("{op}: length {len} too large")))
    }

    fn read_ordinal(&mut self, op: &'static str) -> Result<usize> {
        let n = unzigzag_int(self.read_varint_u32(op)?);
        usize::try_from(n).map_err(|_| AvroError::malformed(format!("{op}: negative value {n}")))
    }

    /// Item count of the next block. A negative count is followed by the
    /// block size in bytes, which is not needed when reading item by item.
    fn block_count(&mut self, op: &'static str) -> Result<usize> {
        let count = unzigzag_long(self.read_varint_u64(op)?);
        if count < 0 {
            self.read_varint_u64(op)?;
        }
        usize::try_from(count.unsigned_abs())
            .map_err(|_| AvroError::malformed(format!("{op}: block count {count} too large")))
    }

    /// Skips blocks that carry their byte size and returns the count of the
    /// first block that does not.
    fn skip_blocks(&mut self, op: &'static str) -> Result<usize> {
        loop {
            let count = unzigzag_long(self.read_varint_u64(op)?);
            if count >= 0 {
                return usize::try_from(count)
                    .map_err(|_| AvroError::malformed(format!("{op}: block count {count} too large")));
            }
            let size = unzigzag_long(self.read_varint_u64(op)?);
            let size = u64::try_from(size)
                .map_err(|_| AvroError::malformed(format!("{op}: negative block size {size}")))?;
            self.source
                .skip(size)
                .map_err(|e| AvroError::from_buffer(op, e))?;
        }
    }
}

impl<S: ByteSource> Decoder for BinaryDecoder<S> {
    fn read_null(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_boolean(&mut self) -> Result<bool> {
        Ok(self.read_byte("read_boolean")? != 0)
    }

    fn read_int(&mut self) -> Result<i32> {
        Ok(unzigzag_int(self.read_varint_u32("read_int")?))
    }

    fn read_long(&mut self) -> Result<i64> {
        Ok(unzigzag_long(self.read_varint_u64("read_long")?))
    }

    fn read_float(&mut self) -> Result<f32> {
        let mut bytes = [0u8; 4];
        self.source
            .read_into(&mut bytes)
            .map_err(|e| AvroError::from_buffer("read_float", e))?;
        Ok(f32::from_le_bytes(bytes))
    }

    fn read_double(&mut self) -> Result<f64> {
        let mut bytes = [0u8; 8];
        self.source
            .read_into(&mut bytes)
            .map_err(|e| AvroError::from_buffer("read_double", e))?;
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_len("read_string")?;
        self.source
            .read_utf8(len)
            .map_err(|e| AvroError::from_buffer("read_string", e))
    }

    fn skip_string(&mut self) -> Result<()> {
        self.skip_bytes()
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len("read_bytes")?;
        self.source
            .read_vec(len)
            .map_err(|e| AvroError::from_buffer("read_bytes", e))
    }

    fn skip_bytes(&mut self) -> Result<()> {
        let len = self.read_len("skip_bytes")?;
        self.source
            .skip(len as u64)
            .map_err(|e| AvroError::from_buffer("skip_bytes", e))
    }

    fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>> {
        self.source
            .read_vec(size)
            .map_err(|e| AvroError::from_buffer("read_fixed", e))
    }

    fn skip_fixed(&mut self, size: usize) -> Result<()> {
        self.source
            .skip(size as u64)
            .map_err(|e| AvroError::from_buffer("skip_fixed", e))
    }

    fn read_enum(&mut self) -> Result<usize> {
        self.read_ordinal("read_enum")
    }

    fn read_array_start(&mut self) -> Result<usize> {
        self.block_count("read_array_start")
    }

    fn array_next(&mut self) -> Result<usize> {
        self.block_count("array_next")
    }

    fn skip_array(&mut self) -> Result<usize> {
        self.skip_blocks("skip_array")
    }

    fn read_map_start(&mut self) -> Result<usize> {
        self.block_count("read_map_start")
    }

    fn map_next(&mut self) -> Result<usize> {
        self.block_count("map_next")
    }

    fn skip_map(&mut self) -> Result<usize> {
        self.skip_blocks("skip_map")
    }

    fn read_index(&mut self) -> Result<usize> {
        self.read_ordinal("read_index")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avro_joy_buffers::Reader;

    fn decoder(bytes: &[u8]) -> BinaryDecoder<Reader<'_>> {
        BinaryDecoder::new(Reader::new(bytes))
    }

    #[test]
    fn primitives() {
        let mut d = decoder(&[0x01, 0x80, 0x01, 1, 4, b'h', b'i']);
        assert_eq!(d.read_int().unwrap(), -1);
        assert_eq!(d.read_long().unwrap(), 64);
        assert!(d.read_boolean().unwrap());
        assert_eq!(d.read_string().unwrap(), "hi");
        assert!(d.is_end().unwrap());
    }

    #[test]
    fn overlong_varints_are_malformed() {
        let mut d = decoder(&[0xff; 11]);
        assert!(matches!(d.read_long(), Err(AvroError::Malformed(_))));
        let mut d = decoder(&[0xff; 6]);
        assert!(matches!(d.read_int(), Err(AvroError::Malformed(_))));
    }

    #[test]
    fn negative_lengths_are_malformed() {
        let mut d = decoder(&[0x01]);
        assert!(matches!(d.read_bytes(), Err(AvroError::Malformed(_))));
        let mut d = decoder(&[0x01]);
        assert!(matches!(d.read_index(), Err(AvroError::Malformed(_))));
    }

    #[test]
    fn truncated_input_is_end_of_input() {
        let mut d = decoder(&[0x06, b'a']);
        assert!(matches!(d.read_string(), Err(AvroError::EndOfInput)));
        let mut d = decoder(&[0, 0]);
        assert!(matches!(d.read_double(), Err(AvroError::EndOfInput)));
        let mut d = decoder(&[0x02, 0xff]);
        assert!(matches!(d.read_string(), Err(AvroError::Malformed(_))));
    }

    #[test]
    fn sized_blocks_are_read_and_skipped() {
        // A block of -2 items spanning 2 bytes, a plain block of 1, the end.
        let bytes = [0x03, 0x04, 0x02, 0x04, 0x02, 0x0a, 0x00];
        let mut d = decoder(&bytes);
        assert_eq!(d.read_array_start().unwrap(), 2);
        let items: Vec<i32> = (0..2).map(|_| d.read_int().unwrap()).collect();
        assert_eq!(items, [1, 2]);
        assert_eq!(d.array_next().unwrap(), 1);
        assert_eq!(d.read_int().unwrap(), 5);
        assert_eq!(d.array_next().unwrap(), 0);

        let mut d = decoder(&bytes);
        assert_eq!(d.skip_array().unwrap(), 1);
        assert_eq!(d.read_int().unwrap(), 5);
    }
}
