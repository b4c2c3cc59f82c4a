use std::io;

use avro_joy_buffers::Writer;

use super::{
    encode_int, encode_long, write_varint, zigzag_int, zigzag_long, MAX_INT_BYTES, MAX_LONG_BYTES,
};
use crate::error::{AvroError, Result};
use crate::io::Encoder;

/// Options for [`BinaryEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryEncoderConfig {
    buffer_size: usize,
}

impl BinaryEncoderConfig {
    pub const MIN_BUFFER_SIZE: usize = 32;
    pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;
    pub const DEFAULT_BUFFER_SIZE: usize = 2048;

    pub fn new() -> Self {
        Self {
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
        }
    }

    /// Bytes buffered before they are pushed to the sink. Clamped to
    /// [`MIN_BUFFER_SIZE`](Self::MIN_BUFFER_SIZE) ..
    /// [`MAX_BUFFER_SIZE`](Self::MAX_BUFFER_SIZE).
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.clamp(Self::MIN_BUFFER_SIZE, Self::MAX_BUFFER_SIZE);
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Default for BinaryEncoderConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Avro binary encoder writing to an [`io::Write`] sink.
///
/// Output is staged in a [`Writer`] and handed to the sink whenever more
/// than the configured buffer size is pending, and on [`Encoder::flush`].
pub struct BinaryEncoder<W: io::Write> {
    writer: Writer,
    sink: W,
    buffer_size: usize,
}

impl<W: io::Write> BinaryEncoder<W> {
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, BinaryEncoderConfig::default())
    }

    pub fn with_config(sink: W, config: BinaryEncoderConfig) -> Self {
        Self {
            writer: Writer::with_capacity(config.buffer_size()),
            sink,
            buffer_size: config.buffer_size(),
        }
    }

    /// Bytes written but not yet handed to the sink.
    pub fn buffered(&self) -> usize {
        self.writer.pending()
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Flushes and returns the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.sink)
    }

    fn drain(&mut self, op: &'static str) -> Result<()> {
        self.writer
            .flush_to(&mut self.sink)
            .map_err(|e| AvroError::io(op, e))
    }

    #[inline]
    fn spill(&mut self, op: &'static str) -> Result<()> {
        if self.writer.pending() > self.buffer_size {
            self.drain(op)?;
        }
        Ok(())
    }

    fn write_len(&mut self, len: usize) {
        write_varint(&mut self.writer, zigzag_long(len as i64));
    }

    fn write_ordinal(&mut self, what: &str, n: usize) -> Result<()> {
        let n = i32::try_from(n)
            .map_err(|_| AvroError::encoding(format!("{what} {n} does not fit an int")))?;
        write_varint(&mut self.writer, zigzag_int(n) as u64);
        Ok(())
    }
}

impl<W: io::Write> Encoder for BinaryEncoder<W> {
    fn write_null(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_boolean(&mut self, value: bool) -> Result<()> {
        self.writer.u8(u8::from(value));
        self.spill("write_boolean")
    }

    fn write_int(&mut self, value: i32) -> Result<()> {
        let mut buf = [0u8; MAX_INT_BYTES];
        let len = encode_int(value, &mut buf);
        self.writer.buf(&buf[..len]);
        self.spill("write_int")
    }

    fn write_long(&mut self, value: i64) -> Result<()> {
        let mut buf = [0u8; MAX_LONG_BYTES];
        let len = encode_long(value, &mut buf);
        self.writer.buf(&buf[..len]);
        self.spill("write_long")
    }

    fn write_float(&mut self, value: f32) -> Result<()> {
        self.writer.f32_le(value);
        self.spill("write_float")
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.writer.f64_le(value);
        self.spill("write_double")
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_len(value.len());
        self.writer.buf(value.as_bytes());
        self.spill("write_string")
    }

    fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_len(value.len());
        self.writer.buf(value);
        self.spill("write_bytes")
    }

    fn write_fixed(&mut self, value: &[u8]) -> Result<()> {
        self.writer.buf(value);
        self.spill("write_fixed")
    }

    fn write_enum(&mut self, ordinal: usize) -> Result<()> {
        self.write_ordinal("enum ordinal", ordinal)?;
        self.spill("write_enum")
    }

    fn write_array_start(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_item_count(&mut self, count: usize) -> Result<()> {
        if count > 0 {
            self.write_len(count);
        }
        self.spill("set_item_count")
    }

    fn start_item(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_array_end(&mut self) -> Result<()> {
        self.writer.u8(0);
        self.spill("write_array_end")
    }

    fn write_map_start(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_map_end(&mut self) -> Result<()> {
        self.writer.u8(0);
        self.spill("write_map_end")
    }

    fn write_index(&mut self, index: usize) -> Result<()> {
        self.write_ordinal("union index", index)?;
        self.spill("write_index")
    }

    fn flush(&mut self) -> Result<()> {
        self.drain("flush")?;
        self.sink.flush().map_err(|e| AvroError::io("flush", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(f: impl FnOnce(&mut BinaryEncoder<Vec<u8>>) -> Result<()>) -> Vec<u8> {
        let mut encoder = BinaryEncoder::new(Vec::new());
        f(&mut encoder).unwrap();
        encoder.into_inner().unwrap()
    }

    #[test]
    fn primitives() {
        assert_eq!(encoded(|e| e.write_int(-1)), vec![0x01]);
        assert_eq!(encoded(|e| e.write_long(64)), vec![0x80, 0x01]);
        assert_eq!(encoded(|e| e.write_boolean(true)), vec![1]);
        assert_eq!(encoded(|e| e.write_string("ab")), vec![4, b'a', b'b']);
        assert_eq!(encoded(|e| e.write_float(1.0)), 1.0f32.to_le_bytes().to_vec());
        assert_eq!(encoded(|e| e.write_fixed(&[9, 9])), vec![9, 9]);
        assert!(encoded(|e| e.write_null()).is_empty());
    }

    #[test]
    fn arrays_are_one_block_and_a_terminator() {
        let out = encoded(|e| {
            e.write_array_start()?;
            e.set_item_count(2)?;
            e.start_item()?;
            e.write_int(1)?;
            e.start_item()?;
            e.write_int(2)?;
            e.write_array_end()
        });
        assert_eq!(out, vec![4, 2, 4, 0]);
        let empty = encoded(|e| {
            e.write_map_start()?;
            e.set_item_count(0)?;
            e.write_map_end()
        });
        assert_eq!(empty, vec![0]);
    }

    #[test]
    fn buffer_size_is_clamped() {
        assert_eq!(BinaryEncoderConfig::new().with_buffer_size(1).buffer_size(), 32);
        assert_eq!(
            BinaryEncoderConfig::new().with_buffer_size(usize::MAX).buffer_size(),
            BinaryEncoderConfig::MAX_BUFFER_SIZE
        );
        assert_eq!(BinaryEncoderConfig::default().buffer_size(), 2048);
    }

    #[test]
    fn spills_to_sink_past_buffer_size() {
        let config = BinaryEncoderConfig::new().with_buffer_size(32);
        let mut encoder = BinaryEncoder::with_config(Vec::new(), config);
        encoder.write_bytes(&[7; 40]).unwrap();
        assert_eq!(encoder.buffered(), 0);
        assert_eq!(encoder.get_ref().len(), 41);
    }

    #[test]
    fn sink_errors_name_the_call() {
        struct Broken;
        impl io::Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut encoder = BinaryEncoder::new(Broken);
        encoder.write_long(5).unwrap();
        match encoder.flush() {
            Err(AvroError::Io { op, .. }) => assert_eq!(op, "flush"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
