//! Growable output buffer.

use std::io;

/// Collects encoded bytes until they are taken or pushed into a sink.
///
/// ```
/// use avro_joy_buffers::Writer;
///
/// let mut writer = Writer::new();
/// writer.u8(0x01);
/// writer.f32_le(1.0);
/// assert_eq!(writer.flush(), [0x01, 0x00, 0x00, 0x80, 0x3f]);
/// ```
#[derive(Debug, Clone)]
pub struct Writer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub const DEFAULT_CAPACITY: usize = 2 * 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// `capacity` is reserved up front and again after every [`flush`](Self::flush).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes written and not yet flushed.
    #[inline]
    pub fn pending(&self) -> usize {
        self.bytes.len()
    }

    /// Takes the pending bytes.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.bytes, Vec::with_capacity(self.capacity))
    }

    /// Writes the pending bytes into `sink`, keeping the allocation.
    ///
    /// On error the bytes stay pending.
    pub fn flush_to<W: io::Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<()> {
        if !self.bytes.is_empty() {
            sink.write_all(&self.bytes)?;
            self.bytes.clear();
        }
        Ok(())
    }

    #[inline]
    pub fn u8(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    #[inline]
    pub fn f32_le(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn f64_le(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn buf(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Writes `text` as UTF-8 and returns its length in bytes.
    pub fn utf8(&mut self, text: &str) -> usize {
        self.buf(text.as_bytes());
        text.len()
    }

    /// Writes text known to be ASCII, such as JSON punctuation and numbers.
    pub fn ascii(&mut self, text: &str) {
        debug_assert!(text.is_ascii());
        self.buf(text.as_bytes());
    }
}
