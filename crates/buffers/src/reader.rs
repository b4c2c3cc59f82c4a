//! Bounds-checked reads from a borrowed slice.

use crate::BufferError;

/// Cursor over a byte slice. A failed read leaves the position unchanged.
///
/// ```
/// use avro_joy_buffers::Reader;
///
/// let mut reader = Reader::new(&[0x01, 0x02, 0x03]);
/// assert_eq!(reader.u8().unwrap(), 0x01);
/// assert_eq!(reader.take(2).unwrap(), [0x02, 0x03]);
/// assert!(reader.is_end());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_end(&self) -> bool {
        self.pos == self.data.len()
    }

    pub fn u8(&mut self) -> Result<u8, BufferError> {
        let byte = *self.data.get(self.pos).ok_or(BufferError::EndOfBuffer)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Returns the next `len` bytes and moves past them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], BufferError> {
        if len > self.remaining() {
            return Err(BufferError::EndOfBuffer);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), BufferError> {
        self.take(len).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance_the_position() {
        let mut reader = Reader::new(&[7, 8, 9]);
        assert_eq!(reader.u8().unwrap(), 7);
        reader.skip(1).unwrap();
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.take(1).unwrap(), [9]);
        assert!(reader.is_end());
    }

    #[test]
    fn short_reads_do_not_move() {
        let mut reader = Reader::new(&[1, 2]);
        assert!(matches!(reader.take(3), Err(BufferError::EndOfBuffer)));
        assert!(reader.skip(usize::MAX).is_err());
        assert_eq!(reader.position(), 0);
        reader.take(2).unwrap();
        assert!(matches!(reader.u8(), Err(BufferError::EndOfBuffer)));
    }
}
