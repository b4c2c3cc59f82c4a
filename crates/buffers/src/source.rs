//! Pull-based byte sources consumed by decoders.

use std::io::{self, BufRead, BufReader, Cursor, Read};

use crate::{BufferError, Reader};

/// A forward-only source of bytes.
///
/// Implemented for the borrowed [`Reader`], for in-memory [`Cursor`]s and,
/// through [`IoSource`], for anything implementing [`io::Read`].
pub trait ByteSource {
    /// Reads one byte.
    fn read_u8(&mut self) -> Result<u8, BufferError>;

    /// Fills `out` completely.
    fn read_into(&mut self, out: &mut [u8]) -> Result<(), BufferError>;

    /// Reads exactly `len` bytes into a fresh vector.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, BufferError>;

    /// Discards `len` bytes.
    fn skip(&mut self, len: u64) -> Result<(), BufferError>;

    /// `true` when no more bytes can be read.
    fn is_end(&mut self) -> Result<bool, BufferError>;

    /// Reads `len` bytes that must form valid UTF-8.
    fn read_utf8(&mut self, len: usize) -> Result<String, BufferError> {
        String::from_utf8(self.read_vec(len)?).map_err(|_| BufferError::InvalidUtf8)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_u8(&mut self) -> Result<u8, BufferError> {
        (**self).read_u8()
    }

    fn read_into(&mut self, out: &mut [u8]) -> Result<(), BufferError> {
        (**self).read_into(out)
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, BufferError> {
        (**self).read_vec(len)
    }

    fn skip(&mut self, len: u64) -> Result<(), BufferError> {
        (**self).skip(len)
    }

    fn is_end(&mut self) -> Result<bool, BufferError> {
        (**self).is_end()
    }

    fn read_utf8(&mut self, len: usize) -> Result<String, BufferError> {
        (**self).read_utf8(len)
    }
}

impl ByteSource for Reader<'_> {
    fn read_u8(&mut self) -> Result<u8, BufferError> {
        self.u8()
    }

    fn read_into(&mut self, out: &mut [u8]) -> Result<(), BufferError> {
        out.copy_from_slice(self.take(out.len())?);
        Ok(())
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, BufferError> {
        Ok(self.take(len)?.to_vec())
    }

    fn skip(&mut self, len: u64) -> Result<(), BufferError> {
        let len = usize::try_from(len).map_err(|_| BufferError::EndOfBuffer)?;
        Reader::skip(self, len)
    }

    fn read_utf8(&mut self, len: usize) -> Result<String, BufferError> {
        let mut probe = *self;
        let text = std::str::from_utf8(probe.take(len)?).map_err(|_| BufferError::InvalidUtf8)?;
        *self = probe;
        Ok(text.to_owned())
    }

    fn is_end(&mut self) -> Result<bool, BufferError> {
        Ok(Reader::is_end(self))
    }
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    fn read_u8(&mut self) -> Result<u8, BufferError> {
        let mut byte = [0u8; 1];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    fn read_into(&mut self, out: &mut [u8]) -> Result<(), BufferError> {
        let data = self.get_ref().as_ref();
        let start = usize::try_from(self.position()).unwrap_or(usize::MAX);
        let end = start.checked_add(out.len()).ok_or(BufferError::EndOfBuffer)?;
        if end > data.len() {
            return Err(BufferError::EndOfBuffer);
        }
        out.copy_from_slice(&data[start..end]);
        self.set_position(end as u64);
        Ok(())
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, BufferError> {
        if len as u64 > remaining(self) {
            return Err(BufferError::EndOfBuffer);
        }
        let mut out = vec![0u8; len];
        self.read_into(&mut out)?;
        Ok(out)
    }

    fn skip(&mut self, len: u64) -> Result<(), BufferError> {
        if len > remaining(self) {
            return Err(BufferError::EndOfBuffer);
        }
        self.set_position(self.position() + len);
        Ok(())
    }

    fn is_end(&mut self) -> Result<bool, BufferError> {
        Ok(remaining(self) == 0)
    }
}

fn remaining<T: AsRef<[u8]>>(cursor: &Cursor<T>) -> u64 {
    (cursor.get_ref().as_ref().len() as u64).saturating_sub(cursor.position())
}

/// Buffered adapter from any [`io::Read`] to [`ByteSource`].
pub struct IoSource<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, inner),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

fn eof_aware(err: io::Error) -> BufferError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        BufferError::EndOfBuffer
    } else {
        BufferError::Io(err)
    }
}

impl<R: Read> ByteSource for IoSource<R> {
    fn read_u8(&mut self) -> Result<u8, BufferError> {
        let mut byte = [0u8; 1];
        self.inner.read_exact(&mut byte).map_err(eof_aware)?;
        Ok(byte[0])
    }

    fn read_into(&mut self, out: &mut [u8]) -> Result<(), BufferError> {
        self.inner.read_exact(out).map_err(eof_aware)
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, BufferError> {
        // Grow with the data actually read so a corrupt length cannot force a
        // huge up-front allocation.
        let mut out = Vec::with_capacity(len.min(64 * 1024));
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut out)
            .map_err(BufferError::Io)?;
        if read < len {
            return Err(BufferError::EndOfBuffer);
        }
        Ok(out)
    }

    fn skip(&mut self, len: u64) -> Result<(), BufferError> {
        let skipped = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())
            .map_err(BufferError::Io)?;
        if skipped < len {
            return Err(BufferError::EndOfBuffer);
        }
        Ok(())
    }

    fn is_end(&mut self) -> Result<bool, BufferError> {
        Ok(self.inner.fill_buf().map_err(BufferError::Io)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_all<S: ByteSource>(mut source: S) -> Vec<u8> {
        let mut out = Vec::new();
        while !source.is_end().unwrap() {
            out.push(source.read_u8().unwrap());
        }
        out
    }

    #[test]
    fn reader_cursor_and_io_agree() {
        let data = [1u8, 2, 3, 4, 5];
        assert_eq!(drain_all(Reader::new(&data)), data);
        assert_eq!(drain_all(Cursor::new(data.to_vec())), data);
        assert_eq!(drain_all(IoSource::new(&data[..])), data);
    }

    #[test]
    fn read_vec_past_end_is_end_of_buffer() {
        let data = [1u8, 2];
        assert!(matches!(
            Reader::new(&data).read_vec(3),
            Err(BufferError::EndOfBuffer)
        ));
        assert!(matches!(
            Cursor::new(&data[..]).read_vec(3),
            Err(BufferError::EndOfBuffer)
        ));
        assert!(matches!(
            IoSource::new(&data[..]).read_vec(3),
            Err(BufferError::EndOfBuffer)
        ));
    }

    #[test]
    fn skip_then_read() {
        let data = [9u8, 8, 7, 6];
        let mut io = IoSource::with_capacity(2, &data[..]);
        io.skip(3).unwrap();
        assert_eq!(io.read_u8().unwrap(), 6);
        assert!(io.is_end().unwrap());

        let mut cursor = Cursor::new(&data[..]);
        cursor.skip(1).unwrap();
        let mut two = [0u8; 2];
        cursor.read_into(&mut two).unwrap();
        assert_eq!(two, [8, 7]);
        assert!(cursor.skip(2).is_err());
    }

    #[test]
    fn io_errors_are_wrapped() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
        }
        let mut source = IoSource::new(Broken);
        match source.read_u8() {
            Err(BufferError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn read_utf8_rejects_invalid_text() {
        let data = [0xc3, 0xa9, 0xff, b'x'];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_utf8(2).unwrap(), "\u{e9}");
        assert!(matches!(reader.read_utf8(2), Err(BufferError::InvalidUtf8)));
        assert_eq!(reader.position(), 2);
        assert!(matches!(
            IoSource::new(&data[..]).read_utf8(3),
            Err(BufferError::InvalidUtf8)
        ));
    }
}
