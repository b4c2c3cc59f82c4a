//! Byte-level building blocks for the avro-joy codecs: an auto-growing
//! output buffer, a bounds-checked slice reader and the [`ByteSource`]
//! abstraction decoders pull from.

mod reader;
mod source;
mod writer;

pub use reader::Reader;
pub use source::{ByteSource, IoSource};
pub use writer::Writer;

/// Errors raised while reading bytes.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
