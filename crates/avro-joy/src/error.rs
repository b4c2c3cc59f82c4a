//! Error type shared by every avro-joy component.

use std::io;

use avro_joy_buffers::BufferError;

/// Errors raised while parsing schemas or encoding/decoding data.
#[derive(Debug, thiserror::Error)]
pub enum AvroError {
    /// Malformed schema text or illegal schema construction.
    #[error("schema parse error: {0}")]
    SchemaParse(String),
    /// The data (or the caller) does not have the shape the grammar expects.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    /// A resolution failure baked into the grammar was reached.
    #[error("unresolvable schemas: {0}")]
    Unresolvable(String),
    /// A value cannot be written under its schema.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// Corrupt binary input.
    #[error("malformed data: {0}")]
    Malformed(String),
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("malformed JSON input: {0}")]
    Json(#[from] serde_json::Error),
    /// I/O failure of the underlying sink or source, tagged with the call
    /// that triggered it.
    #[error("i/o error in {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl AvroError {
    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        AvroError::SchemaParse(msg.into())
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        AvroError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        AvroError::Encoding(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        AvroError::Malformed(msg.into())
    }

    pub(crate) fn io(op: &'static str, source: io::Error) -> Self {
        AvroError::Io { op, source }
    }

    /// Maps a byte-source failure, keeping the name of the failing read.
    pub(crate) fn from_buffer(op: &'static str, err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer => AvroError::EndOfInput,
            BufferError::InvalidUtf8 => AvroError::malformed(format!("{op}: invalid UTF-8")),
            BufferError::Io(source) => AvroError::Io { op, source },
        }
    }
}

pub type Result<T, E = AvroError> = std::result::Result<T, E>;
