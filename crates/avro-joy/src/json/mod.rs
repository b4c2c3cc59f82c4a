//! Avro JSON encoding.
//!
//! - null, boolean, numbers and strings map to their JSON counterparts
//! - bytes and fixed: a string with one ISO-8859-1 character per byte
//! - enum: the symbol as a string
//! - record, map: an object
//! - union: `null` as is, any other branch as `{"<full name>": value}`

mod decoder;
mod encoder;
mod writer;

pub use decoder::JsonDecoder;
pub use encoder::JsonEncoder;
pub use writer::JsonWriter;

use crate::error::{AvroError, Result};

/// Options for [`JsonEncoder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonEncoderConfig {
    indent: Option<String>,
}

impl JsonEncoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two-space indented output.
    pub fn pretty() -> Self {
        Self::new().with_indent("  ")
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = Some(indent.into());
        self
    }

    pub fn indent(&self) -> Option<&str> {
        self.indent.as_deref()
    }
}

/// Maps each byte to the character with the same code point.
pub(crate) fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Inverse of [`latin1_string`]; characters above U+00FF are rejected.
pub(crate) fn latin1_bytes(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                AvroError::mismatch("ISO-8859-1 character", format!("U+{:04X}", u32::from(c)))
            })
        })
        .collect()
}
