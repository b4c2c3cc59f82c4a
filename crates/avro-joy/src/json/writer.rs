//! Streaming JSON text writer with nesting checks.

use std::io;

use avro_joy_buffers::Writer;

use crate::error::{AvroError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    EmptyArray,
    NonEmptyArray,
    EmptyObject,
    /// A key was written and its value is due.
    DanglingKey,
    NonEmptyObject,
}

/// Writes one JSON document into a byte buffer.
///
/// Every container opened must be closed, object members alternate key and
/// value, and only a single top-level value is accepted.
pub struct JsonWriter {
    out: Writer,
    stack: Vec<Scope>,
    indent: Option<String>,
    has_root: bool,
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonWriter {
    pub fn new() -> Self {
        Self::with_indent(None)
    }

    /// `indent` is repeated once per nesting level after each line break;
    /// `None` writes compact output.
    pub fn with_indent(indent: Option<String>) -> Self {
        Self {
            out: Writer::new(),
            stack: Vec::new(),
            indent,
            has_root: false,
        }
    }

    /// Hands the buffered text to `sink`.
    pub fn flush_to<W: io::Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<()> {
        self.out.flush_to(sink)
    }

    /// Takes the buffered text.
    pub fn take(&mut self) -> Vec<u8> {
        self.out.flush()
    }

    // ---------------------------------------------------------------- containers

    pub fn begin_array(&mut self) -> Result<()> {
        self.open(Scope::EmptyArray, b'[')
    }

    pub fn end_array(&mut self) -> Result<()> {
        self.close(Scope::EmptyArray, Scope::NonEmptyArray, b']')
    }

    pub fn begin_object(&mut self) -> Result<()> {
        self.open(Scope::EmptyObject, b'{')
    }

    pub fn end_object(&mut self) -> Result<()> {
        self.close(Scope::EmptyObject, Scope::NonEmptyObject, b'}')
    }

    pub fn key(&mut self, name: &str) -> Result<()> {
        match self.stack.last() {
            Some(Scope::NonEmptyObject) => self.out.u8(b','),
            Some(Scope::EmptyObject) => {}
            _ => return Err(nesting("key outside of an object")),
        }
        self.newline();
        self.replace_top(Scope::DanglingKey);
        self.string(name);
        Ok(())
    }

    // ---------------------------------------------------------------- values

    pub fn null_value(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.ascii("null");
        Ok(())
    }

    pub fn bool_value(&mut self, value: bool) -> Result<()> {
        self.before_value()?;
        self.out.ascii(if value { "true" } else { "false" });
        Ok(())
    }

    pub fn long_value(&mut self, value: i64) -> Result<()> {
        self.before_value()?;
        self.out.ascii(&value.to_string());
        Ok(())
    }

    pub fn float_value(&mut self, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(AvroError::encoding(format!("Cannot encode non-finite float {value}")));
        }
        self.before_value()?;
        self.out.ascii(&format!("{value:?}"));
        Ok(())
    }

    pub fn double_value(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(AvroError::encoding(format!("Cannot encode non-finite double {value}")));
        }
        self.before_value()?;
        self.out.ascii(&format!("{value:?}"));
        Ok(())
    }

    pub fn string_value(&mut self, value: &str) -> Result<()> {
        self.before_value()?;
        self.string(value);
        Ok(())
    }

    // ---------------------------------------------------------------- internals

    fn open(&mut self, empty: Scope, bracket: u8) -> Result<()> {
        self.before_value()?;
        self.stack.push(empty);
        self.out.u8(bracket);
        Ok(())
    }

    fn close(&mut self, empty: Scope, nonempty: Scope, bracket: u8) -> Result<()> {
        let context = self.stack.last().copied();
        if context != Some(empty) && context != Some(nonempty) {
            return Err(nesting("unbalanced close"));
        }
        self.stack.pop();
        if context == Some(nonempty) {
            self.newline();
        }
        self.out.u8(bracket);
        Ok(())
    }

    fn before_value(&mut self) -> Result<()> {
        match self.stack.last().copied() {
            None if self.has_root => return Err(nesting("multiple top-level roots")),
            None => self.has_root = true,
            Some(Scope::EmptyArray) => {
                self.replace_top(Scope::NonEmptyArray);
                self.newline();
            }
            Some(Scope::NonEmptyArray) => {
                self.out.u8(b',');
                self.newline();
            }
            Some(Scope::DanglingKey) => {
                self.out.ascii(if self.indent.is_some() { ": " } else { ":" });
                self.replace_top(Scope::NonEmptyObject);
            }
            Some(Scope::EmptyObject | Scope::NonEmptyObject) => {
                return Err(nesting("value without a key"))
            }
        }
        Ok(())
    }

    fn replace_top(&mut self, scope: Scope) {
        if let Some(top) = self.stack.last_mut() {
            *top = scope;
        }
    }

    fn newline(&mut self) {
        let Some(indent) = &self.indent else { return };
        self.out.u8(b'\n');
        for _ in 0..self.stack.len() {
            self.out.utf8(indent);
        }
    }

    fn string(&mut self, s: &str) {
        self.out.u8(b'"');
        let mut start = 0;
        for (i, b) in s.bytes().enumerate() {
            let escape: &str = match b {
                b'"' => "\\\"",
                b'\\' => "\\\\",
                b'\n' => "\\n",
                b'\r' => "\\r",
                b'\t' => "\\t",
                0x08 => "\\b",
                0x0c => "\\f",
                0x00..=0x1f => "",
                _ => continue,
            };
            self.out.utf8(&s[start..i]);
            if escape.is_empty() {
                self.out.ascii(&format!("\\u{b:04x}"));
            } else {
                self.out.ascii(escape);
            }
            start = i + 1;
        }
        self.out.utf8(&s[start..]);
        self.out.u8(b'"');
    }
}

fn nesting(what: &str) -> AvroError {
    AvroError::encoding(format!("JSON nesting problem: {what}"))
}
