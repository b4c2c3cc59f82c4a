use std::io;
use std::sync::Arc;

use super::writer::JsonWriter;
use super::{latin1_string, JsonEncoderConfig};
use crate::error::{AvroError, Result};
use crate::grammar::{json_grammar, Action, ActionHandler, Grammar, Parser, Symbol, Terminal};
use crate::io::Encoder;
use crate::schema::Schema;

/// Writes Avro values as JSON text following the schema's grammar.
///
/// Records become objects, unions other than `null` become single-key
/// objects keyed by the branch's full name, and bytes and fixed values are
/// written as strings with one ISO-8859-1 character per byte.
pub struct JsonEncoder<W: io::Write> {
    parser: Parser,
    out: JsonWriter,
    sink: W,
    /// Per open array or map: no item written yet.
    is_empty: Vec<bool>,
}

impl<W: io::Write> JsonEncoder<W> {
    pub fn new(schema: &Schema, sink: W) -> Result<Self> {
        Self::with_config(schema, sink, JsonEncoderConfig::default())
    }

    pub fn with_config(schema: &Schema, sink: W, config: JsonEncoderConfig) -> Result<Self> {
        let grammar = Arc::new(json_grammar(schema)?);
        Ok(Self::with_grammar(grammar, sink, config))
    }

    /// Builds an encoder over a grammar generated earlier by
    /// [`json_grammar`], so that many documents can share it.
    pub fn with_grammar(grammar: Arc<Grammar>, sink: W, config: JsonEncoderConfig) -> Self {
        Self {
            parser: Parser::new(grammar),
            out: JsonWriter::with_indent(config.indent().map(str::to_string)),
            sink,
            is_empty: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Flushes and returns the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.sink)
    }

    fn pop_action(&mut self) -> Result<&Action> {
        let top = self.parser.pop_symbol()?;
        self.parser.grammar().expect_action(top)
    }

    fn is_map_key(&self) -> bool {
        self.parser.top_symbol() == Some(Terminal::MapKeyMarker.into())
    }

    fn write_text(&mut self, value: &str) -> Result<()> {
        if self.is_map_key() {
            self.advance(Terminal::MapKeyMarker)?;
            self.out.key(value)
        } else {
            self.out.string_value(value)
        }
    }

    fn close_items(&mut self, end: Terminal) -> Result<()> {
        let empty = self
            .is_empty
            .pop()
            .ok_or_else(|| AvroError::mismatch(end.name(), "no open array or map"))?;
        if !empty {
            self.advance(Terminal::ItemEnd)?;
        }
        self.advance(end)?;
        Ok(())
    }
}

impl<W: io::Write> ActionHandler for JsonEncoder<W> {
    fn parser(&mut self) -> &mut Parser {
        &mut self.parser
    }

    fn do_action(&mut self, _input: Option<Terminal>, top: Symbol) -> Result<Option<Symbol>> {
        match top {
            Symbol::RecordStart => self.out.begin_object()?,
            Symbol::RecordEnd | Symbol::UnionEnd => self.out.end_object()?,
            Symbol::FieldEnd => {}
            Symbol::Action(_) => match self.parser.grammar().action_of(top) {
                Some(Action::FieldAdjust { name, .. }) => self.out.key(name)?,
                _ => {
                    return Err(AvroError::mismatch(
                        "JSON encoder action",
                        self.parser.grammar().describe(top),
                    ))
                }
            },
            other => {
                return Err(AvroError::mismatch(
                    "JSON encoder action",
                    self.parser.grammar().describe(other),
                ))
            }
        }
        Ok(None)
    }
}

impl<W: io::Write> Encoder for JsonEncoder<W> {
    fn write_null(&mut self) -> Result<()> {
        self.advance(Terminal::Null)?;
        self.out.null_value()
    }

    fn write_boolean(&mut self, value: bool) -> Result<()> {
        self.advance(Terminal::Boolean)?;
        self.out.bool_value(value)
    }

    fn write_int(&mut self, value: i32) -> Result<()> {
        self.advance(Terminal::Int)?;
        self.out.long_value(i64::from(value))
    }

    fn write_long(&mut self, value: i64) -> Result<()> {
        self.advance(Terminal::Long)?;
        self.out.long_value(value)
    }

    fn write_float(&mut self, value: f32) -> Result<()> {
        self.advance(Terminal::Float)?;
        self.out.float_value(value)
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.advance(Terminal::Double)?;
        self.out.double_value(value)
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.advance(Terminal::String)?;
        self.write_text(value)
    }

    fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.advance(Terminal::Bytes)?;
        self.write_text(&latin1_string(value))
    }

    fn write_fixed(&mut self, value: &[u8]) -> Result<()> {
        self.advance(Terminal::Fixed)?;
        let size = match self.pop_action()? {
            Action::IntCheck(size) => *size,
            other => return Err(AvroError::mismatch("fixed size", format!("{other:?}"))),
        };
        if value.len() != size {
            return Err(AvroError::encoding(format!(
                "Incorrect length for fixed binary: expected {size} but received {} bytes",
                value.len()
            )));
        }
        self.out.string_value(&latin1_string(value))
    }

    fn write_enum(&mut self, ordinal: usize) -> Result<()> {
        self.advance(Terminal::Enum)?;
        let label = match self.pop_action()? {
            Action::EnumLabels(labels) => labels.get(ordinal).cloned().ok_or_else(|| {
                AvroError::encoding(format!(
                    "Enumeration out of range: max is {} but received {ordinal}",
                    labels.len()
                ))
            })?,
            other => return Err(AvroError::mismatch("enum labels", format!("{other:?}"))),
        };
        self.out.string_value(&label)
    }

    fn write_array_start(&mut self) -> Result<()> {
        self.advance(Terminal::ArrayStart)?;
        self.out.begin_array()?;
        self.is_empty.push(true);
        Ok(())
    }

    fn set_item_count(&mut self, _count: usize) -> Result<()> {
        Ok(())
    }

    fn start_item(&mut self) -> Result<()> {
        let first = *self
            .is_empty
            .last()
            .ok_or_else(|| AvroError::mismatch("open array or map", "item"))?;
        if !first {
            self.advance(Terminal::ItemEnd)?;
        }
        if let Some(empty) = self.is_empty.last_mut() {
            *empty = false;
        }
        Ok(())
    }

    fn write_array_end(&mut self) -> Result<()> {
        self.close_items(Terminal::ArrayEnd)?;
        self.out.end_array()
    }

    fn write_map_start(&mut self) -> Result<()> {
        self.advance(Terminal::MapStart)?;
        self.out.begin_object()?;
        self.is_empty.push(true);
        Ok(())
    }

    fn write_map_end(&mut self) -> Result<()> {
        self.close_items(Terminal::MapEnd)?;
        self.out.end_object()
    }

    fn write_index(&mut self, index: usize) -> Result<()> {
        self.advance(Terminal::Union)?;
        let top = self.parser.pop_symbol()?;
        let alt = self.parser.grammar().expect_alternative(top)?;
        let symbol = alt.symbol(index)?;
        if symbol != Symbol::NULL {
            let label = alt.label(index).unwrap_or_default().to_string();
            self.out.begin_object()?;
            self.out.key(&label)?;
            self.parser.push_symbol(Symbol::UnionEnd);
        }
        self.parser.push_symbol(symbol);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.process_implicit_actions()?;
        self.out
            .flush_to(&mut self.sink)
            .map_err(|e| AvroError::io("flush", e))?;
        self.sink.flush().map_err(|e| AvroError::io("flush", e))
    }
}
