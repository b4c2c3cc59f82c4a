use std::io;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use super::latin1_bytes;
use crate::error::{AvroError, Result};
use crate::grammar::{json_grammar, Action, ActionHandler, Grammar, Parser, Symbol, Terminal};
use crate::io::Decoder;
use crate::schema::Schema;

/// Position inside the parsed JSON document.
enum Cursor {
    /// A single value: the document root or a union branch.
    Value(Option<Value>),
    Array(std::vec::IntoIter<Value>),
    Map {
        entries: serde_json::map::IntoIter,
        /// Value of the entry whose key was just read.
        value: Option<Value>,
    },
    Record {
        fields: Map<String, Value>,
        key: Option<String>,
    },
}

impl Cursor {
    fn next(&mut self, expected: &str) -> Result<Value> {
        match self {
            Cursor::Value(slot) => slot
                .take()
                .ok_or_else(|| AvroError::mismatch(expected, "end of value")),
            Cursor::Array(items) => items
                .next()
                .ok_or_else(|| AvroError::mismatch(expected, "end of array")),
            Cursor::Map { value, .. } => value
                .take()
                .ok_or_else(|| AvroError::mismatch(expected, "map key")),
            Cursor::Record { fields, key } => match key {
                Some(name) => fields
                    .remove(name.as_str())
                    .ok_or_else(|| AvroError::mismatch(format!("field {name}"), "no such member")),
                None => Err(AvroError::mismatch(expected, "record member")),
            },
        }
    }

    fn next_key(&mut self) -> Result<String> {
        match self {
            Cursor::Map { entries, value } => {
                let (key, v) = entries
                    .next()
                    .ok_or_else(|| AvroError::mismatch("map-key", "end of object"))?;
                *value = Some(v);
                Ok(key)
            }
            _ => Err(AvroError::mismatch("map-key", "non-map value")),
        }
    }

    fn remaining(&self) -> usize {
        match self {
            Cursor::Value(slot) => usize::from(slot.is_some()),
            Cursor::Array(items) => items.len(),
            Cursor::Map { entries, .. } => entries.len(),
            Cursor::Record { .. } => 0,
        }
    }
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reads Avro values from Avro JSON text.
///
/// The document is parsed up front and walked with the schema's grammar.
/// Arrays and maps report all of their items as a single block.
pub struct JsonDecoder {
    parser: Parser,
    cursors: Vec<Cursor>,
}

impl JsonDecoder {
    pub fn new<R: io::Read>(schema: &Schema, input: R) -> Result<Self> {
        let grammar = Arc::new(json_grammar(schema)?);
        Self::from_reader(grammar, input)
    }

    /// Parses one JSON document from `input`. Trailing non-whitespace is an
    /// error.
    pub fn from_reader<R: io::Read>(grammar: Arc<Grammar>, input: R) -> Result<Self> {
        let value = serde_json::from_reader(input).map_err(|e| {
            if e.is_io() {
                AvroError::io("read", e.into())
            } else {
                AvroError::Json(e)
            }
        })?;
        Ok(Self::from_value(grammar, value))
    }

    pub fn from_value(grammar: Arc<Grammar>, value: Value) -> Self {
        Self {
            parser: Parser::new(grammar),
            cursors: vec![Cursor::Value(Some(value))],
        }
    }

    /// Runs trailing actions and steps over the end of the previous array
    /// or map item before advancing to `input`.
    fn advance_to(&mut self, input: Terminal) -> Result<()> {
        self.process_trailing_implicit_actions()?;
        if self.parser.top_symbol() == Some(Terminal::ItemEnd.into()) {
            self.parser.pop_symbol()?;
        }
        self.advance(input)?;
        Ok(())
    }

    fn current(&mut self) -> Result<&mut Cursor> {
        self.cursors
            .last_mut()
            .ok_or_else(|| AvroError::mismatch("value", "end of input"))
    }

    fn next_value(&mut self, expected: &str) -> Result<Value> {
        self.current()?.next(expected)
    }

    fn number(&mut self, expected: &str) -> Result<Number> {
        match self.next_value(expected)? {
            Value::Number(n) => Ok(n),
            other => Err(AvroError::mismatch(expected, shape(&other))),
        }
    }

    fn text(&mut self, expected: &str) -> Result<String> {
        match self.next_value(expected)? {
            Value::String(s) => Ok(s),
            other => Err(AvroError::mismatch(expected, shape(&other))),
        }
    }

    fn fixed(&mut self, size: usize) -> Result<Vec<u8>> {
        self.advance_to(Terminal::Fixed)?;
        let top = self.parser.pop_symbol()?;
        match self.parser.grammar().expect_action(top)? {
            Action::IntCheck(expected) if *expected == size => {}
            Action::IntCheck(expected) => {
                return Err(AvroError::mismatch(
                    format!("fixed size {expected}"),
                    format!("fixed size {size}"),
                ))
            }
            other => return Err(AvroError::mismatch("fixed size", format!("{other:?}"))),
        }
        let bytes = latin1_bytes(&self.text("fixed")?)?;
        if bytes.len() != size {
            return Err(AvroError::mismatch(
                format!("{size} bytes"),
                format!("{} bytes", bytes.len()),
            ));
        }
        Ok(bytes)
    }

    /// Items left in the open array or map; closes it when none are.
    fn items_left(&mut self, end: Terminal) -> Result<usize> {
        let n = self.current()?.remaining();
        if n == 0 {
            self.advance_to(end)?;
            self.cursors.pop();
        }
        Ok(n)
    }

    fn open(&mut self, start: Terminal, end: Terminal) -> Result<usize> {
        self.advance_to(start)?;
        let cursor = match (start, self.next_value(start.name())?) {
            (Terminal::ArrayStart, Value::Array(items)) => Cursor::Array(items.into_iter()),
            (Terminal::MapStart, Value::Object(entries)) => Cursor::Map {
                entries: entries.into_iter(),
                value: None,
            },
            (_, other) => return Err(AvroError::mismatch(start.name(), shape(&other))),
        };
        self.cursors.push(cursor);
        self.items_left(end)
    }

    fn skip_whole(&mut self, start: Terminal, end: Terminal) -> Result<usize> {
        self.advance_to(start)?;
        match (start, self.next_value(start.name())?) {
            (Terminal::ArrayStart, Value::Array(_)) | (Terminal::MapStart, Value::Object(_)) => {}
            (_, other) => return Err(AvroError::mismatch(start.name(), shape(&other))),
        }
        self.advance_to(end)?;
        Ok(0)
    }
}

impl ActionHandler for JsonDecoder {
    fn parser(&mut self) -> &mut Parser {
        &mut self.parser
    }

    fn do_action(&mut self, _input: Option<Terminal>, top: Symbol) -> Result<Option<Symbol>> {
        match top {
            Symbol::RecordStart => match self.next_value("record-start")? {
                Value::Object(fields) => self.cursors.push(Cursor::Record { fields, key: None }),
                other => return Err(AvroError::mismatch("record-start", shape(&other))),
            },
            Symbol::RecordEnd | Symbol::UnionEnd => {
                self.cursors.pop();
            }
            Symbol::FieldEnd => {
                if let Some(Cursor::Record { key, .. }) = self.cursors.last_mut() {
                    *key = None;
                }
            }
            Symbol::Action(_) => match self.parser.grammar().action_of(top) {
                Some(Action::FieldAdjust { name, .. }) => match self.cursors.last_mut() {
                    Some(Cursor::Record { key, .. }) => *key = Some(name.clone()),
                    _ => return Err(AvroError::mismatch(format!("field {name}"), "no open object")),
                },
                _ => {
                    return Err(AvroError::mismatch(
                        "JSON decoder action",
                        self.parser.grammar().describe(top),
                    ))
                }
            },
            other => {
                return Err(AvroError::mismatch(
                    "JSON decoder action",
                    self.parser.grammar().describe(other),
                ))
            }
        }
        Ok(None)
    }
}

impl Decoder for JsonDecoder {
    fn read_null(&mut self) -> Result<()> {
        self.advance_to(Terminal::Null)?;
        match self.next_value("null")? {
            Value::Null => Ok(()),
            other => Err(AvroError::mismatch("null", shape(&other))),
        }
    }

    fn read_boolean(&mut self) -> Result<bool> {
        self.advance_to(Terminal::Boolean)?;
        match self.next_value("boolean")? {
            Value::Bool(b) => Ok(b),
            other => Err(AvroError::mismatch("boolean", shape(&other))),
        }
    }

    fn read_int(&mut self) -> Result<i32> {
        self.advance_to(Terminal::Int)?;
        let n = self.number("int")?;
        n.as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| AvroError::mismatch("int", n.to_string()))
    }

    fn read_long(&mut self) -> Result<i64> {
        self.advance_to(Terminal::Long)?;
        let n = self.number("long")?;
        n.as_i64()
            .ok_or_else(|| AvroError::mismatch("long", n.to_string()))
    }

    fn read_float(&mut self) -> Result<f32> {
        self.advance_to(Terminal::Float)?;
        let n = self.number("float")?;
        n.as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| AvroError::mismatch("float", n.to_string()))
    }

    fn read_double(&mut self) -> Result<f64> {
        self.advance_to(Terminal::Double)?;
        let n = self.number("double")?;
        n.as_f64()
            .ok_or_else(|| AvroError::mismatch("double", n.to_string()))
    }

    fn read_string(&mut self) -> Result<String> {
        self.advance_to(Terminal::String)?;
        if self.parser.top_symbol() == Some(Terminal::MapKeyMarker.into()) {
            self.advance(Terminal::MapKeyMarker)?;
            return self.current()?.next_key();
        }
        self.text("string")
    }

    fn skip_string(&mut self) -> Result<()> {
        self.read_string().map(drop)
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.advance_to(Terminal::Bytes)?;
        latin1_bytes(&self.text("bytes")?)
    }

    fn skip_bytes(&mut self) -> Result<()> {
        self.read_bytes().map(drop)
    }

    fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>> {
        self.fixed(size)
    }

    fn skip_fixed(&mut self, size: usize) -> Result<()> {
        self.fixed(size).map(drop)
    }

    fn read_enum(&mut self) -> Result<usize> {
        self.advance_to(Terminal::Enum)?;
        let symbol = self.text("enum")?;
        let top = self.parser.pop_symbol()?;
        match self.parser.grammar().expect_action(top)? {
            Action::EnumLabels(labels) => labels.iter().position(|l| *l == symbol).ok_or_else(|| {
                AvroError::mismatch(format!("one of {}", labels.join(", ")), symbol.as_str())
            }),
            other => Err(AvroError::mismatch("enum labels", format!("{other:?}"))),
        }
    }

    fn read_array_start(&mut self) -> Result<usize> {
        self.open(Terminal::ArrayStart, Terminal::ArrayEnd)
    }

    fn array_next(&mut self) -> Result<usize> {
        self.process_trailing_implicit_actions()?;
        self.items_left(Terminal::ArrayEnd)
    }

    fn skip_array(&mut self) -> Result<usize> {
        self.skip_whole(Terminal::ArrayStart, Terminal::ArrayEnd)
    }

    fn read_map_start(&mut self) -> Result<usize> {
        self.open(Terminal::MapStart, Terminal::MapEnd)
    }

    fn map_next(&mut self) -> Result<usize> {
        self.process_trailing_implicit_actions()?;
        self.items_left(Terminal::MapEnd)
    }

    fn skip_map(&mut self) -> Result<usize> {
        self.skip_whole(Terminal::MapStart, Terminal::MapEnd)
    }

    fn read_index(&mut self) -> Result<usize> {
        self.advance_to(Terminal::Union)?;
        let top = self.parser.pop_symbol()?;
        let (label, value) = match self.next_value("start-union")? {
            Value::Null => ("null".to_string(), Value::Null),
            Value::Object(entries) if entries.len() == 1 => {
                let mut entries = entries.into_iter();
                entries
                    .next()
                    .ok_or_else(|| AvroError::mismatch("start-union", "empty object"))?
            }
            Value::Object(entries) => {
                return Err(AvroError::mismatch(
                    "start-union",
                    format!("object with {} members", entries.len()),
                ))
            }
            other => return Err(AvroError::mismatch("start-union", shape(&other))),
        };
        let alt = self.parser.grammar().expect_alternative(top)?;
        let index = alt
            .find_label(&label)
            .ok_or_else(|| AvroError::mismatch("union branch", format!("unknown branch {label}")))?;
        let symbol = alt.symbol(index)?;
        self.cursors.push(Cursor::Value(Some(value)));
        self.parser.push_symbol(Symbol::UnionEnd);
        self.parser.push_symbol(symbol);
        Ok(index)
    }
}
