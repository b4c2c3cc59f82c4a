//! Reading data written with one schema through another.

use std::io::Cursor;
use std::sync::Arc;

use crate::binary::BinaryDecoder;
use crate::error::{AvroError, Result};
use crate::grammar::{
    resolving_grammar, Action, ActionHandler, Grammar, Parser, SkipHandler, Symbol, Terminal,
};
use crate::io::Decoder;
use crate::schema::{Field, Schema};

/// Decoder over the binary encoding of a reader field default.
type DefaultDecoder = BinaryDecoder<Cursor<Arc<[u8]>>>;

/// Resolution of a writer schema against a reader schema.
///
/// Building one is the expensive step; the result is immutable and can be
/// shared across threads, each handing out its own [`ResolvingDecoder`]s.
#[derive(Debug, Clone)]
pub struct Resolver {
    grammar: Arc<Grammar>,
    writer: Schema,
    reader: Schema,
}

impl Resolver {
    pub fn new(writer: &Schema, reader: &Schema) -> Result<Self> {
        let grammar = resolving_grammar(writer, reader)?;
        tracing::debug!(
            writer = writer.full_name(),
            reader = reader.full_name(),
            "resolved writer schema against reader schema"
        );
        Ok(Self {
            grammar: Arc::new(grammar),
            writer: writer.clone(),
            reader: reader.clone(),
        })
    }

    pub fn writer(&self) -> &Schema {
        &self.writer
    }

    pub fn reader(&self) -> &Schema {
        &self.reader
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Reads writer data from `input` as reader values.
    pub fn decoder<D: Decoder>(&self, input: D) -> ResolvingDecoder<D> {
        ResolvingDecoder::new(self, input)
    }
}

/// A [`Decoder`] that presents writer data in the shape of the reader
/// schema.
///
/// Record fields arrive in writer order followed by defaulted reader fields;
/// [`Decoder::read_field_order`] tells the caller which is which. Writer
/// fields unknown to the reader are skipped, promotions are applied and
/// reader defaults are replayed from their binary encoding.
pub struct ResolvingDecoder<D: Decoder> {
    parser: Parser,
    inner: D,
    default: Option<DefaultDecoder>,
}

impl<D: Decoder> ResolvingDecoder<D> {
    pub fn new(resolver: &Resolver, inner: D) -> Self {
        Self {
            parser: Parser::new(Arc::clone(&resolver.grammar)),
            inner,
            default: None,
        }
    }

    pub fn get_ref(&self) -> &D {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    /// Consumes whatever the writer wrote after the last value the reader
    /// asked for. Call once per datum, after reading it.
    pub fn drain(&mut self) -> Result<()> {
        self.process_implicit_actions()
    }

    fn input(&mut self) -> &mut dyn Decoder {
        match &mut self.default {
            Some(default) => default as &mut dyn Decoder,
            None => &mut self.inner,
        }
    }

    fn grammar(&self) -> Arc<Grammar> {
        Arc::clone(self.parser.shared_grammar())
    }

    fn writer_union(&mut self) -> Result<()> {
        let top = self.parser.pop_symbol()?;
        let grammar = self.grammar();
        let branches = grammar.expect_alternative(top)?;
        let index = self.input().read_index()?;
        self.parser.push_symbol(branches.symbol(index)?);
        Ok(())
    }

    fn start_default(&mut self, bytes: &Arc<[u8]>) {
        self.default = Some(BinaryDecoder::new(Cursor::new(Arc::clone(bytes))));
    }

    fn fixed_size(&mut self) -> Result<usize> {
        self.advance(Terminal::Fixed)?;
        let top = self.parser.pop_symbol()?;
        match self.parser.grammar().expect_action(top)? {
            Action::IntCheck(size) => Ok(*size),
            other => Err(AvroError::mismatch("fixed size", format!("{other:?}"))),
        }
    }

    fn items_done(&mut self, n: usize, end: Terminal) -> Result<usize> {
        if n == 0 {
            self.advance(end)?;
        }
        Ok(n)
    }
}

impl<D: Decoder> ActionHandler for ResolvingDecoder<D> {
    fn parser(&mut self) -> &mut Parser {
        &mut self.parser
    }

    fn do_action(&mut self, input: Option<Terminal>, top: Symbol) -> Result<Option<Symbol>> {
        match top {
            Symbol::WriterUnion => {
                self.writer_union()?;
                return Ok(None);
            }
            Symbol::DefaultEnd => {
                self.default = None;
                return Ok(None);
            }
            Symbol::Action(_) => {}
            other => {
                return Err(AvroError::mismatch(
                    "resolving action",
                    self.parser.grammar().describe(other),
                ))
            }
        }
        let grammar = self.grammar();
        match grammar.expect_action(top)? {
            Action::FieldOrder(_) => Ok((input == Some(Terminal::FieldAction)).then_some(top)),
            Action::Resolving { writer, reader } => {
                if input == Some(*reader) {
                    Ok(Some(Symbol::Terminal(*writer)))
                } else {
                    Err(AvroError::mismatch(
                        input.map_or("end of datum", Terminal::name),
                        reader.name(),
                    ))
                }
            }
            Action::Skip(symbol) => {
                tracing::trace!(value = %grammar.describe(*symbol), "skipping writer-only value");
                self.skip_symbol(*symbol)?;
                Ok(None)
            }
            Action::DefaultStart(bytes) => {
                tracing::trace!(len = bytes.len(), "reading reader default");
                self.start_default(bytes);
                Ok(None)
            }
            Action::Error(msg) => Err(AvroError::Unresolvable(msg.clone())),
            other => Err(AvroError::mismatch("resolving action", format!("{other:?}"))),
        }
    }
}

impl<D: Decoder> SkipHandler for ResolvingDecoder<D> {
    fn skip_action(&mut self) -> Result<()> {
        let top = self.parser.pop_symbol()?;
        match top {
            Symbol::WriterUnion => return self.writer_union(),
            Symbol::DefaultEnd => {
                self.default = None;
                return Ok(());
            }
            Symbol::Action(_) => {}
            _ => return Ok(()),
        }
        let grammar = self.grammar();
        match grammar.expect_action(top)? {
            Action::Resolving { writer, .. } => self.parser.push_symbol((*writer).into()),
            Action::Skip(symbol) => self.parser.push_symbol(*symbol),
            Action::DefaultStart(bytes) => self.start_default(bytes),
            Action::Error(msg) => return Err(AvroError::Unresolvable(msg.clone())),
            _ => {}
        }
        Ok(())
    }

    fn skip_top_symbol(&mut self) -> Result<()> {
        let top = self.parser.top_symbol();
        match top.and_then(Symbol::terminal) {
            Some(Terminal::Null) => self.read_null(),
            Some(Terminal::Boolean) => self.read_boolean().map(drop),
            Some(Terminal::Int) => self.read_int().map(drop),
            Some(Terminal::Long) => self.read_long().map(drop),
            Some(Terminal::Float) => self.read_float().map(drop),
            Some(Terminal::Double) => self.read_double().map(drop),
            Some(Terminal::String) => self.skip_string(),
            Some(Terminal::Bytes) => self.skip_bytes(),
            Some(Terminal::Enum) => self.read_enum().map(drop),
            Some(Terminal::Fixed) => {
                let size = self.fixed_size()?;
                self.input().skip_fixed(size)
            }
            Some(Terminal::Union) => self.read_index().map(drop),
            Some(Terminal::ArrayStart) => self.skip_array().map(drop),
            Some(Terminal::MapStart) => self.skip_map().map(drop),
            _ => Err(AvroError::mismatch(
                "skippable value",
                top.map_or_else(|| "empty stack".to_string(), |s| self.parser.grammar().describe(s)),
            )),
        }
    }
}

impl<D: Decoder> Decoder for ResolvingDecoder<D> {
    fn read_null(&mut self) -> Result<()> {
        self.advance(Terminal::Null)?;
        self.input().read_null()
    }

    fn read_boolean(&mut self) -> Result<bool> {
        self.advance(Terminal::Boolean)?;
        self.input().read_boolean()
    }

    fn read_int(&mut self) -> Result<i32> {
        self.advance(Terminal::Int)?;
        self.input().read_int()
    }

    fn read_long(&mut self) -> Result<i64> {
        match self.advance(Terminal::Long)? {
            Symbol::Terminal(Terminal::Int) => Ok(i64::from(self.input().read_int()?)),
            // Truncates toward zero and saturates; NaN reads as 0.
            Symbol::Terminal(Terminal::Double) => Ok(self.input().read_double()? as i64),
            _ => self.input().read_long(),
        }
    }

    fn read_float(&mut self) -> Result<f32> {
        match self.advance(Terminal::Float)? {
            Symbol::Terminal(Terminal::Int) => Ok(self.input().read_int()? as f32),
            Symbol::Terminal(Terminal::Long) => Ok(self.input().read_long()? as f32),
            _ => self.input().read_float(),
        }
    }

    fn read_double(&mut self) -> Result<f64> {
        match self.advance(Terminal::Double)? {
            Symbol::Terminal(Terminal::Int) => Ok(f64::from(self.input().read_int()?)),
            Symbol::Terminal(Terminal::Long) => Ok(self.input().read_long()? as f64),
            Symbol::Terminal(Terminal::Float) => Ok(f64::from(self.input().read_float()?)),
            _ => self.input().read_double(),
        }
    }

    fn read_string(&mut self) -> Result<String> {
        match self.advance(Terminal::String)? {
            Symbol::Terminal(Terminal::Bytes) => {
                let bytes = self.input().read_bytes()?;
                Ok(String::from_utf8(bytes)
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
            }
            _ => self.input().read_string(),
        }
    }

    fn skip_string(&mut self) -> Result<()> {
        match self.advance(Terminal::String)? {
            Symbol::Terminal(Terminal::Bytes) => self.input().skip_bytes(),
            _ => self.input().skip_string(),
        }
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        match self.advance(Terminal::Bytes)? {
            Symbol::Terminal(Terminal::String) => Ok(self.input().read_string()?.into_bytes()),
            _ => self.input().read_bytes(),
        }
    }

    fn skip_bytes(&mut self) -> Result<()> {
        match self.advance(Terminal::Bytes)? {
            Symbol::Terminal(Terminal::String) => self.input().skip_string(),
            _ => self.input().skip_bytes(),
        }
    }

    fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>> {
        let expected = self.fixed_size()?;
        if size != expected {
            return Err(AvroError::mismatch(
                format!("fixed size {expected}"),
                format!("fixed size {size}"),
            ));
        }
        self.input().read_fixed(expected)
    }

    fn skip_fixed(&mut self, size: usize) -> Result<()> {
        let expected = self.fixed_size()?;
        if size != expected {
            return Err(AvroError::mismatch(
                format!("fixed size {expected}"),
                format!("fixed size {size}"),
            ));
        }
        self.input().skip_fixed(expected)
    }

    fn read_enum(&mut self) -> Result<usize> {
        self.advance(Terminal::Enum)?;
        let top = self.parser.pop_symbol()?;
        let grammar = self.grammar();
        let Action::EnumAdjust {
            reader_size,
            adjustments,
        } = grammar.expect_action(top)?
        else {
            return Err(AvroError::mismatch("enum", grammar.describe(top)));
        };
        let n = self.input().read_enum()?;
        match adjustments {
            None if n < *reader_size => Ok(n),
            None => Err(AvroError::malformed(format!(
                "enum ordinal {n} out of range for {reader_size} symbols"
            ))),
            Some(adjustments) => match adjustments.get(n) {
                Some(Ok(ordinal)) => Ok(*ordinal),
                Some(Err(msg)) => Err(AvroError::Unresolvable(msg.clone())),
                None => Err(AvroError::malformed(format!(
                    "enum ordinal {n} out of range for {} symbols",
                    adjustments.len()
                ))),
            },
        }
    }

    fn read_array_start(&mut self) -> Result<usize> {
        self.advance(Terminal::ArrayStart)?;
        let n = self.input().read_array_start()?;
        self.items_done(n, Terminal::ArrayEnd)
    }

    fn array_next(&mut self) -> Result<usize> {
        self.process_trailing_implicit_actions()?;
        let n = self.input().array_next()?;
        self.items_done(n, Terminal::ArrayEnd)
    }

    fn skip_array(&mut self) -> Result<usize> {
        self.advance(Terminal::ArrayStart)?;
        let mut n = self.input().skip_array()?;
        while n > 0 {
            for _ in 0..n {
                self.skip_repeater()?;
            }
            n = self.input().skip_array()?;
        }
        self.advance(Terminal::ArrayEnd)?;
        Ok(0)
    }

    fn read_map_start(&mut self) -> Result<usize> {
        self.advance(Terminal::MapStart)?;
        let n = self.input().read_map_start()?;
        self.items_done(n, Terminal::MapEnd)
    }

    fn map_next(&mut self) -> Result<usize> {
        self.process_trailing_implicit_actions()?;
        let n = self.input().map_next()?;
        self.items_done(n, Terminal::MapEnd)
    }

    fn skip_map(&mut self) -> Result<usize> {
        self.advance(Terminal::MapStart)?;
        let mut n = self.input().skip_map()?;
        while n > 0 {
            for _ in 0..n {
                self.skip_repeater()?;
            }
            n = self.input().skip_map()?;
        }
        self.advance(Terminal::MapEnd)?;
        Ok(0)
    }

    fn read_index(&mut self) -> Result<usize> {
        self.advance(Terminal::Union)?;
        let top = self.parser.pop_symbol()?;
        let grammar = self.grammar();
        let (index, symbol) = match grammar.action_of(top) {
            Some(Action::UnionAdjust { index, symbol }) => (*index, *symbol),
            _ => {
                let branches = grammar.expect_alternative(top)?;
                let index = self.input().read_index()?;
                (index, branches.symbol(index)?)
            }
        };
        self.parser.push_symbol(symbol);
        Ok(index)
    }

    fn read_field_order(&mut self) -> Result<Option<Arc<[Field]>>> {
        let top = self.advance(Terminal::FieldAction)?;
        match self.parser.grammar().action_of(top) {
            Some(Action::FieldOrder(fields)) => Ok(Some(Arc::clone(fields))),
            _ => Err(AvroError::mismatch(
                "field-order",
                self.parser.grammar().describe(top),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::BinaryEncoder;
    use crate::io::Encoder;
    use avro_joy_buffers::Reader;

    fn schema(text: &str) -> Schema {
        Schema::parse_str(text).unwrap()
    }

    fn bytes(f: impl FnOnce(&mut BinaryEncoder<Vec<u8>>) -> Result<()>) -> Vec<u8> {
        let mut encoder = BinaryEncoder::new(Vec::new());
        f(&mut encoder).unwrap();
        encoder.into_inner().unwrap()
    }

    fn field_names(fields: &[Field]) -> Vec<&str> {
        fields.iter().map(Field::name).collect()
    }

    #[test]
    fn resolver_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Resolver>();
    }

    #[test]
    fn int_is_read_as_long() {
        let resolver = Resolver::new(&schema(r#""int""#), &schema(r#""long""#)).unwrap();
        let data = bytes(|e| e.write_int(-3));
        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        assert_eq!(d.read_long().unwrap(), -3);

        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        assert!(matches!(d.read_int(), Err(AvroError::TypeMismatch { .. })));
    }

    #[test]
    fn fields_are_skipped_and_defaulted() {
        let writer = schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"a","type":"int"},
                {"name":"b","type":"string"}]}"#,
        );
        let reader = schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"b","type":"string"},
                {"name":"c","type":"long","default":7}]}"#,
        );
        let resolver = Resolver::new(&writer, &reader).unwrap();
        let data = bytes(|e| {
            e.write_int(1)?;
            e.write_string("x")
        });
        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        let order = d.read_field_order().unwrap().unwrap();
        assert_eq!(field_names(&order), ["b", "c"]);
        assert_eq!(d.read_string().unwrap(), "x");
        assert_eq!(d.read_long().unwrap(), 7);
        d.drain().unwrap();
        assert!(d.get_mut().is_end().unwrap());
    }

    #[test]
    fn drain_skips_trailing_writer_fields() {
        let writer = schema(
            r#"{"type":"record","name":"R","fields":[
                {"name":"a","type":"int"},
                {"name":"b","type":{"type":"array","items":"string"}}]}"#,
        );
        let reader = schema(r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int"}]}"#);
        let resolver = Resolver::new(&writer, &reader).unwrap();
        let data = bytes(|e| {
            for (a, b) in [(1, "p"), (2, "q")] {
                e.write_int(a)?;
                e.write_array_start()?;
                e.set_item_count(1)?;
                e.start_item()?;
                e.write_string(b)?;
                e.write_array_end()?;
            }
            Ok(())
        });
        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        for expected in [1, 2] {
            d.read_field_order().unwrap();
            assert_eq!(d.read_int().unwrap(), expected);
            d.drain().unwrap();
        }
        assert!(d.get_mut().is_end().unwrap());
    }

    #[test]
    fn writer_union_branches_resolve_individually() {
        let resolver = Resolver::new(&schema(r#"["null","int"]"#), &schema(r#""long""#)).unwrap();
        let data = bytes(|e| {
            e.write_index(1)?;
            e.write_int(5)
        });
        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        assert_eq!(d.read_long().unwrap(), 5);

        let data = bytes(|e| e.write_index(0));
        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        assert!(matches!(d.read_long(), Err(AvroError::Unresolvable(_))));
    }

    #[test]
    fn non_union_writer_picks_a_reader_branch() {
        let resolver = Resolver::new(&schema(r#""int""#), &schema(r#"["null","long"]"#)).unwrap();
        let data = bytes(|e| e.write_int(9));
        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        assert_eq!(d.read_index().unwrap(), 1);
        assert_eq!(d.read_long().unwrap(), 9);
    }

    #[test]
    fn enum_symbols_are_remapped() {
        let writer = schema(r#"{"type":"enum","name":"E","symbols":["A","B","C"]}"#);
        let reader = schema(r#"{"type":"enum","name":"E","symbols":["C","A"]}"#);
        let resolver = Resolver::new(&writer, &reader).unwrap();

        let data = bytes(|e| e.write_enum(2));
        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        assert_eq!(d.read_enum().unwrap(), 0);

        let data = bytes(|e| e.write_enum(1));
        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        match d.read_enum() {
            Err(AvroError::Unresolvable(msg)) => assert_eq!(msg, "No match for B"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn skipped_arrays_of_records_with_defaults() {
        let writer = schema(
            r#"{"type":"array","items":{"type":"record","name":"P","fields":[
                {"name":"x","type":"int"}]}}"#,
        );
        let reader = schema(
            r#"{"type":"array","items":{"type":"record","name":"P","fields":[
                {"name":"x","type":"int"},
                {"name":"y","type":"string","default":"d"}]}}"#,
        );
        let resolver = Resolver::new(&writer, &reader).unwrap();
        let data = bytes(|e| {
            e.write_array_start()?;
            e.set_item_count(2)?;
            e.start_item()?;
            e.write_int(1)?;
            e.start_item()?;
            e.write_int(2)?;
            e.write_array_end()
        });
        let mut d = resolver.decoder(BinaryDecoder::new(Reader::new(&data)));
        assert_eq!(d.skip_array().unwrap(), 0);
        assert!(d.get_mut().is_end().unwrap());
    }
}
