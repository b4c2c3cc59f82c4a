//! Grammar for reading writer data under a reader schema.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Action, Grammar, Symbol, Terminal};
use crate::binary::BinaryEncoder;
use crate::datum::write_datum;
use crate::error::Result;
use crate::schema::{apply_aliases, Field, Schema, SchemaKind, SchemaType};
use crate::value::default_value;

/// Builds the grammar that reads data written with `writer` as if it had
/// been written with `reader`.
///
/// Aliases declared by the reader are applied to the writer first.
/// Incompatibilities do not fail here; they become error actions that fire
/// only when the data actually reaches them.
pub fn resolving_grammar(writer: &Schema, reader: &Schema) -> Result<Grammar> {
    let writer = apply_aliases(writer, reader)?;
    let mut generator = Generator::default();
    let body = generator.resolve(&writer, reader)?;
    generator.grammar.set_root(vec![body]);
    Ok(generator.grammar)
}

#[derive(Default)]
struct Generator {
    grammar: Grammar,
    resolved: HashMap<(usize, usize), Symbol>,
    simple: HashMap<usize, Symbol>,
}

impl Generator {
    fn resolve(&mut self, w: &Schema, r: &Schema) -> Result<Symbol> {
        if let SchemaKind::Union(wu) = w.kind() {
            if union_equiv(w, r) {
                return self.simple(r);
            }
            let mut symbols = Vec::with_capacity(wu.types().len());
            let mut labels = Vec::with_capacity(wu.types().len());
            for branch in wu.types() {
                symbols.push(self.resolve(branch, r)?);
                labels.push(branch.full_name().to_string());
            }
            let alt = self.grammar.alt(symbols, labels);
            return Ok(self.grammar.seq(vec![Symbol::WriterUnion, alt]));
        }
        let g = &mut self.grammar;
        let symbol = match (w.kind(), r.kind()) {
            (SchemaKind::Null, SchemaKind::Null) => Terminal::Null.into(),
            (SchemaKind::Boolean, SchemaKind::Boolean) => Terminal::Boolean.into(),
            (SchemaKind::Int, SchemaKind::Int) => Terminal::Int.into(),
            (SchemaKind::Long, SchemaKind::Long) => Terminal::Long.into(),
            (SchemaKind::Float, SchemaKind::Float) => Terminal::Float.into(),
            (SchemaKind::Double, SchemaKind::Double) => Terminal::Double.into(),
            (SchemaKind::String, SchemaKind::String) => Terminal::String.into(),
            (SchemaKind::Bytes, SchemaKind::Bytes) => Terminal::Bytes.into(),
            (SchemaKind::Fixed(wf), SchemaKind::Fixed(rf)) => {
                if wf.named().name().name() != rf.named().name().name() {
                    g.error(found_expecting(w, r))
                } else if wf.size() != rf.size() {
                    g.error(format!(
                        "Fixed size mismatch: found {}, expecting {}",
                        wf.size(),
                        rf.size()
                    ))
                } else {
                    let check = g.push_action(Action::IntCheck(rf.size()));
                    g.seq(vec![Terminal::Fixed.into(), check])
                }
            }
            (SchemaKind::Enum(we), SchemaKind::Enum(re)) => {
                if we.named().name().name() != re.named().name().name() {
                    g.error(found_expecting(w, r))
                } else {
                    let adjustments = if we.symbols() == re.symbols() {
                        None
                    } else {
                        Some(
                            we.symbols()
                                .iter()
                                .map(|symbol| {
                                    re.ordinal(symbol)
                                        .or_else(|| re.default_symbol().and_then(|d| re.ordinal(d)))
                                        .ok_or_else(|| format!("No match for {symbol}"))
                                })
                                .collect(),
                        )
                    };
                    let adjust = g.push_action(Action::EnumAdjust {
                        reader_size: re.symbols().len(),
                        adjustments,
                    });
                    g.seq(vec![Terminal::Enum.into(), adjust])
                }
            }
            (SchemaKind::Array(wi), SchemaKind::Array(ri)) => {
                let item = self.resolve(wi, ri)?;
                let g = &mut self.grammar;
                let rep = g.repeat(Terminal::ArrayEnd, vec![item]);
                g.seq(vec![Terminal::ArrayStart.into(), rep])
            }
            (SchemaKind::Map(wv), SchemaKind::Map(rv)) => {
                let value = self.resolve(wv, rv)?;
                let g = &mut self.grammar;
                let rep = g.repeat(Terminal::MapEnd, vec![Terminal::String.into(), value]);
                g.seq(vec![Terminal::MapStart.into(), rep])
            }
            (SchemaKind::Record(_), SchemaKind::Record(_)) => self.resolve_record(w, r)?,
            (_, SchemaKind::Union(_)) => self.resolve_reader_union(w, r)?,
            _ => match promotion(w.schema_type(), r.schema_type()) {
                Some((writer, reader)) => {
                    g.push_action(Action::Resolving { writer, reader })
                }
                None => g.error(found_expecting(w, r)),
            },
        };
        Ok(symbol)
    }

    fn resolve_record(&mut self, w: &Schema, r: &Schema) -> Result<Symbol> {
        let key = (w.id(), r.id());
        if let Some(symbol) = self.resolved.get(&key) {
            return Ok(*symbol);
        }
        let wfields = w.fields()?;
        let rfields = r.fields()?;

        let mut reordered: Vec<Field> = wfields
            .iter()
            .filter_map(|wf| r.field(wf.name()).cloned())
            .collect();
        let mut defaulted = Vec::new();
        for rf in rfields {
            if w.field(rf.name()).is_some() {
                continue;
            }
            if rf.default_value().is_none() {
                let symbol = self.grammar.error(format!(
                    "{}, missing required field {}",
                    found_expecting(w, r),
                    rf.name()
                ));
                self.resolved.insert(key, symbol);
                return Ok(symbol);
            }
            reordered.push(rf.clone());
            defaulted.push(rf);
        }

        let id = self.grammar.reserve_sequence();
        self.resolved.insert(key, Symbol::Sequence(id));
        let mut production = Vec::with_capacity(1 + wfields.len() + defaulted.len() * 3);
        production.push(self.grammar.push_action(Action::FieldOrder(reordered.into())));
        for wf in wfields {
            let symbol = match r.field(wf.name()) {
                Some(rf) => self.resolve(wf.schema(), rf.schema())?,
                None => {
                    let skipped = self.simple(wf.schema())?;
                    self.grammar.push_action(Action::Skip(skipped))
                }
            };
            production.push(symbol);
        }
        for rf in defaulted {
            match default_bytes(rf) {
                Ok(bytes) => {
                    production.push(self.grammar.push_action(Action::DefaultStart(bytes)));
                    production.push(self.simple(rf.schema())?);
                    production.push(Symbol::DefaultEnd);
                }
                Err(msg) => production.push(self.grammar.error(msg)),
            }
        }
        self.grammar.fill_sequence(id, production);
        Ok(Symbol::Sequence(id))
    }

    fn resolve_reader_union(&mut self, w: &Schema, r: &Schema) -> Result<Symbol> {
        match self.best_branch(w, r)? {
            Some((index, branch)) => {
                let symbol = self.resolve(w, &branch)?;
                let adjust = self.grammar.push_action(Action::UnionAdjust { index, symbol });
                Ok(self.grammar.seq(vec![Terminal::Union.into(), adjust]))
            }
            None => Ok(self.grammar.error(found_expecting(w, r))),
        }
    }

    /// Picks the reader branch a non-union writer value is read into: an
    /// exact match by type (and full name), then by unqualified name, then a
    /// structurally compatible record, then a promotion.
    fn best_branch(&mut self, w: &Schema, r: &Schema) -> Result<Option<(usize, Schema)>> {
        let branches = r.types().unwrap_or(&[]).to_vec();
        let wt = w.schema_type();
        let is_named = matches!(wt, SchemaType::Record | SchemaType::Enum | SchemaType::Fixed);

        for (j, b) in branches.iter().enumerate() {
            if b.schema_type() == wt && (!is_named || w.full_name() == b.full_name()) {
                return Ok(Some((j, b.clone())));
            }
        }
        if is_named {
            let short = w.name().map(|n| n.name());
            for (j, b) in branches.iter().enumerate() {
                if b.schema_type() == wt && b.name().map(|n| n.name()) == short {
                    return Ok(Some((j, b.clone())));
                }
            }
        }
        if wt == SchemaType::Record {
            for (j, b) in branches.iter().enumerate() {
                if b.schema_type() != SchemaType::Record {
                    continue;
                }
                let symbol = self.resolve_record(w, b)?;
                if !matches!(self.grammar.action_of(symbol), Some(Action::Error(_))) {
                    return Ok(Some((j, b.clone())));
                }
            }
        }
        for (j, b) in branches.iter().enumerate() {
            if promotion(wt, b.schema_type()).is_some() {
                return Ok(Some((j, b.clone())));
            }
        }
        Ok(None)
    }

    /// Grammar of a schema read against itself: skipping writer-only
    /// values and replaying reader defaults.
    fn simple(&mut self, schema: &Schema) -> Result<Symbol> {
        let g = &mut self.grammar;
        let symbol = match schema.kind() {
            SchemaKind::Null => Terminal::Null.into(),
            SchemaKind::Boolean => Terminal::Boolean.into(),
            SchemaKind::Int => Terminal::Int.into(),
            SchemaKind::Long => Terminal::Long.into(),
            SchemaKind::Float => Terminal::Float.into(),
            SchemaKind::Double => Terminal::Double.into(),
            SchemaKind::String => Terminal::String.into(),
            SchemaKind::Bytes => Terminal::Bytes.into(),
            SchemaKind::Fixed(f) => {
                let check = g.push_action(Action::IntCheck(f.size()));
                g.seq(vec![Terminal::Fixed.into(), check])
            }
            SchemaKind::Enum(e) => {
                let adjust = g.push_action(Action::EnumAdjust {
                    reader_size: e.symbols().len(),
                    adjustments: None,
                });
                g.seq(vec![Terminal::Enum.into(), adjust])
            }
            SchemaKind::Array(items) => {
                let item = self.simple(items)?;
                let g = &mut self.grammar;
                let rep = g.repeat(Terminal::ArrayEnd, vec![item]);
                g.seq(vec![Terminal::ArrayStart.into(), rep])
            }
            SchemaKind::Map(values) => {
                let value = self.simple(values)?;
                let g = &mut self.grammar;
                let rep = g.repeat(Terminal::MapEnd, vec![Terminal::String.into(), value]);
                g.seq(vec![Terminal::MapStart.into(), rep])
            }
            SchemaKind::Union(u) => {
                let mut symbols = Vec::with_capacity(u.types().len());
                let mut labels = Vec::with_capacity(u.types().len());
                for branch in u.types() {
                    symbols.push(self.simple(branch)?);
                    labels.push(branch.full_name().to_string());
                }
                let g = &mut self.grammar;
                let alt = g.alt(symbols, labels);
                g.seq(vec![Terminal::Union.into(), alt])
            }
            SchemaKind::Record(record) => {
                if let Some(symbol) = self.simple.get(&schema.id()) {
                    return Ok(*symbol);
                }
                let id = g.reserve_sequence();
                self.simple.insert(schema.id(), Symbol::Sequence(id));
                let fields = record.fields()?;
                let order = self.grammar.push_action(Action::FieldOrder(fields.to_vec().into()));
                let mut production = Vec::with_capacity(fields.len() + 1);
                production.push(order);
                for field in fields {
                    production.push(self.simple(field.schema())?);
                }
                self.grammar.fill_sequence(id, production);
                Symbol::Sequence(id)
            }
        };
        Ok(symbol)
    }
}

fn found_expecting(w: &Schema, r: &Schema) -> String {
    format!("Found {}, expecting {}", w.full_name(), r.full_name())
}

/// Writer/reader type pairs readable through a conversion.
fn promotion(writer: SchemaType, reader: SchemaType) -> Option<(Terminal, Terminal)> {
    use SchemaType as T;
    let pair = match (writer, reader) {
        (T::Int, T::Long) => (Terminal::Int, Terminal::Long),
        (T::Double, T::Long) => (Terminal::Double, Terminal::Long),
        (T::Int, T::Float) => (Terminal::Int, Terminal::Float),
        (T::Long, T::Float) => (Terminal::Long, Terminal::Float),
        (T::Int, T::Double) => (Terminal::Int, Terminal::Double),
        (T::Long, T::Double) => (Terminal::Long, Terminal::Double),
        (T::Float, T::Double) => (Terminal::Float, Terminal::Double),
        (T::String, T::Bytes) => (Terminal::String, Terminal::Bytes),
        (T::Bytes, T::String) => (Terminal::Bytes, Terminal::String),
        _ => return None,
    };
    Some(pair)
}

/// Binary encoding of a field's default under the field schema.
fn default_bytes(field: &Field) -> std::result::Result<Arc<[u8]>, String> {
    let invalid = |e: crate::error::AvroError| format!("Invalid default for field {}: {e}", field.name());
    let json = field
        .default_value()
        .ok_or_else(|| format!("No default for field {}", field.name()))?;
    let value = default_value(field.schema(), json).map_err(invalid)?;
    let mut encoder = BinaryEncoder::new(Vec::new());
    write_datum(&mut encoder, field.schema(), &value).map_err(invalid)?;
    let bytes = encoder.into_inner().map_err(invalid)?;
    Ok(bytes.into())
}

/// `true` if data written with union `write` decodes under `read` without
/// remapping: same shape, same names, same branch order.
pub fn union_equiv(write: &Schema, read: &Schema) -> bool {
    equiv(write, read, &mut HashMap::new())
}

fn equiv(w: &Schema, r: &Schema, seen: &mut HashMap<(usize, usize), bool>) -> bool {
    if w.schema_type() != r.schema_type() {
        return false;
    }
    if w.name().is_some() && w.full_name() != r.full_name() {
        return false;
    }
    match (w.kind(), r.kind()) {
        (SchemaKind::Array(wi), SchemaKind::Array(ri)) => equiv(wi, ri, seen),
        (SchemaKind::Map(wv), SchemaKind::Map(rv)) => equiv(wv, rv, seen),
        (SchemaKind::Fixed(wf), SchemaKind::Fixed(rf)) => wf.size() == rf.size(),
        (SchemaKind::Enum(we), SchemaKind::Enum(re)) => we.symbols() == re.symbols(),
        (SchemaKind::Union(wu), SchemaKind::Union(ru)) => {
            wu.types().len() == ru.types().len()
                && wu.types().iter().zip(ru.types()).all(|(a, b)| equiv(a, b, seen))
        }
        (SchemaKind::Record(_), SchemaKind::Record(_)) => {
            let key = (w.id(), r.id());
            if let Some(&known) = seen.get(&key) {
                return known;
            }
            seen.insert(key, true);
            let same = match (w.fields(), r.fields()) {
                (Ok(wf), Ok(rf)) => {
                    wf.len() == rf.len()
                        && wf
                            .iter()
                            .zip(rf)
                            .all(|(a, b)| a.name() == b.name() && equiv(a.schema(), b.schema(), seen))
                }
                _ => false,
            };
            seen.insert(key, same);
            same
        }
        _ => true,
    }
}
