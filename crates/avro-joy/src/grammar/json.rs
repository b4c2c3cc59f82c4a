//! Grammar for codecs that follow a single schema (the JSON codecs).

use std::collections::HashMap;

use super::{Action, Grammar, Symbol, Terminal};
use crate::error::Result;
use crate::schema::{Schema, SchemaKind};

/// Builds the grammar the JSON encoder and decoder walk for `schema`.
///
/// Record fields are bracketed by `FieldAdjust`/`FieldEnd` so the codecs can
/// emit or look up object keys. Union branches are labelled by full name.
pub fn json_grammar(schema: &Schema) -> Result<Grammar> {
    let mut grammar = Grammar::new();
    let body = generate(&mut grammar, schema, &mut HashMap::new())?;
    grammar.set_root(vec![body]);
    tracing::debug!(schema = schema.full_name(), "built JSON grammar");
    Ok(grammar)
}

fn generate(g: &mut Grammar, schema: &Schema, seen: &mut HashMap<usize, Symbol>) -> Result<Symbol> {
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
            let labels = g.push_action(Action::EnumLabels(e.symbols().to_vec()));
            g.seq(vec![Terminal::Enum.into(), labels])
        }
        SchemaKind::Array(items) => {
            let item = generate(g, items, seen)?;
            let rep = g.repeat(Terminal::ArrayEnd, vec![item, Terminal::ItemEnd.into()]);
            g.seq(vec![Terminal::ArrayStart.into(), rep])
        }
        SchemaKind::Map(values) => {
            let value = generate(g, values, seen)?;
            let rep = g.repeat(
                Terminal::MapEnd,
                vec![
                    Terminal::String.into(),
                    Terminal::MapKeyMarker.into(),
                    value,
                    Terminal::ItemEnd.into(),
                ],
            );
            g.seq(vec![Terminal::MapStart.into(), rep])
        }
        SchemaKind::Union(u) => {
            let mut symbols = Vec::with_capacity(u.types().len());
            let mut labels = Vec::with_capacity(u.types().len());
            for branch in u.types() {
                symbols.push(generate(g, branch, seen)?);
                labels.push(branch.full_name().to_string());
            }
            let alt = g.alt(symbols, labels);
            g.seq(vec![Terminal::Union.into(), alt])
        }
        SchemaKind::Record(record) => {
            if let Some(symbol) = seen.get(&schema.id()) {
                return Ok(*symbol);
            }
            let id = g.reserve_sequence();
            seen.insert(schema.id(), Symbol::Sequence(id));
            let fields = record.fields()?;
            let mut production = Vec::with_capacity(fields.len() * 3 + 2);
            production.push(Symbol::RecordStart);
            for (pos, field) in fields.iter().enumerate() {
                production.push(g.push_action(Action::FieldAdjust {
                    pos,
                    name: field.name().to_string(),
                }));
                production.push(generate(g, field.schema(), seen)?);
                production.push(Symbol::FieldEnd);
            }
            production.push(Symbol::RecordEnd);
            g.fill_sequence(id, production);
            Symbol::Sequence(id)
        }
    };
    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Parser, SymbolKind};
    use std::sync::Arc;

    #[test]
    fn recursive_records_terminate() {
        let schema = Schema::parse_str(
            r#"{"type":"record","name":"Node","fields":[
                {"name":"v","type":"int"},
                {"name":"next","type":["null","Node"]}
            ]}"#,
        )
        .unwrap();
        let grammar = json_grammar(&schema).unwrap();
        let Symbol::Sequence(id) = grammar.production(Symbol::Root)[0] else {
            panic!("record must be a sequence");
        };
        let union = grammar.production(Symbol::Sequence(id))[5];
        let Symbol::Alternative(alt) = grammar.production(union)[1] else {
            panic!("union must carry branches");
        };
        assert_eq!(grammar.alternative(alt).symbols[1], Symbol::Sequence(id));
        assert_eq!(grammar.alternative(alt).labels, vec!["null", "Node"]);
    }

    #[test]
    fn map_entries_carry_key_markers() {
        let schema = Schema::parse_str(r#"{"type":"map","values":"long"}"#).unwrap();
        let mut p = Parser::new(Arc::new(json_grammar(&schema).unwrap()));
        p.step(Terminal::MapStart).unwrap();
        p.step(Terminal::String).unwrap();
        p.step(Terminal::MapKeyMarker).unwrap();
        p.step(Terminal::Long).unwrap();
        p.step(Terminal::ItemEnd).unwrap();
        p.step(Terminal::MapEnd).unwrap();
        assert_eq!(p.depth(), 1);
    }

    #[test]
    fn fixed_is_followed_by_size_check() {
        let schema = Schema::parse_str(r#"{"type":"fixed","name":"F","size":3}"#).unwrap();
        let grammar = Arc::new(json_grammar(&schema).unwrap());
        let mut p = Parser::new(Arc::clone(&grammar));
        p.step(Terminal::Fixed).unwrap();
        let top = p.pop_symbol().unwrap();
        assert_eq!(grammar.kind(top), SymbolKind::ExplicitAction);
        assert!(matches!(grammar.action_of(top), Some(Action::IntCheck(3))));
    }
}
