//! Rewriting a writer schema into the reader's naming.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{Field, Name, Schema, SchemaKind};
use crate::error::Result;

type FieldAliases = HashMap<Name, HashMap<String, String>>;

/// Renames the named types and fields of `writer` according to the aliases
/// declared in `reader`.
///
/// Returns `writer` itself when the schemas are equal or the reader has no
/// aliases at all.
pub fn apply_aliases(writer: &Schema, reader: &Schema) -> Result<Schema> {
    if writer == reader {
        return Ok(writer.clone());
    }
    let mut aliases = HashMap::new();
    let mut field_aliases = FieldAliases::new();
    collect_aliases(reader, &mut HashSet::new(), &mut aliases, &mut field_aliases);
    if aliases.is_empty() && field_aliases.is_empty() {
        return Ok(writer.clone());
    }
    debug!(
        type_aliases = aliases.len(),
        records_with_field_aliases = field_aliases.len(),
        "rewriting writer schema with reader aliases"
    );
    rewrite(writer, &mut HashMap::new(), &aliases, &field_aliases)
}

fn collect_aliases(
    schema: &Schema,
    seen: &mut HashSet<usize>,
    aliases: &mut HashMap<Name, Name>,
    field_aliases: &mut FieldAliases,
) {
    if let Some(named) = schema.named() {
        for alias in named.aliases() {
            aliases.insert(alias, named.name().clone());
        }
    }
    match schema.kind() {
        SchemaKind::Record(record) => {
            if !seen.insert(schema.id()) {
                return;
            }
            let name = record.named().name();
            for field in record.fields_or_empty() {
                for alias in field.aliases() {
                    field_aliases
                        .entry(name.clone())
                        .or_default()
                        .insert(alias.to_string(), field.name().to_string());
                }
                collect_aliases(field.schema(), seen, aliases, field_aliases);
            }
            if let Some(renames) = field_aliases.get(name).cloned() {
                for alias in record.named().aliases() {
                    field_aliases.insert(alias, renames.clone());
                }
            }
        }
        SchemaKind::Array(inner) | SchemaKind::Map(inner) => {
            collect_aliases(inner, seen, aliases, field_aliases)
        }
        SchemaKind::Union(u) => {
            for branch in u.types() {
                collect_aliases(branch, seen, aliases, field_aliases);
            }
        }
        _ => {}
    }
}

fn rewrite(
    schema: &Schema,
    seen: &mut HashMap<usize, Schema>,
    aliases: &HashMap<Name, Name>,
    field_aliases: &FieldAliases,
) -> Result<Schema> {
    let renamed = |name: &Name| aliases.get(name).cloned();
    let result = match schema.kind() {
        SchemaKind::Record(record) => {
            if let Some(done) = seen.get(&schema.id()) {
                return Ok(done.clone());
            }
            let original = record.named().name();
            let name = renamed(original).unwrap_or_else(|| original.clone());
            let result = Schema::record(name.clone(), record.named().doc().map(str::to_string), record.is_error())?;
            seen.insert(schema.id(), result.clone());
            let renames = field_aliases.get(&name);
            let mut fields = Vec::new();
            for field in record.fields()? {
                let field_schema = rewrite(field.schema(), seen, aliases, field_aliases)?;
                let field_name = renames
                    .and_then(|r| r.get(field.name()))
                    .map(String::as_str)
                    .unwrap_or(field.name());
                let copy = Field::new_unchecked(
                    field_name,
                    field_schema,
                    field.doc().map(str::to_string),
                    field.default_value().cloned(),
                    field.order(),
                )?;
                copy.props().add_all(field.props())?;
                fields.push(copy);
            }
            result.set_fields(fields)?;
            result
        }
        SchemaKind::Enum(e) => match renamed(e.named().name()) {
            Some(name) => Schema::enumeration(
                name,
                e.named().doc().map(str::to_string),
                e.symbols().to_vec(),
                e.default_symbol().map(str::to_string),
            )?,
            None => return Ok(schema.clone()),
        },
        SchemaKind::Fixed(f) => match renamed(f.named().name()) {
            Some(name) => Schema::fixed(name, f.named().doc().map(str::to_string), f.size())?,
            None => return Ok(schema.clone()),
        },
        SchemaKind::Array(items) => {
            let items_rewritten = rewrite(items, seen, aliases, field_aliases)?;
            if Schema::ptr_eq(&items_rewritten, items) {
                return Ok(schema.clone());
            }
            Schema::array(items_rewritten)
        }
        SchemaKind::Map(values) => {
            let values_rewritten = rewrite(values, seen, aliases, field_aliases)?;
            if Schema::ptr_eq(&values_rewritten, values) {
                return Ok(schema.clone());
            }
            Schema::map(values_rewritten)
        }
        SchemaKind::Union(u) => {
            let branches = u
                .types()
                .iter()
                .map(|branch| rewrite(branch, seen, aliases, field_aliases))
                .collect::<Result<Vec<_>>>()?;
            if branches.iter().zip(u.types()).all(|(a, b)| Schema::ptr_eq(a, b)) {
                return Ok(schema.clone());
            }
            Schema::union(branches)?
        }
        _ => return Ok(schema.clone()),
    };
    result.props().add_all(schema.props())?;
    Ok(result)
}
