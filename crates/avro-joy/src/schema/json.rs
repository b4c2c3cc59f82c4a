//! Schema → schema-definition JSON.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::{Field, Named, Order, Schema, SchemaKind};

impl Schema {
    /// Renders the schema as schema-definition JSON.
    ///
    /// Named types are written in full the first time they appear and by
    /// name afterwards, so recursive schemas terminate and parse back.
    pub fn to_json(&self) -> Value {
        let mut written = HashSet::new();
        write_schema(self, &mut written, None)
    }

    pub fn to_string_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_default()
    }
}

fn write_schema(schema: &Schema, written: &mut HashSet<String>, space: Option<&str>) -> Value {
    let mut object = Map::new();
    match schema.kind() {
        SchemaKind::Record(record) => {
            let named = record.named();
            let ty = if record.is_error() { "error" } else { "record" };
            if let Some(reference) = write_named(named, ty, written, space, &mut object) {
                return reference;
            }
            let inner_space = named.name().namespace();
            let fields: Vec<Value> = record
                .fields_or_empty()
                .iter()
                .map(|field| write_field(field, written, inner_space))
                .collect();
            object.insert("fields".into(), Value::Array(fields));
            write_aliases(named, &mut object);
        }
        SchemaKind::Enum(e) => {
            if let Some(reference) = write_named(e.named(), "enum", written, space, &mut object) {
                return reference;
            }
            let symbols = e.symbols().iter().map(|s| Value::from(s.as_str())).collect();
            object.insert("symbols".into(), Value::Array(symbols));
            if let Some(default) = e.default_symbol() {
                object.insert("default".into(), Value::from(default));
            }
            write_aliases(e.named(), &mut object);
        }
        SchemaKind::Fixed(f) => {
            if let Some(reference) = write_named(f.named(), "fixed", written, space, &mut object) {
                return reference;
            }
            object.insert("size".into(), Value::from(f.size()));
            write_aliases(f.named(), &mut object);
        }
        SchemaKind::Array(items) => {
            object.insert("type".into(), Value::from("array"));
            object.insert("items".into(), write_schema(items, written, space));
        }
        SchemaKind::Map(values) => {
            object.insert("type".into(), Value::from("map"));
            object.insert("values".into(), write_schema(values, written, space));
        }
        SchemaKind::Union(u) => {
            return Value::Array(
                u.types()
                    .iter()
                    .map(|branch| write_schema(branch, written, space))
                    .collect(),
            );
        }
        _ => {
            let name = schema.schema_type().name();
            if schema.props().is_empty() {
                return Value::from(name);
            }
            object.insert("type".into(), Value::from(name));
        }
    }
    schema.props().write_to(&mut object);
    Value::Object(object)
}

/// Writes `type`/`name`/`namespace`/`doc`, or returns a name reference when
/// the type was already written.
fn write_named(
    named: &Named,
    ty: &str,
    written: &mut HashSet<String>,
    space: Option<&str>,
    object: &mut Map<String, Value>,
) -> Option<Value> {
    let name = named.name();
    if !written.insert(name.full_name().to_string()) {
        return Some(Value::from(name.qualified(space)));
    }
    object.insert("type".into(), Value::from(ty));
    object.insert("name".into(), Value::from(name.name()));
    match name.namespace() {
        Some(ns) if Some(ns) != space => {
            object.insert("namespace".into(), Value::from(ns));
        }
        None if space.is_some() => {
            object.insert("namespace".into(), Value::from(""));
        }
        _ => {}
    }
    if let Some(doc) = named.doc() {
        object.insert("doc".into(), Value::from(doc));
    }
    None
}

fn write_aliases(named: &Named, object: &mut Map<String, Value>) {
    let aliases = named.aliases();
    if aliases.is_empty() {
        return;
    }
    let space = named.name().namespace();
    let aliases = aliases
        .iter()
        .map(|alias| Value::from(alias.qualified(space)))
        .collect();
    object.insert("aliases".into(), Value::Array(aliases));
}

fn write_field(field: &Field, written: &mut HashSet<String>, space: Option<&str>) -> Value {
    let mut object = Map::new();
    object.insert("name".into(), Value::from(field.name()));
    object.insert("type".into(), write_schema(field.schema(), written, space));
    if let Some(doc) = field.doc() {
        object.insert("doc".into(), Value::from(doc));
    }
    if let Some(default) = field.default_value() {
        object.insert("default".into(), default.clone());
    }
    if field.order() != Order::Ascending {
        object.insert("order".into(), Value::from(field.order().as_str()));
    }
    let aliases: Vec<Value> = field.aliases().map(Value::from).collect();
    if !aliases.is_empty() {
        object.insert("aliases".into(), Value::Array(aliases));
    }
    field.props().write_to(&mut object);
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_without_props_are_bare_names() {
        assert_eq!(Schema::long().to_json(), json!("long"));
        let s = Schema::string();
        s.add_prop("logical", "uuid").unwrap();
        assert_eq!(s.to_json(), json!({"type": "string", "logical": "uuid"}));
    }

    #[test]
    fn nested_names_are_namespace_relative() {
        let text = r#"{"type":"record","name":"Outer","namespace":"a.b","fields":[
            {"name":"h","type":{"type":"fixed","name":"Hash","size":4}},
            {"name":"h2","type":"Hash"},
            {"name":"e","type":{"type":"enum","name":"x.E","symbols":["A"],"default":"A"}},
            {"name":"n","type":{"type":"fixed","name":"Free","namespace":"","size":1}}
        ]}"#;
        let schema = Schema::parse_str(text).unwrap();
        let json = schema.to_json();
        assert_eq!(json["namespace"], json!("a.b"));
        assert_eq!(json["fields"][0]["type"], json!({"type":"fixed","name":"Hash","size":4}));
        assert_eq!(json["fields"][1]["type"], json!("Hash"));
        assert_eq!(
            json["fields"][2]["type"],
            json!({"type":"enum","name":"E","namespace":"x","symbols":["A"],"default":"A"})
        );
        assert_eq!(json["fields"][3]["type"]["namespace"], json!(""));
        assert_eq!(Schema::parse_str(&schema.to_string()).unwrap(), schema);
    }

    #[test]
    fn field_attributes_are_written() {
        let text = r#"{"type":"record","name":"R","doc":"a record","fields":[
            {"name":"a","type":"int","default":1,"order":"descending","aliases":["b"],"doc":"d","unit":"ms"}
        ],"aliases":["Old"]}"#;
        let json = Schema::parse_str(text).unwrap().to_json();
        assert_eq!(json["doc"], json!("a record"));
        assert_eq!(json["aliases"], json!(["Old"]));
        assert_eq!(
            json["fields"][0],
            json!({"name":"a","type":"int","doc":"d","default":1,"order":"descending","aliases":["b"],"unit":"ms"})
        );
    }

    #[test]
    fn error_records_keep_their_type() {
        let schema = Schema::parse_str(r#"{"type":"error","name":"Oops","fields":[]}"#).unwrap();
        assert!(schema.is_error());
        assert_eq!(schema.to_json()["type"], json!("error"));
    }
}
