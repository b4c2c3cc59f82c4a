//! Schema-definition JSON → [`Schema`].

use serde_json::{Map, Value};

use super::{Field, Name, Names, Order, Schema, SchemaType};
use crate::error::{AvroError, Result};
use crate::props::{ENUM_RESERVED, FIELD_RESERVED, SCHEMA_RESERVED};

/// Parses schema text. Named types defined by one `parse` call stay visible
/// to later calls on the same parser.
pub struct SchemaParser {
    names: Names,
    validate_defaults: bool,
}

impl Default for SchemaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaParser {
    pub fn new() -> Self {
        Self {
            names: Names::new(),
            validate_defaults: true,
        }
    }

    /// Enables or disables structural checking of field defaults.
    pub fn with_validate_defaults(mut self, validate: bool) -> Self {
        self.validate_defaults = validate;
        self
    }

    pub fn names(&self) -> &Names {
        &self.names
    }

    pub fn parse(&mut self, text: &str) -> Result<Schema> {
        let json: Value = serde_json::from_str(text)
            .map_err(|e| AvroError::schema(format!("invalid schema JSON: {e}")))?;
        self.parse_value(&json)
    }

    pub fn parse_value(&mut self, json: &Value) -> Result<Schema> {
        let saved = self.names.space().map(str::to_string);
        let result = self.parse_node(json);
        self.names.set_space(saved);
        result
    }

    fn parse_node(&mut self, json: &Value) -> Result<Schema> {
        match json {
            Value::String(name) => self
                .names
                .get(name)
                .ok_or_else(|| AvroError::schema(format!("Undefined name: \"{name}\""))),
            Value::Array(branches) => {
                let types = branches
                    .iter()
                    .map(|branch| self.parse_node(branch))
                    .collect::<Result<Vec<_>>>()?;
                Schema::union(types)
            }
            Value::Object(object) => self.parse_object(object),
            other => Err(AvroError::schema(format!("Schema not yet supported: {other}"))),
        }
    }

    fn parse_object(&mut self, object: &Map<String, Value>) -> Result<Schema> {
        let ty = required_text(object, "type", "No type")?;
        let saved_space = self.names.space().map(str::to_string);
        let named = matches!(ty, "record" | "error" | "enum" | "fixed");
        let mut name = None;
        let mut doc = None;
        if named {
            let space = match object.get("namespace") {
                Some(Value::String(space)) => Some(space.clone()),
                Some(_) => return Err(AvroError::schema("namespace must be a string")),
                None => saved_space.clone(),
            };
            let simple = required_text(object, "name", "No name in schema")?;
            let parsed = Name::new(simple, space.as_deref())?;
            self.names.set_space(parsed.namespace().map(str::to_string));
            doc = optional_text(object, "doc");
            name = Some(parsed);
        }

        let result = match (ty, name) {
            (_, None) if SchemaType::primitive(ty).is_some() => {
                self.primitive_with_props(ty, object)
            }
            ("record" | "error", Some(name)) => self.parse_record(object, name, doc, ty == "error"),
            ("enum", Some(name)) => self.parse_enum(object, name, doc),
            ("fixed", Some(name)) => self.parse_fixed(object, name, doc),
            ("array", None) => {
                let items = object
                    .get("items")
                    .ok_or_else(|| AvroError::schema("Array has no items type"))?;
                let schema = Schema::array(self.parse_node(items)?);
                copy_props(object, SCHEMA_RESERVED, |k, v| schema.add_prop(k, v))?;
                Ok(schema)
            }
            ("map", None) => {
                let values = object
                    .get("values")
                    .ok_or_else(|| AvroError::schema("Map has no values type"))?;
                let schema = Schema::map(self.parse_node(values)?);
                copy_props(object, SCHEMA_RESERVED, |k, v| schema.add_prop(k, v))?;
                Ok(schema)
            }
            _ => self
                .names
                .get(ty)
                .filter(|s| s.name().is_some())
                .ok_or_else(|| AvroError::schema(format!("Type not supported: {ty}"))),
        };
        self.names.set_space(saved_space);
        result
    }

    fn primitive_with_props(&self, ty: &str, object: &Map<String, Value>) -> Result<Schema> {
        let schema = self
            .names
            .get(ty)
            .ok_or_else(|| AvroError::schema(format!("Type not supported: {ty}")))?;
        copy_props(object, SCHEMA_RESERVED, |k, v| schema.add_prop(k, v))?;
        Ok(schema)
    }

    fn parse_record(
        &mut self,
        object: &Map<String, Value>,
        name: Name,
        doc: Option<String>,
        is_error: bool,
    ) -> Result<Schema> {
        let record = Schema::record(name.clone(), doc, is_error)?;
        // Registered before the fields so they can refer back to it.
        self.names.add(&record)?;
        let field_nodes = object
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| AvroError::schema(format!("Record has no fields: {name}")))?;
        let mut fields = Vec::with_capacity(field_nodes.len());
        for node in field_nodes {
            fields.push(self.parse_field(node, &name)?);
        }
        record.set_fields(fields)?;
        copy_props(object, SCHEMA_RESERVED, |k, v| record.add_prop(k, v))?;
        add_aliases(&record, object, &name)?;
        Ok(record)
    }

    fn parse_field(&mut self, node: &Value, record: &Name) -> Result<Field> {
        let object = node
            .as_object()
            .ok_or_else(|| AvroError::schema(format!("Field is not an object: {node}")))?;
        let field_name = required_text(object, "name", "No field name")?;
        let type_node = object
            .get("type")
            .ok_or_else(|| AvroError::schema(format!("No field type: {field_name}")))?;
        let schema = self.parse_node(type_node)?;
        let order = match object.get("order") {
            Some(Value::String(order)) => Order::parse(order)?,
            Some(other) => return Err(AvroError::schema(format!("Illegal field order: {other}"))),
            None => Order::Ascending,
        };
        let doc = optional_text(object, "doc");
        let default = object.get("default").cloned();
        let mut field = if self.validate_defaults {
            Field::new(field_name, schema, doc, default, order)
        } else {
            Field::new_unchecked(field_name, schema, doc, default, order)
        }
        .map_err(|e| match e {
            AvroError::SchemaParse(msg) => AvroError::schema(format!("{msg} (in {record})")),
            other => other,
        })?;
        if let Some(aliases) = object.get("aliases") {
            for alias in text_array(aliases, "aliases")? {
                field = field.with_alias(alias)?;
            }
        }
        copy_props(object, FIELD_RESERVED, |k, v| field.add_prop(k, v))?;
        Ok(field)
    }

    fn parse_enum(
        &mut self,
        object: &Map<String, Value>,
        name: Name,
        doc: Option<String>,
    ) -> Result<Schema> {
        let symbols = object
            .get("symbols")
            .ok_or_else(|| AvroError::schema(format!("Enum has no symbols: {name}")))?;
        let symbols = text_array(symbols, "symbols")?
            .into_iter()
            .map(str::to_string)
            .collect();
        let default = match object.get("default") {
            Some(Value::String(symbol)) => Some(symbol.clone()),
            Some(other) => {
                return Err(AvroError::schema(format!("Enum default must be a string: {other}")))
            }
            None => None,
        };
        let schema = Schema::enumeration(name.clone(), doc, symbols, default)?;
        self.names.add(&schema)?;
        copy_props(object, ENUM_RESERVED, |k, v| schema.add_prop(k, v))?;
        add_aliases(&schema, object, &name)?;
        Ok(schema)
    }

    fn parse_fixed(
        &mut self,
        object: &Map<String, Value>,
        name: Name,
        doc: Option<String>,
    ) -> Result<Schema> {
        let size = object
            .get("size")
            .and_then(Value::as_i64)
            .ok_or_else(|| AvroError::schema(format!("Invalid or no size: {name}")))?;
        let size = usize::try_from(size)
            .map_err(|_| AvroError::schema(format!("Invalid fixed size {size}: {name}")))?;
        let schema = Schema::fixed(name.clone(), doc, size)?;
        self.names.add(&schema)?;
        copy_props(object, SCHEMA_RESERVED, |k, v| schema.add_prop(k, v))?;
        add_aliases(&schema, object, &name)?;
        Ok(schema)
    }
}

impl Schema {
    /// Parses a standalone schema.
    pub fn parse_str(text: &str) -> Result<Schema> {
        SchemaParser::new().parse(text)
    }
}

fn required_text<'a>(object: &'a Map<String, Value>, key: &str, missing: &str) -> Result<&'a str> {
    match object.get(key) {
        Some(Value::String(text)) => Ok(text),
        _ => Err(AvroError::schema(format!(
            "{missing}: {}",
            Value::Object(object.clone())
        ))),
    }
}

fn optional_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn text_array<'a>(node: &'a Value, what: &str) -> Result<Vec<&'a str>> {
    let items = node
        .as_array()
        .ok_or_else(|| AvroError::schema(format!("{what} not an array: {node}")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| AvroError::schema(format!("{what} contains a non-string: {item}")))
        })
        .collect()
}

fn copy_props(
    object: &Map<String, Value>,
    reserved: &[&str],
    mut add: impl FnMut(&str, Value) -> Result<()>,
) -> Result<()> {
    for (key, value) in object {
        if !reserved.contains(&key.as_str()) {
            add(key, value.clone())?;
        }
    }
    Ok(())
}

fn add_aliases(schema: &Schema, object: &Map<String, Value>, name: &Name) -> Result<()> {
    if let Some(aliases) = object.get("aliases") {
        for alias in text_array(aliases, "aliases")? {
            schema.add_alias(alias, name.namespace())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaKind;

    fn parse(text: &str) -> Result<Schema> {
        Schema::parse_str(text)
    }

    #[test]
    fn parses_primitives_in_both_spellings() {
        assert_eq!(parse(r#""int""#).unwrap(), Schema::int());
        assert_eq!(parse(r#"{"type":"boolean"}"#).unwrap(), Schema::boolean());
    }

    #[test]
    fn record_names_are_validated() {
        for name in ["_foo3", "Foo", "a_b"] {
            let text = format!(r#"{{"type":"record","name":"{name}","fields":[]}}"#);
            assert!(parse(&text).is_ok(), "{name}");
        }
        for name in [r#""3abc""#, r#""""#, "null", r#""null""#] {
            let text = format!(r#"{{"type":"record","name":{name},"fields":[]}}"#);
            assert!(
                matches!(parse(&text), Err(AvroError::SchemaParse(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn undefined_names_fail() {
        let err = parse(r#"{"type":"array","items":"Missing"}"#).unwrap_err();
        assert!(err.to_string().contains("Undefined name"));
    }

    #[test]
    fn duplicate_named_types_fail() {
        let text = r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":{"type":"fixed","name":"F","size":1}},
            {"name":"b","type":{"type":"fixed","name":"F","size":2}}
        ]}"#;
        assert!(parse(text).unwrap_err().to_string().contains("Can't redefine"));
    }

    #[test]
    fn nested_union_fails() {
        assert!(parse(r#"["null", ["int", "string"]]"#).is_err());
    }

    #[test]
    fn fixed_size_must_be_non_negative() {
        assert!(parse(r#"{"type":"fixed","name":"F","size":-1}"#).is_err());
        assert!(parse(r#"{"type":"fixed","name":"F"}"#).is_err());
        assert_eq!(parse(r#"{"type":"fixed","name":"F","size":0}"#).unwrap().fixed_size(), Some(0));
    }

    #[test]
    fn invalid_defaults_fail_unless_disabled() {
        let text = r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int","default":"x"}]}"#;
        assert!(parse(text).is_err());
        assert!(SchemaParser::new().with_validate_defaults(false).parse(text).is_ok());
    }

    #[test]
    fn unknown_keys_become_properties() {
        let schema = parse(
            r#"{"type":"record","name":"R","owner":"team","fields":[{"name":"a","type":"long","unit":"ms"}]}"#,
        )
        .unwrap();
        assert_eq!(schema.get_prop("owner").unwrap(), "team");
        assert_eq!(schema.fields().unwrap()[0].props().get_str("unit").as_deref(), Some("ms"));
        let mapped = parse(r#"{"type":"map","values":"int","java-class":"X"}"#).unwrap();
        assert_eq!(mapped.get_prop("java-class").unwrap(), "X");
    }

    #[test]
    fn self_reference_and_namespaces() {
        let schema = parse(
            r#"{"type":"record","name":"Tree","namespace":"org.x","fields":[
                {"name":"children","type":{"type":"array","items":"Tree"}},
                {"name":"parent","type":["null","org.x.Tree"]}
            ]}"#,
        )
        .unwrap();
        let items = schema.fields().unwrap()[0].schema().element_type().unwrap().clone();
        assert!(Schema::ptr_eq(&items, &schema));
        assert_eq!(schema.full_name(), "org.x.Tree");
    }

    #[test]
    fn empty_namespace_clears_the_enclosing_one() {
        let schema = parse(
            r#"{"type":"record","name":"Outer","namespace":"a.b","fields":[
                {"name":"mid","type":{"type":"record","name":"Mid","namespace":"","fields":[
                    {"name":"leaf","type":{"type":"fixed","name":"Leaf","size":2}}]}},
                {"name":"again","type":"Leaf"}]}"#,
        )
        .unwrap();
        let mid = schema.field("mid").unwrap().schema().clone();
        assert_eq!(mid.full_name(), "Mid");
        assert_eq!(mid.field("leaf").unwrap().schema().full_name(), "Leaf");
        assert_eq!(parse(&schema.to_string()).unwrap(), schema);
    }

    #[test]
    fn parser_keeps_names_between_calls() {
        let mut parser = SchemaParser::new();
        parser.parse(r#"{"type":"enum","name":"Suit","symbols":["HEARTS","SPADES"]}"#).unwrap();
        let card = parser
            .parse(r#"{"type":"record","name":"Card","fields":[{"name":"suit","type":"Suit"}]}"#)
            .unwrap();
        assert!(matches!(card.fields().unwrap()[0].schema().kind(), SchemaKind::Enum(_)));
        assert_eq!(parser.names().types().count(), 2);
    }

    #[test]
    fn type_may_name_a_defined_type() {
        let schema = parse(
            r#"{"type":"record","name":"N","fields":[{"name":"self","type":["null",{"type":"N"}]}]}"#,
        )
        .unwrap();
        let branch = &schema.fields().unwrap()[0].schema().types().unwrap()[1];
        assert!(Schema::ptr_eq(branch, &schema));
    }

    #[test]
    fn enum_default_and_aliases() {
        let schema = parse(
            r#"{"type":"enum","name":"E","namespace":"n","symbols":["A","B"],"default":"A","aliases":["Old","m.Older"]}"#,
        )
        .unwrap();
        assert_eq!(schema.enum_default(), Some("A"));
        let aliases: Vec<_> = schema.aliases().iter().map(|a| a.full_name().to_string()).collect();
        assert_eq!(aliases, ["n.Old", "m.Older"]);
        assert!(parse(r#"{"type":"enum","name":"E","symbols":["A"],"default":"Z"}"#).is_err());
        assert!(parse(r#"{"type":"enum","name":"E","symbols":["A","A"]}"#).is_err());
    }
}
