//! Schema names and the name table used while parsing.

use std::fmt;

use indexmap::IndexMap;

use super::{Schema, SchemaType};
use crate::error::{AvroError, Result};

/// Checks a simple (undotted) identifier against `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first = chars
        .next()
        .ok_or_else(|| AvroError::schema("Empty name"))?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(AvroError::schema(format!(
            "Illegal initial character: {name}"
        )));
    }
    if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
        return Err(AvroError::schema(format!("Illegal character in: {name}")));
    }
    Ok(())
}

/// A named-type identity: simple name, namespace and `namespace.name`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name {
    name: String,
    space: Option<String>,
    full: String,
}

impl Name {
    /// Builds a name. A dotted `name` carries its own namespace and ignores
    /// `space`; an empty namespace means "no namespace".
    pub fn new(name: &str, space: Option<&str>) -> Result<Self> {
        let (simple, space) = match name.rfind('.') {
            Some(dot) => (&name[dot + 1..], Some(&name[..dot])),
            None => (name, space),
        };
        validate_name(simple)?;
        let space = space.filter(|s| !s.is_empty());
        if let Some(space) = space {
            for part in space.split('.') {
                validate_name(part)?;
            }
        }
        let full = match space {
            Some(space) => format!("{space}.{simple}"),
            None => simple.to_string(),
        };
        Ok(Self {
            name: simple.to_string(),
            space: space.map(str::to_string),
            full,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.space.as_deref()
    }

    pub fn full_name(&self) -> &str {
        &self.full
    }

    /// The shortest spelling that resolves to this name from inside
    /// `enclosing`.
    pub fn qualified(&self, enclosing: Option<&str>) -> &str {
        if self.space.as_deref() == enclosing {
            &self.name
        } else {
            &self.full
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.full)
    }
}

/// Named types defined so far in a parse session, plus the current default
/// namespace.
#[derive(Default)]
pub struct Names {
    space: Option<String>,
    types: IndexMap<Name, Schema>,
}

impl Names {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn space(&self) -> Option<&str> {
        self.space.as_deref()
    }

    pub fn set_space(&mut self, space: Option<String>) {
        self.space = space.filter(|s| !s.is_empty());
    }

    /// Resolves a type name: primitives first, then the name in the default
    /// namespace, then the name with no namespace.
    pub fn get(&self, name: &str) -> Option<Schema> {
        if let Some(ty) = SchemaType::primitive(name) {
            return Some(Schema::primitive(ty));
        }
        let qualified = Name::new(name, self.space()).ok()?;
        if let Some(found) = self.types.get(&qualified) {
            return Some(found.clone());
        }
        let bare = Name::new(name, None).ok()?;
        self.types.get(&bare).cloned()
    }

    /// Registers a named schema. Redefining a name is an error.
    pub fn add(&mut self, schema: &Schema) -> Result<()> {
        let name = schema
            .name()
            .ok_or_else(|| AvroError::schema(format!("Not a named type: {schema}")))?;
        if self.types.contains_key(name) {
            return Err(AvroError::schema(format!("Can't redefine: {name}")));
        }
        self.types.insert(name.clone(), schema.clone());
        Ok(())
    }

    /// Named schemas in definition order.
    pub fn types(&self) -> impl Iterator<Item = &Schema> {
        self.types.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_identifiers() {
        for name in ["_foo3", "Foo", "a_b", "_"] {
            assert!(validate_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn invalid_identifiers() {
        for name in ["3abc", "", "a-b", "é", "a b"] {
            assert!(
                matches!(validate_name(name), Err(AvroError::SchemaParse(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn dotted_name_carries_namespace() {
        let name = Name::new("org.example.Point", Some("ignored")).unwrap();
        assert_eq!(name.name(), "Point");
        assert_eq!(name.namespace(), Some("org.example"));
        assert_eq!(name.full_name(), "org.example.Point");
    }

    #[test]
    fn empty_namespace_is_none() {
        let name = Name::new("Point", Some("")).unwrap();
        assert_eq!(name.namespace(), None);
        assert_eq!(name.full_name(), "Point");
        assert_eq!(name, Name::new("Point", None).unwrap());
    }

    #[test]
    fn qualified_drops_matching_namespace() {
        let name = Name::new("a.b.C", None).unwrap();
        assert_eq!(name.qualified(Some("a.b")), "C");
        assert_eq!(name.qualified(Some("x")), "a.b.C");
        assert_eq!(name.qualified(None), "a.b.C");
    }

    #[test]
    fn names_lookup_order() {
        let mut names = Names::new();
        let bare = Schema::fixed(Name::new("Id", None).unwrap(), None, 4).unwrap();
        let spaced = Schema::fixed(Name::new("ns.Id", None).unwrap(), None, 8).unwrap();
        names.add(&bare).unwrap();
        assert_eq!(names.get("Id").unwrap().fixed_size(), Some(4));
        names.set_space(Some("ns".into()));
        assert_eq!(names.get("Id").unwrap().fixed_size(), Some(4));
        names.add(&spaced).unwrap();
        assert_eq!(names.get("Id").unwrap().fixed_size(), Some(8));
        assert_eq!(names.get("int").unwrap().schema_type(), SchemaType::Int);
        assert!(names.get("Missing").is_none());
        assert!(names.add(&spaced).is_err());
    }
}
