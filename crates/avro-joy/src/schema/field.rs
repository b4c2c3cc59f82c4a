//! Record fields.

use std::fmt;

use indexmap::IndexSet;
use serde_json::Value;

use super::{defaults, validate_name, Schema};
use crate::error::{AvroError, Result};
use crate::props::{PropertyBag, FIELD_RESERVED};

/// Sort order of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
    Ignore,
}

impl Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Order::Ascending => "ascending",
            Order::Descending => "descending",
            Order::Ignore => "ignore",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "ascending" => Ok(Order::Ascending),
            "descending" => Ok(Order::Descending),
            "ignore" => Ok(Order::Ignore),
            other => Err(AvroError::schema(format!("Illegal field order: {other}"))),
        }
    }
}

/// A field of a record schema.
///
/// The position is assigned once, when the field list of the owning record
/// is set. A positioned field cannot be attached to another record.
#[derive(Clone)]
pub struct Field {
    name: String,
    position: Option<usize>,
    schema: Schema,
    doc: Option<String>,
    default: Option<Value>,
    order: Order,
    aliases: IndexSet<String>,
    props: PropertyBag,
}

impl Field {
    /// Creates a field, validating its name and default.
    pub fn new(
        name: &str,
        schema: Schema,
        doc: Option<String>,
        default: Option<Value>,
        order: Order,
    ) -> Result<Self> {
        let field = Self::new_unchecked(name, schema, doc, default, order)?;
        if let Some(default) = &field.default {
            if !defaults::is_valid_default(&field.schema, default) {
                return Err(AvroError::schema(format!(
                    "Invalid default for field {}: {} not a {}",
                    field.name, default, field.schema
                )));
            }
        }
        Ok(field)
    }

    /// Creates a field without checking the default value.
    pub(crate) fn new_unchecked(
        name: &str,
        schema: Schema,
        doc: Option<String>,
        default: Option<Value>,
        order: Order,
    ) -> Result<Self> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            position: None,
            schema,
            doc,
            default,
            order,
            aliases: IndexSet::new(),
            props: PropertyBag::new(FIELD_RESERVED),
        })
    }

    /// Adds an alternative name for this field.
    pub fn with_alias(mut self, alias: &str) -> Result<Self> {
        validate_name(alias)?;
        self.aliases.insert(alias.to_string());
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position inside the owning record, once attached.
    pub fn pos(&self) -> Option<usize> {
        self.position
    }

    pub(crate) fn attach(&mut self, position: usize) -> Result<()> {
        if self.position.is_some() {
            return Err(AvroError::schema(format!("Field already used: {}", self.name)));
        }
        self.position = Some(position);
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }

    pub fn props(&self) -> &PropertyBag {
        &self.props
    }

    pub fn add_prop(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.props.add(key, value)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} type:{} pos:{:?}", self.name, self.schema.schema_type(), self.position)
    }
}
