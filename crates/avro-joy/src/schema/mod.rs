//! Schema object model.
//!
//! A [`Schema`] is a cheap, thread-safe handle to an immutable node. Records
//! are built in two phases (create, register the name, then attach fields
//! exactly once) so that a record may refer to itself. Such recursive
//! schemas are reference cycles and live as long as the process keeps them.

mod aliases;
pub(crate) mod defaults;
mod field;
mod json;
mod name;
mod parser;

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use indexmap::IndexSet;
use serde_json::Value;

use crate::error::{AvroError, Result};
use crate::props::{PropertyBag, ENUM_RESERVED, SCHEMA_RESERVED};

pub use aliases::apply_aliases;
pub use field::{Field, Order};
pub use name::{validate_name, Name, Names};
pub use parser::SchemaParser;

/// Discriminant of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Record,
    Enum,
    Array,
    Map,
    Union,
    Fixed,
    String,
    Bytes,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Null,
}

impl SchemaType {
    pub fn name(self) -> &'static str {
        match self {
            SchemaType::Record => "record",
            SchemaType::Enum => "enum",
            SchemaType::Array => "array",
            SchemaType::Map => "map",
            SchemaType::Union => "union",
            SchemaType::Fixed => "fixed",
            SchemaType::String => "string",
            SchemaType::Bytes => "bytes",
            SchemaType::Int => "int",
            SchemaType::Long => "long",
            SchemaType::Float => "float",
            SchemaType::Double => "double",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
        }
    }

    /// Looks up a primitive type by its schema-language name.
    pub fn primitive(name: &str) -> Option<Self> {
        Some(match name {
            "string" => SchemaType::String,
            "bytes" => SchemaType::Bytes,
            "int" => SchemaType::Int,
            "long" => SchemaType::Long,
            "float" => SchemaType::Float,
            "double" => SchemaType::Double,
            "boolean" => SchemaType::Boolean,
            "null" => SchemaType::Null,
            _ => return None,
        })
    }

    pub fn is_primitive(self) -> bool {
        Self::primitive(self.name()).is_some()
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity and documentation shared by record, enum and fixed schemas.
pub struct Named {
    name: Name,
    doc: Option<String>,
    aliases: RwLock<IndexSet<Name>>,
}

impl Named {
    fn new(name: Name, doc: Option<String>) -> Result<Self> {
        if SchemaType::primitive(name.full_name()).is_some() {
            return Err(AvroError::schema(format!(
                "Schemas may not be named after primitives: {name}"
            )));
        }
        Ok(Self {
            name,
            doc,
            aliases: RwLock::new(IndexSet::new()),
        })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn aliases(&self) -> Vec<Name> {
        self.aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn add_alias(&self, alias: Name) {
        self.aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(alias);
    }
}

struct RecordFields {
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
}

pub struct RecordSchema {
    named: Named,
    is_error: bool,
    fields: OnceLock<RecordFields>,
}

impl RecordSchema {
    pub fn named(&self) -> &Named {
        &self.named
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// The field list; an error until it has been set.
    pub fn fields(&self) -> Result<&[Field]> {
        self.fields
            .get()
            .map(|f| f.fields.as_slice())
            .ok_or_else(|| AvroError::schema(format!("Schema fields not set yet: {}", self.named.name)))
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        let set = self.fields.get()?;
        set.by_name.get(name).map(|&i| &set.fields[i])
    }

    fn fields_or_empty(&self) -> &[Field] {
        self.fields.get().map(|f| f.fields.as_slice()).unwrap_or(&[])
    }
}

pub struct EnumSchema {
    named: Named,
    symbols: Vec<String>,
    ordinals: HashMap<String, usize>,
    default: Option<String>,
}

impl EnumSchema {
    pub fn named(&self) -> &Named {
        &self.named
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn ordinal(&self, symbol: &str) -> Option<usize> {
        self.ordinals.get(symbol).copied()
    }

    pub fn default_symbol(&self) -> Option<&str> {
        self.default.as_deref()
    }
}

pub struct FixedSchema {
    named: Named,
    size: usize,
}

impl FixedSchema {
    pub fn named(&self) -> &Named {
        &self.named
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

pub struct UnionSchema {
    types: Vec<Schema>,
    index_by_name: HashMap<String, usize>,
}

impl UnionSchema {
    pub fn types(&self) -> &[Schema] {
        &self.types
    }

    /// Branch index for a full name (`"int"`, `"map"`, `"ns.Rec"`, ...).
    pub fn index_of(&self, full_name: &str) -> Option<usize> {
        self.index_by_name.get(full_name).copied()
    }
}

/// Per-kind payload of a schema node.
pub enum SchemaKind {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Record(RecordSchema),
    Enum(EnumSchema),
    Array(Schema),
    Map(Schema),
    Union(UnionSchema),
    Fixed(FixedSchema),
}

/// Bumped whenever a schema gains a property or its fields. A cached hash is only valid for the
/// generation it was computed in, since a property added to a nested node
/// changes the hash of every schema that contains it.
static PROPS_GENERATION: AtomicU64 = AtomicU64::new(0);

fn invalidate_hashes() {
    PROPS_GENERATION.fetch_add(1, AtomicOrdering::AcqRel);
}

struct SchemaNode {
    kind: SchemaKind,
    props: PropertyBag,
    /// `(generation, hash)`
    hash: Mutex<Option<(u64, u64)>>,
}

/// Shared handle to a schema node.
#[derive(Clone)]
pub struct Schema(Arc<SchemaNode>);

impl Schema {
    fn from_kind(kind: SchemaKind) -> Self {
        let reserved = match kind {
            SchemaKind::Enum(_) => ENUM_RESERVED,
            _ => SCHEMA_RESERVED,
        };
        Schema(Arc::new(SchemaNode {
            kind,
            props: PropertyBag::new(reserved),
            hash: Mutex::new(None),
        }))
    }

    // ---------------------------------------------------------------- factories

    pub(crate) fn primitive(ty: SchemaType) -> Self {
        Self::from_kind(match ty {
            SchemaType::String => SchemaKind::String,
            SchemaType::Bytes => SchemaKind::Bytes,
            SchemaType::Int => SchemaKind::Int,
            SchemaType::Long => SchemaKind::Long,
            SchemaType::Float => SchemaKind::Float,
            SchemaType::Double => SchemaKind::Double,
            SchemaType::Boolean => SchemaKind::Boolean,
            _ => SchemaKind::Null,
        })
    }

    /// Creates a primitive schema; complex types have dedicated factories.
    pub fn create(ty: SchemaType) -> Result<Self> {
        if !ty.is_primitive() {
            return Err(AvroError::schema(format!("Can't create a: {ty}")));
        }
        Ok(Self::primitive(ty))
    }

    pub fn null() -> Self {
        Self::primitive(SchemaType::Null)
    }

    pub fn boolean() -> Self {
        Self::primitive(SchemaType::Boolean)
    }

    pub fn int() -> Self {
        Self::primitive(SchemaType::Int)
    }

    pub fn long() -> Self {
        Self::primitive(SchemaType::Long)
    }

    pub fn float() -> Self {
        Self::primitive(SchemaType::Float)
    }

    pub fn double() -> Self {
        Self::primitive(SchemaType::Double)
    }

    pub fn bytes() -> Self {
        Self::primitive(SchemaType::Bytes)
    }

    pub fn string() -> Self {
        Self::primitive(SchemaType::String)
    }

    /// Creates a record without fields; attach them with [`Schema::set_fields`].
    pub fn record(name: Name, doc: Option<String>, is_error: bool) -> Result<Self> {
        Ok(Self::from_kind(SchemaKind::Record(RecordSchema {
            named: Named::new(name, doc)?,
            is_error,
            fields: OnceLock::new(),
        })))
    }

    /// Creates a record and attaches `fields` in one step.
    pub fn record_with_fields(name: Name, doc: Option<String>, fields: Vec<Field>) -> Result<Self> {
        let record = Self::record(name, doc, false)?;
        record.set_fields(fields)?;
        Ok(record)
    }

    pub fn enumeration(
        name: Name,
        doc: Option<String>,
        symbols: Vec<String>,
        default: Option<String>,
    ) -> Result<Self> {
        let mut ordinals = HashMap::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            validate_name(symbol)?;
            if ordinals.insert(symbol.clone(), i).is_some() {
                return Err(AvroError::schema(format!("Duplicate enum symbol: {symbol}")));
            }
        }
        if let Some(default) = &default {
            if !ordinals.contains_key(default) {
                return Err(AvroError::schema(format!(
                    "The Enum Default: {default} is not in the enum symbol set: {symbols:?}"
                )));
            }
        }
        Ok(Self::from_kind(SchemaKind::Enum(EnumSchema {
            named: Named::new(name, doc)?,
            symbols,
            ordinals,
            default,
        })))
    }

    pub fn array(items: Schema) -> Self {
        Self::from_kind(SchemaKind::Array(items))
    }

    pub fn map(values: Schema) -> Self {
        Self::from_kind(SchemaKind::Map(values))
    }

    /// Creates a union. Branches may not be unions and their full names must
    /// be pairwise distinct.
    pub fn union(types: Vec<Schema>) -> Result<Self> {
        let mut index_by_name = HashMap::with_capacity(types.len());
        for (i, branch) in types.iter().enumerate() {
            if branch.schema_type() == SchemaType::Union {
                return Err(AvroError::schema(format!("Nested union: {branch}")));
            }
            let name = branch.full_name().to_string();
            if index_by_name.insert(name.clone(), i).is_some() {
                return Err(AvroError::schema(format!("Duplicate in union: {name}")));
            }
        }
        Ok(Self::from_kind(SchemaKind::Union(UnionSchema {
            types,
            index_by_name,
        })))
    }

    pub fn fixed(name: Name, doc: Option<String>, size: usize) -> Result<Self> {
        Ok(Self::from_kind(SchemaKind::Fixed(FixedSchema {
            named: Named::new(name, doc)?,
            size,
        })))
    }

    // ---------------------------------------------------------------- accessors

    pub fn kind(&self) -> &SchemaKind {
        &self.0.kind
    }

    pub fn schema_type(&self) -> SchemaType {
        match self.kind() {
            SchemaKind::Null => SchemaType::Null,
            SchemaKind::Boolean => SchemaType::Boolean,
            SchemaKind::Int => SchemaType::Int,
            SchemaKind::Long => SchemaType::Long,
            SchemaKind::Float => SchemaType::Float,
            SchemaKind::Double => SchemaType::Double,
            SchemaKind::Bytes => SchemaType::Bytes,
            SchemaKind::String => SchemaType::String,
            SchemaKind::Record(_) => SchemaType::Record,
            SchemaKind::Enum(_) => SchemaType::Enum,
            SchemaKind::Array(_) => SchemaType::Array,
            SchemaKind::Map(_) => SchemaType::Map,
            SchemaKind::Union(_) => SchemaType::Union,
            SchemaKind::Fixed(_) => SchemaType::Fixed,
        }
    }

    pub(crate) fn named(&self) -> Option<&Named> {
        match self.kind() {
            SchemaKind::Record(r) => Some(&r.named),
            SchemaKind::Enum(e) => Some(&e.named),
            SchemaKind::Fixed(f) => Some(&f.named),
            _ => None,
        }
    }

    /// Name of a record, enum or fixed schema.
    pub fn name(&self) -> Option<&Name> {
        self.named().map(Named::name)
    }

    /// Full name for named types, the type name otherwise. This is the key
    /// used for union branches.
    pub fn full_name(&self) -> &str {
        match self.named() {
            Some(named) => named.name.full_name(),
            None => self.schema_type().name(),
        }
    }

    pub fn doc(&self) -> Option<&str> {
        self.named().and_then(Named::doc)
    }

    pub fn aliases(&self) -> Vec<Name> {
        self.named().map(Named::aliases).unwrap_or_default()
    }

    /// Adds an alias to a named schema. A bare alias inherits `space`, or
    /// the schema's own namespace when `space` is `None`.
    pub fn add_alias(&self, alias: &str, space: Option<&str>) -> Result<()> {
        let named = self
            .named()
            .ok_or_else(|| AvroError::schema(format!("Not a named type: {self}")))?;
        let space = space.or(named.name.namespace());
        named.add_alias(Name::new(alias, space)?);
        Ok(())
    }

    pub fn as_record(&self) -> Option<&RecordSchema> {
        match self.kind() {
            SchemaKind::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumSchema> {
        match self.kind() {
            SchemaKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&UnionSchema> {
        match self.kind() {
            SchemaKind::Union(u) => Some(u),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.as_record().is_some_and(RecordSchema::is_error)
    }

    pub fn fields(&self) -> Result<&[Field]> {
        self.as_record()
            .ok_or_else(|| AvroError::schema(format!("Not a record: {self}")))?
            .fields()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.as_record()?.field(name)
    }

    /// Attaches the field list of a record. Allowed once; assigns positions
    /// and rejects duplicate names.
    pub fn set_fields(&self, fields: Vec<Field>) -> Result<()> {
        let record = self
            .as_record()
            .ok_or_else(|| AvroError::schema(format!("Not a record: {self}")))?;
        if record.fields.get().is_some() {
            return Err(AvroError::schema("Fields are already set"));
        }
        let mut fields = fields;
        let mut by_name = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter_mut().enumerate() {
            field.attach(i)?;
            if by_name.insert(field.name().to_string(), i).is_some() {
                return Err(AvroError::schema(format!(
                    "Duplicate field {} in record {}",
                    field.name(),
                    record.named.name
                )));
            }
        }
        record
            .fields
            .set(RecordFields { fields, by_name })
            .map_err(|_| AvroError::schema("Fields are already set"))?;
        invalidate_hashes();
        Ok(())
    }

    pub fn enum_symbols(&self) -> Option<&[String]> {
        self.as_enum().map(EnumSchema::symbols)
    }

    pub fn enum_ordinal(&self, symbol: &str) -> Option<usize> {
        self.as_enum()?.ordinal(symbol)
    }

    pub fn enum_default(&self) -> Option<&str> {
        self.as_enum()?.default_symbol()
    }

    pub fn types(&self) -> Option<&[Schema]> {
        self.as_union().map(UnionSchema::types)
    }

    pub fn index_of_branch(&self, full_name: &str) -> Option<usize> {
        self.as_union()?.index_of(full_name)
    }

    pub fn element_type(&self) -> Option<&Schema> {
        match self.kind() {
            SchemaKind::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn value_type(&self) -> Option<&Schema> {
        match self.kind() {
            SchemaKind::Map(values) => Some(values),
            _ => None,
        }
    }

    pub fn fixed_size(&self) -> Option<usize> {
        match self.kind() {
            SchemaKind::Fixed(f) => Some(f.size),
            _ => None,
        }
    }

    /// `true` for `null` and for unions with a `null` branch.
    pub fn is_nullable(&self) -> bool {
        match self.kind() {
            SchemaKind::Null => true,
            SchemaKind::Union(u) => u.types.iter().any(Schema::is_nullable),
            _ => false,
        }
    }

    // ---------------------------------------------------------------- props

    pub fn props(&self) -> &PropertyBag {
        &self.0.props
    }

    pub fn get_prop(&self, key: &str) -> Option<Value> {
        self.0.props.get(key)
    }

    /// Adds a property. Cached hashes of this schema and of every schema
    /// containing it are dropped.
    pub fn add_prop(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.0.props.add(key, value)?;
        invalidate_hashes();
        Ok(())
    }

    // ---------------------------------------------------------------- identity

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// `true` if both handles point at the same node.
    pub fn ptr_eq(a: &Schema, b: &Schema) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Structural hash, cached until a property is added anywhere.
    pub fn hash_code(&self) -> u64 {
        let generation = PROPS_GENERATION.load(AtomicOrdering::Acquire);
        let mut cache = self.0.hash.lock().unwrap_or_else(PoisonError::into_inner);
        match *cache {
            Some((cached_at, hash)) if cached_at == generation => hash,
            _ => {
                let hash = self.compute_hash(&mut HashSet::new());
                *cache = Some((generation, hash));
                hash
            }
        }
    }

    fn compute_hash(&self, seen: &mut HashSet<usize>) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.schema_type().hash(&mut hasher);
        self.0.props.digest().hash(&mut hasher);
        if let Some(name) = self.name() {
            name.full_name().hash(&mut hasher);
        }
        match self.kind() {
            SchemaKind::Record(record) => {
                if !seen.insert(self.id()) {
                    return 0;
                }
                for field in record.fields_or_empty() {
                    field.name().hash(&mut hasher);
                    field.schema().compute_hash(seen).hash(&mut hasher);
                }
            }
            SchemaKind::Enum(e) => e.symbols.hash(&mut hasher),
            SchemaKind::Fixed(f) => f.size.hash(&mut hasher),
            SchemaKind::Array(inner) | SchemaKind::Map(inner) => {
                inner.compute_hash(seen).hash(&mut hasher)
            }
            SchemaKind::Union(u) => {
                for branch in &u.types {
                    branch.compute_hash(seen).hash(&mut hasher);
                }
            }
            _ => {}
        }
        hasher.finish()
    }

    fn equals(&self, other: &Schema, seen: &mut HashSet<(usize, usize)>) -> bool {
        if Schema::ptr_eq(self, other) {
            return true;
        }
        if self.schema_type() != other.schema_type() || self.0.props != other.0.props {
            return false;
        }
        match (self.kind(), other.kind()) {
            (SchemaKind::Record(a), SchemaKind::Record(b)) => {
                if !seen.insert((self.id(), other.id())) {
                    return true;
                }
                let (fa, fb) = (a.fields_or_empty(), b.fields_or_empty());
                a.named.name == b.named.name
                    && a.is_error == b.is_error
                    && fa.len() == fb.len()
                    && fa.iter().zip(fb).all(|(x, y)| field_equals(x, y, seen))
            }
            (SchemaKind::Enum(a), SchemaKind::Enum(b)) => {
                a.named.name == b.named.name && a.symbols == b.symbols && a.default == b.default
            }
            (SchemaKind::Fixed(a), SchemaKind::Fixed(b)) => {
                a.named.name == b.named.name && a.size == b.size
            }
            (SchemaKind::Array(a), SchemaKind::Array(b)) | (SchemaKind::Map(a), SchemaKind::Map(b)) => {
                a.equals(b, seen)
            }
            (SchemaKind::Union(a), SchemaKind::Union(b)) => {
                a.types.len() == b.types.len()
                    && a.types.iter().zip(&b.types).all(|(x, y)| x.equals(y, seen))
            }
            _ => true,
        }
    }
}

fn field_equals(a: &Field, b: &Field, seen: &mut HashSet<(usize, usize)>) -> bool {
    a.name() == b.name()
        && a.order() == b.order()
        && default_equals(a.default_value(), b.default_value())
        && a.props() == b.props()
        && a.schema().equals(b.schema(), seen)
}

fn default_equals(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        // `1` and `1.0` are the same default.
        (Some(Value::Number(x)), Some(Value::Number(y))) if !(x.is_i64() && y.is_i64()) => {
            x.as_f64() == y.as_f64()
        }
        _ => a == b,
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &mut HashSet::new())
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json().to_string())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema({self})")
    }
}
