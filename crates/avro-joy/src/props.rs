//! Append-only JSON property bags attached to schemas and fields.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{AvroError, Result};

/// Keys interpreted by the schema language itself on schema nodes.
pub const SCHEMA_RESERVED: &[&str] = &[
    "doc", "fields", "items", "name", "namespace", "size", "symbols", "values", "type", "aliases",
];

/// Enums additionally reserve `default`.
pub const ENUM_RESERVED: &[&str] = &[
    "doc", "fields", "items", "name", "namespace", "size", "symbols", "values", "type", "aliases",
    "default",
];

/// Keys interpreted by the schema language on record fields.
pub const FIELD_RESERVED: &[&str] = &["default", "doc", "name", "order", "type", "aliases"];

/// Ordered key → JSON map. Entries are never removed or overwritten.
///
/// The bag is internally synchronized so a published schema can still gain
/// properties through a shared handle.
pub struct PropertyBag {
    reserved: &'static [&'static str],
    entries: RwLock<IndexMap<String, Value>>,
}

impl PropertyBag {
    pub fn new(reserved: &'static [&'static str]) -> Self {
        Self {
            reserved,
            entries: RwLock::new(IndexMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Value>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a property. Re-adding an equal value is a no-op; a different
    /// value for an existing key, or a reserved key, is rejected.
    pub fn add(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.reserved.contains(&key) {
            return Err(AvroError::schema(format!(
                "Can't set reserved property: {key}"
            )));
        }
        let value = value.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            None => {
                entries.insert(key.to_string(), value);
                Ok(())
            }
            Some(existing) if *existing == value => Ok(()),
            Some(existing) => Err(AvroError::schema(format!(
                "Can't overwrite property: {key} (current value {existing})"
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Convenience accessor for string-valued properties.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.read().get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Copies every entry of `other` into this bag.
    pub fn add_all(&self, other: &PropertyBag) -> Result<()> {
        for (key, value) in other.entries() {
            self.add(&key, value)?;
        }
        Ok(())
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> IndexMap<String, Value> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Writes the entries onto a JSON object being built.
    pub(crate) fn write_to(&self, object: &mut serde_json::Map<String, Value>) {
        for (key, value) in self.read().iter() {
            object.insert(key.clone(), value.clone());
        }
    }

    /// Order-insensitive digest, consistent with `PartialEq`.
    pub(crate) fn digest(&self) -> u64 {
        self.read().iter().fold(0u64, |acc, (key, value)| {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            hash_value(value, &mut hasher);
            acc.wrapping_add(hasher.finish())
        })
    }
}

/// Hashes a JSON value so that object member order does not matter.
fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => state.write_u8(0),
        Value::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Value::Number(n) => {
            state.write_u8(2);
            n.to_string().hash(state);
        }
        Value::String(s) => {
            state.write_u8(3);
            s.hash(state);
        }
        Value::Array(items) => {
            state.write_u8(4);
            state.write_usize(items.len());
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(members) => {
            state.write_u8(5);
            let folded = members.iter().fold(0u64, |acc, (key, member)| {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                hash_value(member, &mut hasher);
                acc.wrapping_add(hasher.finish())
            });
            state.write_u64(folded);
        }
    }
}

impl Clone for PropertyBag {
    fn clone(&self) -> Self {
        Self {
            reserved: self.reserved,
            entries: RwLock::new(self.entries()),
        }
    }
}

impl PartialEq for PropertyBag {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        *self.read() == *other.read()
    }
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.read().iter()).finish()
    }
}
