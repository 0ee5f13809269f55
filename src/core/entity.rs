//! The store-side record model: keys and native entities.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::{MappingError, Result, Value, ValueType};

/// Identifier part of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyId {
    Id(i64),
    Name(String),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// Store key of an entity: kind, optional identifier and optional parent.
///
/// A key without an identifier is incomplete; the store allocates one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    kind: String,
    id: Option<KeyId>,
    parent: Option<Box<Key>>,
}

impl Key {
    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            parent: None,
        }
    }

    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id: Some(KeyId::Id(id)),
            parent: None,
        }
    }

    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: Some(KeyId::Name(name.into())),
            parent: None,
        }
    }

    pub fn parent_key(mut self, parent: Key) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key_id(&self) -> Option<&KeyId> {
        self.id.as_ref()
    }

    pub fn id(&self) -> Option<i64> {
        match self.id {
            Some(KeyId::Id(id)) => Some(id),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.id {
            Some(KeyId::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.id.is_some()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{}/", parent)?;
        }
        match &self.id {
            Some(id) => write!(f, "{}({})", self.kind, id),
            None => write!(f, "{}(?)", self.kind),
        }
    }
}

/// Schemaless record exchanged with the document store.
///
/// Top-level records carry a key; nested records (stored as
/// [`Value::Entity`]) do not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<Key>,
    properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    unindexed: BTreeSet<String>,
}

impl NativeEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    /// Sets an indexed property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        self.unindexed.remove(&name);
        self.properties.insert(name, value.into());
        self
    }

    /// Sets a property that the store must not index.
    pub fn set_unindexed(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        self.properties.insert(name.clone(), value.into());
        self.unindexed.insert(name);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.unindexed.remove(name);
        self.properties.remove(name)
    }

    pub fn is_indexed(&self, name: &str) -> bool {
        self.contains(name) && !self.unindexed.contains(name)
    }

    /// `true` when the property is absent or explicitly null.
    pub fn is_null(&self, name: &str) -> bool {
        self.get(name).map(Value::is_null).unwrap_or(true)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn wrong_type(&self, name: &str, expected: ValueType) -> MappingError {
        match self.properties.get(name) {
            None => MappingError::TypeMismatch(format!("property '{}' is not set", name)),
            Some(value) => MappingError::TypeMismatch(format!(
                "property '{}' holds {}, not {}",
                name,
                value.type_name(),
                expected
            )),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<&str> {
        match self.properties.get(name) {
            Some(Value::String(s)) => Ok(s),
            _ => Err(self.wrong_type(name, ValueType::String)),
        }
    }

    pub fn get_long(&self, name: &str) -> Result<i64> {
        match self.properties.get(name) {
            Some(Value::Long(i)) => Ok(*i),
            _ => Err(self.wrong_type(name, ValueType::Long)),
        }
    }

    pub fn get_double(&self, name: &str) -> Result<f64> {
        match self.properties.get(name) {
            Some(Value::Double(f)) => Ok(*f),
            _ => Err(self.wrong_type(name, ValueType::Double)),
        }
    }

    pub fn get_boolean(&self, name: &str) -> Result<bool> {
        match self.properties.get(name) {
            Some(Value::Boolean(b)) => Ok(*b),
            _ => Err(self.wrong_type(name, ValueType::Boolean)),
        }
    }

    pub fn get_timestamp(&self, name: &str) -> Result<DateTime<Utc>> {
        match self.properties.get(name) {
            Some(Value::Timestamp(ts)) => Ok(*ts),
            _ => Err(self.wrong_type(name, ValueType::Timestamp)),
        }
    }

    pub fn get_blob(&self, name: &str) -> Result<&[u8]> {
        match self.properties.get(name) {
            Some(Value::Blob(bytes)) => Ok(bytes),
            _ => Err(self.wrong_type(name, ValueType::Blob)),
        }
    }

    pub fn get_key(&self, name: &str) -> Result<&Key> {
        match self.properties.get(name) {
            Some(Value::Key(key)) => Ok(key),
            _ => Err(self.wrong_type(name, ValueType::Key)),
        }
    }

    pub fn get_entity(&self, name: &str) -> Result<&NativeEntity> {
        match self.properties.get(name) {
            Some(Value::Entity(entity)) => Ok(entity),
            _ => Err(self.wrong_type(name, ValueType::Entity)),
        }
    }

    pub fn get_list(&self, name: &str) -> Result<&[Value]> {
        match self.properties.get(name) {
            Some(Value::List(items)) => Ok(items),
            _ => Err(self.wrong_type(name, ValueType::List)),
        }
    }

    /// Renders the record as JSON, the form used to pin stored layouts.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| MappingError::Conversion(format!("cannot render entity as JSON: {}", e)))
    }
}
