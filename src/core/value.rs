use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::{Key, MappingError, NativeEntity};

/// A property value as held by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Blob(Vec<u8>),
    Key(Key),
    Entity(NativeEntity),
    List(Vec<Value>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Long(_) => ValueType::Long,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Timestamp(_) => ValueType::Timestamp,
            Self::Blob(_) => ValueType::Blob,
            Self::Key(_) => ValueType::Key,
            Self::Entity(_) => ValueType::Entity,
            Self::List(_) => ValueType::List,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Long(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            Self::Long(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&NativeEntity> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Builds the mismatch error used by mappers and record accessors.
    pub(crate) fn mismatch(&self, expected: ValueType) -> MappingError {
        MappingError::Conversion(format!(
            "expected a {} store value, found {}",
            expected,
            self.type_name()
        ))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Long(i) => write!(f, "{}", i),
            Self::Double(fl) => {
                if fl.is_nan() {
                    write!(f, "NaN")
                } else if fl.is_infinite() {
                    if *fl > 0.0 {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else {
                    write!(f, "{}", fl)
                }
            }
            Self::String(s) => write!(f, "{}", s),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Key(key) => write!(f, "{}", key),
            Self::Entity(entity) => write!(f, "{{{} properties}}", entity.len()),
            Self::List(items) => write!(f, "[{} items]", items.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Long(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<NativeEntity> for Value {
    fn from(entity: NativeEntity) -> Self {
        Self::Entity(entity)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        Self::Key(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Null,
    Boolean,
    Long,
    Double,
    String,
    Timestamp,
    Blob,
    Key,
    Entity,
    List,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean => "BOOLEAN",
            Self::Long => "LONG",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
            Self::Timestamp => "TIMESTAMP",
            Self::Blob => "BLOB",
            Self::Key => "KEY",
            Self::Entity => "ENTITY",
            Self::List => "LIST",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Long(42).value_type(), ValueType::Long);
        assert_eq!(Value::from("zip").type_name(), "STRING");
        assert!(Value::Null.is_null());
        assert_eq!(Value::Long(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_mismatch_reports_both_sides() {
        let err = Value::Boolean(true).mismatch(ValueType::Timestamp);
        let message = err.to_string();
        assert!(message.contains("TIMESTAMP"));
        assert!(message.contains("BOOLEAN"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Double(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Blob(vec![1, 2]).to_string(), "<2 bytes>");
    }
}
