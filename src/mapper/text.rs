use uuid::Uuid;
use super::{Mapper, wrong_domain_value};
use crate::core::{DomainValue, MappingError, Result, Value, ValueType};

#[derive(Debug, Default, Clone, Copy)]
pub struct StringMapper;

impl Mapper for StringMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::Text(s) => Ok(Value::String(s)),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match value {
            Value::Null => Ok(DomainValue::Null),
            Value::String(s) => Ok(DomainValue::Text(s.clone())),
            other => Err(other.mismatch(ValueType::String)),
        }
    }
}

/// UUIDs in their hyphenated text form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidMapper;

impl Mapper for UuidMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::Uuid(u) => Ok(Value::String(u.hyphenated().to_string())),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match value {
            Value::Null => Ok(DomainValue::Null),
            Value::String(s) => Uuid::parse_str(s)
                .map(DomainValue::Uuid)
                .map_err(|e| MappingError::Conversion(format!("invalid UUID '{}': {}", s, e))),
            other => Err(other.mismatch(ValueType::String)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ByteArrayMapper;

impl Mapper for ByteArrayMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::Bytes(bytes) => Ok(Value::Blob(bytes)),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match value {
            Value::Null => Ok(DomainValue::Null),
            Value::Blob(bytes) => Ok(DomainValue::Bytes(bytes.clone())),
            other => Err(other.mismatch(ValueType::Blob)),
        }
    }
}

/// Keys referencing other entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyMapper;

impl Mapper for KeyMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::Key(key) => Ok(Value::Key(key)),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match value {
            Value::Null => Ok(DomainValue::Null),
            Value::Key(key) => Ok(DomainValue::Key(key.clone())),
            other => Err(other.mismatch(ValueType::Key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Key;

    #[test]
    fn test_uuid_text_form() {
        let id = Uuid::new_v4();
        let stored = UuidMapper.to_store(DomainValue::Uuid(id)).unwrap();
        assert_eq!(stored.as_str().map(str::len), Some(36));
        assert!(matches!(UuidMapper.to_domain(&stored).unwrap(), DomainValue::Uuid(back) if back == id));
        assert!(UuidMapper.to_domain(&Value::String("nope".into())).is_err());
    }

    #[test]
    fn test_bytes_and_keys() {
        assert_eq!(
            ByteArrayMapper.to_store(DomainValue::Bytes(vec![0xCA, 0xFE])).unwrap(),
            Value::Blob(vec![0xCA, 0xFE])
        );

        let key = Key::with_name("Contact", "a");
        assert_eq!(KeyMapper.to_store(DomainValue::Key(key.clone())).unwrap(), Value::Key(key));
        assert!(KeyMapper.to_domain(&Value::Long(1)).is_err());
    }

    #[test]
    fn test_string_rejects_other_domain_values() {
        let err = StringMapper.to_store(DomainValue::Long(1)).unwrap_err();
        assert!(err.to_string().contains("StringMapper"));
    }
}
