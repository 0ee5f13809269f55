use super::{Mapper, wrong_domain_value};
use crate::core::{DomainValue, Result, Value, ValueType};

#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanMapper;

impl Mapper for BooleanMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::Bool(b) => Ok(Value::Boolean(b)),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match value {
            Value::Null => Ok(DomainValue::Null),
            Value::Boolean(b) => Ok(DomainValue::Bool(*b)),
            other => Err(other.mismatch(ValueType::Boolean)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let mapper = BooleanMapper;
        assert_eq!(mapper.to_store(DomainValue::Bool(true)).unwrap(), Value::Boolean(true));
        assert!(matches!(mapper.to_domain(&Value::Boolean(false)).unwrap(), DomainValue::Bool(false)));
        assert!(mapper.to_store(DomainValue::Null).unwrap().is_null());
        assert!(mapper.to_domain(&Value::Long(1)).is_err());
    }
}
