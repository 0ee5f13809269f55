use std::sync::Arc;
use super::{Mapper, wrong_domain_value};
use crate::core::{DomainValue, Result, Value, ValueType};

/// Applies an element mapper to every item of a list.
#[derive(Clone)]
pub struct ListMapper {
    element: Arc<dyn Mapper>,
}

impl ListMapper {
    pub fn new(element: Arc<dyn Mapper>) -> Self {
        Self { element }
    }
}

impl Mapper for ListMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::List(items) => items
                .into_iter()
                .map(|item| self.element.to_store(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match value {
            Value::Null => Ok(DomainValue::Null),
            Value::List(items) => items
                .iter()
                .map(|item| self.element.to_domain(item))
                .collect::<Result<Vec<_>>>()
                .map(DomainValue::List),
            other => Err(other.mismatch(ValueType::List)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::FloatMapper;

    #[test]
    fn test_element_errors_propagate() {
        let mapper = ListMapper::new(Arc::new(FloatMapper));
        let stored = mapper
            .to_store(DomainValue::List(vec![DomainValue::Float(1.0), DomainValue::Float(2.5)]))
            .unwrap();
        assert_eq!(stored, Value::List(vec![Value::Double(1.0), Value::Double(2.5)]));

        let too_big = Value::List(vec![Value::Double(1.0), Value::Double(1e300)]);
        assert!(mapper.to_domain(&too_big).is_err());
    }
}
