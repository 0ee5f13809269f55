use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use lazy_static::lazy_static;
use log::debug;
use super::*;
use crate::core::{DeclaredType, DomainType};

lazy_static! {
    static ref BUILTIN_MAPPERS: HashMap<DeclaredType, Arc<dyn Mapper>> = {
        let mut table: HashMap<DeclaredType, Arc<dyn Mapper>> = HashMap::new();
        table.insert(DeclaredType::Bool, Arc::new(BooleanMapper));
        table.insert(DeclaredType::Short, Arc::new(IntegerMapper::new(IntegerWidth::I16)));
        table.insert(DeclaredType::Int, Arc::new(IntegerMapper::new(IntegerWidth::I32)));
        table.insert(DeclaredType::Long, Arc::new(IntegerMapper::new(IntegerWidth::I64)));
        table.insert(DeclaredType::Float, Arc::new(FloatMapper));
        table.insert(DeclaredType::Double, Arc::new(DoubleMapper));
        table.insert(DeclaredType::Text, Arc::new(StringMapper));
        table.insert(DeclaredType::Decimal, Arc::new(BigDecimalMapper));
        table.insert(DeclaredType::OffsetDateTime, Arc::new(OffsetDateTimeMapper));
        table.insert(DeclaredType::ZonedDateTime, Arc::new(ZonedDateTimeMapper));
        table.insert(DeclaredType::LocalDate, Arc::new(LocalDateMapper));
        table.insert(DeclaredType::LocalDateTime, Arc::new(LocalDateTimeMapper));
        table.insert(DeclaredType::LocalTime, Arc::new(LocalTimeMapper));
        table.insert(DeclaredType::Uuid, Arc::new(UuidMapper));
        table.insert(DeclaredType::Bytes, Arc::new(ByteArrayMapper));
        table.insert(DeclaredType::Key, Arc::new(KeyMapper));
        table
    };
}

/// Resolves the mapper for a declared type.
///
/// Overrides registered here take precedence over the built-in table; both
/// lose to a mapper declared on the field itself.
#[derive(Default)]
pub struct MapperFactory {
    overrides: RwLock<HashMap<DeclaredType, Arc<dyn Mapper>>>,
}

impl MapperFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the default mapper for a declared type.
    ///
    /// Only affects classes introspected afterwards.
    pub fn register(&self, declared: DeclaredType, mapper: Arc<dyn Mapper>) -> Result<()> {
        debug!("Registering {} for type {}", mapper.name(), declared);
        self.overrides.write()?.insert(declared, mapper);
        Ok(())
    }

    pub fn register_for<T: DomainType>(&self, mapper: impl Mapper + 'static) -> Result<()> {
        self.register(T::field_type().declared, Arc::new(mapper))
    }

    /// Returns `None` when no mapper applies.
    pub fn resolve(&self, declared: &DeclaredType) -> Result<Option<Arc<dyn Mapper>>> {
        if let Some(mapper) = self.overrides.read()?.get(declared) {
            return Ok(Some(mapper.clone()));
        }

        match declared {
            DeclaredType::List(element) => Ok(self
                .resolve(element)?
                .map(|m| Arc::new(ListMapper::new(m)) as Arc<dyn Mapper>)),
            other => Ok(BUILTIN_MAPPERS.get(other).cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DomainValue, Value};

    struct Money(i64);
    crate::custom_domain_type!(Money);

    struct MoneyMapper;

    impl Mapper for MoneyMapper {
        fn to_store(&self, value: DomainValue) -> Result<Value> {
            match value {
                DomainValue::Null => Ok(Value::Null),
                other => Ok(Value::Long(other.into_object::<Money>()?.0)),
            }
        }

        fn to_domain(&self, value: &Value) -> Result<DomainValue> {
            match value {
                Value::Long(cents) => Ok(DomainValue::object(Money(*cents))),
                _ => Ok(DomainValue::Null),
            }
        }
    }

    #[test]
    fn test_builtin_resolution() {
        let factory = MapperFactory::new();
        let mapper = factory.resolve(&DeclaredType::Float).unwrap().unwrap();
        assert_eq!(mapper.name(), "FloatMapper");

        let list = factory
            .resolve(&DeclaredType::List(Box::new(DeclaredType::Text)))
            .unwrap()
            .unwrap();
        assert_eq!(list.name(), "ListMapper");
    }

    #[test]
    fn test_custom_types_need_registration() {
        let factory = MapperFactory::new();
        let money = DeclaredType::custom::<Money>();
        assert!(factory.resolve(&money).unwrap().is_none());

        factory.register_for::<Money>(MoneyMapper).unwrap();
        let mapper = factory.resolve(&money).unwrap().unwrap();
        assert_eq!(mapper.to_store(DomainValue::object(Money(250))).unwrap(), Value::Long(250));
    }

    #[test]
    fn test_override_replaces_builtin() {
        let factory = MapperFactory::new();
        factory.register(DeclaredType::Decimal, Arc::new(DecimalMapper::new(10, 2).unwrap())).unwrap();
        let mapper = factory.resolve(&DeclaredType::Decimal).unwrap().unwrap();
        assert_eq!(mapper.name(), "DecimalMapper");
    }
}
