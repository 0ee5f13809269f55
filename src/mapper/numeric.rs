use super::{Mapper, wrong_domain_value};
use crate::core::{DomainValue, MappingError, Result, Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerWidth {
    I16,
    I32,
    I64,
}

/// Maps `i16`/`i32`/`i64` to a store long. Reads are range checked.
#[derive(Debug, Clone, Copy)]
pub struct IntegerMapper {
    width: IntegerWidth,
}

impl IntegerMapper {
    pub const fn new(width: IntegerWidth) -> Self {
        Self { width }
    }

    pub fn width(&self) -> IntegerWidth {
        self.width
    }
}

impl Mapper for IntegerMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match (self.width, value) {
            (_, DomainValue::Null) => Ok(Value::Null),
            (IntegerWidth::I16, DomainValue::Short(v)) => Ok(Value::Long(v as i64)),
            (IntegerWidth::I32, DomainValue::Int(v)) => Ok(Value::Long(v as i64)),
            (IntegerWidth::I64, DomainValue::Long(v)) => Ok(Value::Long(v)),
            (_, other) => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        let raw = match value {
            Value::Null => return Ok(DomainValue::Null),
            Value::Long(v) => *v,
            other => return Err(other.mismatch(ValueType::Long)),
        };

        let out_of_range = |target: &str| {
            MappingError::Conversion(format!("{} is out of range for {}", raw, target))
        };

        match self.width {
            IntegerWidth::I16 => i16::try_from(raw)
                .map(DomainValue::Short)
                .map_err(|_| out_of_range("i16")),
            IntegerWidth::I32 => i32::try_from(raw)
                .map(DomainValue::Int)
                .map_err(|_| out_of_range("i32")),
            IntegerWidth::I64 => Ok(DomainValue::Long(raw)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DoubleMapper;

impl Mapper for DoubleMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::Double(v) => Ok(Value::Double(v)),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match value {
            Value::Null => Ok(DomainValue::Null),
            Value::Double(v) => Ok(DomainValue::Double(*v)),
            other => Err(other.mismatch(ValueType::Double)),
        }
    }
}

/// Stores an `f32` as a store double.
///
/// The stored double may exceed the `f32` range; reading such a value back is
/// a conversion error rather than a silent infinity. Stored infinities and NaN
/// are read back as the same `f32` value.
#[derive(Debug, Default, Clone, Copy)]
pub struct FloatMapper;

impl Mapper for FloatMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::Float(v) => Ok(Value::Double(v as f64)),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        let raw = match value {
            Value::Null => return Ok(DomainValue::Null),
            Value::Double(v) => *v,
            other => return Err(other.mismatch(ValueType::Double)),
        };

        if raw.is_finite() && raw.abs() > f32::MAX as f64 {
            return Err(MappingError::Conversion(format!(
                "{} is outside the range of f32",
                raw
            )));
        }
        Ok(DomainValue::Float(raw as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widths() {
        let mapper = IntegerMapper::new(IntegerWidth::I32);
        assert_eq!(mapper.to_store(DomainValue::Int(-7)).unwrap(), Value::Long(-7));
        assert!(matches!(mapper.to_domain(&Value::Long(-7)).unwrap(), DomainValue::Int(-7)));

        let err = mapper.to_domain(&Value::Long(i64::from(i32::MAX) + 1)).unwrap_err();
        assert!(matches!(err, MappingError::Conversion(_)));

        let short = IntegerMapper::new(IntegerWidth::I16);
        assert!(short.to_domain(&Value::Long(40_000)).is_err());
        assert!(short.to_store(DomainValue::Long(1)).is_err());
    }

    #[test]
    fn test_float_zero() {
        let mapper = FloatMapper;
        match mapper.to_domain(&Value::Double(0.0)).unwrap() {
            DomainValue::Float(f) => assert_eq!(f, 0.0f32),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_float_overflow_on_read() {
        let mapper = FloatMapper;
        let stored = Value::Double(f32::MAX as f64 * 2.0);
        assert!(matches!(mapper.to_domain(&stored), Err(MappingError::Conversion(_))));

        let negative = Value::Double(-(f32::MAX as f64) * 10.0);
        assert!(mapper.to_domain(&negative).is_err());
    }

    #[test]
    fn test_float_keeps_non_finite_values() {
        let mapper = FloatMapper;
        assert!(matches!(
            mapper.to_domain(&Value::Double(f64::INFINITY)).unwrap(),
            DomainValue::Float(f) if f == f32::INFINITY
        ));
        assert!(matches!(
            mapper.to_domain(&Value::Double(f64::NEG_INFINITY)).unwrap(),
            DomainValue::Float(f) if f == f32::NEG_INFINITY
        ));
        assert!(matches!(
            mapper.to_domain(&Value::Double(f64::NAN)).unwrap(),
            DomainValue::Float(f) if f.is_nan()
        ));
        assert_eq!(
            mapper.to_store(DomainValue::Float(f32::INFINITY)).unwrap(),
            Value::Double(f64::INFINITY)
        );
    }

    #[test]
    fn test_float_widens_exactly() {
        let mapper = FloatMapper;
        assert_eq!(mapper.to_store(DomainValue::Float(1.5)).unwrap(), Value::Double(1.5));
        assert!(matches!(
            mapper.to_domain(&Value::Double(f32::MAX as f64)).unwrap(),
            DomainValue::Float(f) if f == f32::MAX
        ));
    }

    #[test]
    fn test_double_rejects_strings() {
        let err = DoubleMapper.to_domain(&Value::String("1.0".into())).unwrap_err();
        assert!(err.to_string().contains("DOUBLE"));
    }
}
