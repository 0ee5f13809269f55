use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use super::{Mapper, wrong_domain_value};
use crate::core::{DomainValue, MappingError, Result, Value, ValueType};

pub const MAX_PRECISION: u32 = 18;

/// Fixed-point decimal stored as its unscaled `i64` at a configured scale.
///
/// `12.34` at scale 3 is stored as `12340`. Values with more fractional digits
/// than `scale`, or with more than `precision` digits in total, are rejected.
#[derive(Debug, Clone, Copy)]
pub struct DecimalMapper {
    precision: u32,
    scale: u32,
    limit: i128,
}

impl DecimalMapper {
    pub fn new(precision: u32, scale: u32) -> Result<Self> {
        if precision == 0 || precision > MAX_PRECISION {
            return Err(MappingError::Configuration(format!(
                "decimal precision must be between 1 and {}, got {}",
                MAX_PRECISION, precision
            )));
        }
        if scale > precision {
            return Err(MappingError::Configuration(format!(
                "decimal scale must be between 0 and precision {}, got {}",
                precision, scale
            )));
        }
        Ok(Self {
            precision,
            scale,
            limit: 10i128.pow(precision),
        })
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn unscaled(&self, value: Decimal) -> Result<i64> {
        let normalized = value.normalize();
        if normalized.scale() > self.scale {
            return Err(MappingError::Conversion(format!(
                "{} has more than {} fractional digits",
                value, self.scale
            )));
        }

        let factor = 10i128.pow(self.scale - normalized.scale());
        let unscaled = normalized
            .mantissa()
            .checked_mul(factor)
            .filter(|v| v.abs() < self.limit)
            .ok_or_else(|| {
                MappingError::Conversion(format!(
                    "{} exceeds decimal precision {} at scale {}",
                    value, self.precision, self.scale
                ))
            })?;

        // limit <= 10^18 keeps the result inside i64
        Ok(unscaled as i64)
    }
}

impl Mapper for DecimalMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::Decimal(d) => self.unscaled(d).map(Value::Long),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        let raw = match value {
            Value::Null => return Ok(DomainValue::Null),
            Value::Long(v) => *v,
            other => return Err(other.mismatch(ValueType::Long)),
        };

        if (raw as i128).abs() >= self.limit {
            return Err(MappingError::Conversion(format!(
                "stored value {} exceeds decimal precision {}",
                raw, self.precision
            )));
        }
        Decimal::try_new(raw, self.scale)
            .map(DomainValue::Decimal)
            .map_err(|e| MappingError::Conversion(e.to_string()))
    }
}

/// Decimal without declared precision, stored as a double.
#[derive(Debug, Default, Clone, Copy)]
pub struct BigDecimalMapper;

impl Mapper for BigDecimalMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::Decimal(d) => d.to_f64().map(Value::Double).ok_or_else(|| {
                MappingError::Conversion(format!("{} cannot be represented as a double", d))
            }),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match value {
            Value::Null => Ok(DomainValue::Null),
            Value::Double(v) => Decimal::try_from(*v)
                .map(|d| DomainValue::Decimal(d.normalize()))
                .map_err(|e| MappingError::Conversion(format!("{}: {}", v, e))),
            other => Err(other.mismatch(ValueType::Double)),
        }
    }
}
