//! Type mappers
//!
//! A [`Mapper`] converts one domain value type to one store value type and
//! back. Mappers are resolved once per field when a class is introspected and
//! kept as `Arc<dyn Mapper>` in its metadata.
//!
//! - `boolean.rs` - identity mapping for `bool`
//! - `numeric.rs` - integers, `f64`, and range-checked `f32`
//! - `decimal.rs` - fixed-point and floating decimals
//! - `temporal.rs` - instants and ISO-8601 local date/time values
//! - `text.rs` - strings, UUIDs, byte arrays and keys
//! - `list.rs` - element-wise lists
//! - `factory.rs` - built-in table and per-type overrides

mod boolean;
mod decimal;
mod factory;
mod list;
mod numeric;
mod temporal;
mod text;

pub use boolean::BooleanMapper;
pub use decimal::{BigDecimalMapper, DecimalMapper};
pub use factory::MapperFactory;
pub use list::ListMapper;
pub use numeric::{DoubleMapper, FloatMapper, IntegerMapper, IntegerWidth};
pub use temporal::{
    LocalDateMapper, LocalDateTimeMapper, LocalTimeMapper, OffsetDateTimeMapper,
    ZonedDateTimeMapper,
};
pub use text::{ByteArrayMapper, KeyMapper, StringMapper, UuidMapper};

pub(crate) use temporal::to_store_instant;

use crate::core::{DomainValue, MappingError, Result, Value};

/// Bidirectional converter between a domain value and a store value.
///
/// Both directions map null to null. `to_domain` is never invoked with a null
/// value for a non-nullable field; the unmarshaller skips those.
pub trait Mapper: Send + Sync {
    fn to_store(&self, value: DomainValue) -> Result<Value>;

    fn to_domain(&self, value: &Value) -> Result<DomainValue>;

    fn name(&self) -> &'static str {
        crate::core::simple_type_name::<Self>()
    }
}

pub(crate) fn wrong_domain_value(mapper: &str, value: &DomainValue) -> MappingError {
    MappingError::Conversion(format!(
        "{} cannot convert a {} domain value",
        mapper,
        value.kind_name()
    ))
}
