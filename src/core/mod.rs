pub mod domain;
pub mod entity;
pub mod error;
pub mod value;

pub use domain::{DeclaredType, DomainType, DomainValue, FieldType, simple_type_name};
pub use entity::{Key, KeyId, NativeEntity};
pub use error::{MappingError, Result};
pub use value::{Value, ValueType};
