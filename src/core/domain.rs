//! Domain-side values and the declared types of mapped fields.

use std::any::{Any, TypeId};
use std::fmt;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use crate::core::{Key, MappingError, Result};

/// Shape of a field's Rust type, as far as mapper resolution cares.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    Bool,
    Short,
    Int,
    Long,
    Float,
    Double,
    Text,
    Decimal,
    OffsetDateTime,
    ZonedDateTime,
    LocalDate,
    LocalDateTime,
    LocalTime,
    Uuid,
    Bytes,
    Key,
    List(Box<DeclaredType>),
    Custom { type_id: TypeId, name: &'static str },
}

impl DeclaredType {
    pub fn custom<T: 'static>() -> Self {
        Self::Custom {
            type_id: TypeId::of::<T>(),
            name: simple_type_name::<T>(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Bool => "bool".into(),
            Self::Short => "i16".into(),
            Self::Int => "i32".into(),
            Self::Long => "i64".into(),
            Self::Float => "f32".into(),
            Self::Double => "f64".into(),
            Self::Text => "String".into(),
            Self::Decimal => "Decimal".into(),
            Self::OffsetDateTime => "DateTime<FixedOffset>".into(),
            Self::ZonedDateTime => "DateTime<Utc>".into(),
            Self::LocalDate => "NaiveDate".into(),
            Self::LocalDateTime => "NaiveDateTime".into(),
            Self::LocalTime => "NaiveTime".into(),
            Self::Uuid => "Uuid".into(),
            Self::Bytes => "Vec<u8>".into(),
            Self::Key => "Key".into(),
            Self::List(inner) => format!("Vec<{}>", inner.name()),
            Self::Custom { name, .. } => (*name).into(),
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Declared type of a field plus whether it admits `None`.
///
/// A non-nullable field corresponds to a plain (non-`Option`) Rust field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub declared: DeclaredType,
    pub nullable: bool,
}

impl FieldType {
    pub fn required(declared: DeclaredType) -> Self {
        Self {
            declared,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "Option<{}>", self.declared)
        } else {
            write!(f, "{}", self.declared)
        }
    }
}

/// A field value on the domain side of a mapper.
pub enum DomainValue {
    Null,
    Bool(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Decimal(Decimal),
    OffsetDateTime(DateTime<FixedOffset>),
    ZonedDateTime(DateTime<Utc>),
    LocalDate(NaiveDate),
    LocalDateTime(NaiveDateTime),
    LocalTime(NaiveTime),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Key(Key),
    List(Vec<DomainValue>),
    /// Identifier wrappers, embedded objects and custom types.
    Object(Box<dyn Any + Send>),
}

impl DomainValue {
    pub fn object<T: Any + Send>(value: T) -> Self {
        Self::Object(Box::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Short(_) => "i16",
            Self::Int(_) => "i32",
            Self::Long(_) => "i64",
            Self::Float(_) => "f32",
            Self::Double(_) => "f64",
            Self::Text(_) => "String",
            Self::Decimal(_) => "Decimal",
            Self::OffsetDateTime(_) => "DateTime<FixedOffset>",
            Self::ZonedDateTime(_) => "DateTime<Utc>",
            Self::LocalDate(_) => "NaiveDate",
            Self::LocalDateTime(_) => "NaiveDateTime",
            Self::LocalTime(_) => "NaiveTime",
            Self::Uuid(_) => "Uuid",
            Self::Bytes(_) => "Vec<u8>",
            Self::Key(_) => "Key",
            Self::List(_) => "Vec",
            Self::Object(_) => "object",
        }
    }

    /// Recovers a boxed object of type `T`.
    pub fn into_object<T: Any>(self) -> Result<T> {
        match self {
            Self::Object(boxed) => boxed.downcast::<T>().map(|b| *b).map_err(|_| {
                MappingError::TypeMismatch(format!(
                    "object is not a {}",
                    simple_type_name::<T>()
                ))
            }),
            other => Err(unexpected::<T>(&other)),
        }
    }

    /// Borrows a boxed object of type `T`.
    pub fn as_object<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(boxed) => boxed.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for DomainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(v) => write!(f, "Bool({:?})", v),
            Self::Short(v) => write!(f, "Short({:?})", v),
            Self::Int(v) => write!(f, "Int({:?})", v),
            Self::Long(v) => write!(f, "Long({:?})", v),
            Self::Float(v) => write!(f, "Float({:?})", v),
            Self::Double(v) => write!(f, "Double({:?})", v),
            Self::Text(v) => write!(f, "Text({:?})", v),
            Self::Decimal(v) => write!(f, "Decimal({})", v),
            Self::OffsetDateTime(v) => write!(f, "OffsetDateTime({})", v),
            Self::ZonedDateTime(v) => write!(f, "ZonedDateTime({})", v),
            Self::LocalDate(v) => write!(f, "LocalDate({})", v),
            Self::LocalDateTime(v) => write!(f, "LocalDateTime({})", v),
            Self::LocalTime(v) => write!(f, "LocalTime({})", v),
            Self::Uuid(v) => write!(f, "Uuid({})", v),
            Self::Bytes(v) => write!(f, "Bytes(<{} bytes>)", v.len()),
            Self::Key(v) => write!(f, "Key({})", v),
            Self::List(v) => f.debug_tuple("List").field(v).finish(),
            Self::Object(_) => write!(f, "Object(..)"),
        }
    }
}

pub(crate) fn unexpected<T>(value: &DomainValue) -> MappingError {
    MappingError::TypeMismatch(format!(
        "expected a {} value, found {}",
        simple_type_name::<T>(),
        value.kind_name()
    ))
}

/// Last path segment of a type name, generics stripped.
pub fn simple_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}

/// A Rust type that can appear as a mapped field.
///
/// Built-in scalars, `Option<T>` and `Vec<T>` are covered here; other types
/// opt in through [`custom_domain_type!`](crate::custom_domain_type) or
/// `#[derive(IdWrapper)]`.
pub trait DomainType: Sized + Send + 'static {
    fn field_type() -> FieldType;
    fn into_domain(self) -> DomainValue;
    fn from_domain(value: DomainValue) -> Result<Self>;
}

macro_rules! scalar_domain_type {
    ($ty:ty, $variant:ident, $declared:expr) => {
        impl DomainType for $ty {
            fn field_type() -> FieldType {
                FieldType::required($declared)
            }

            fn into_domain(self) -> DomainValue {
                DomainValue::$variant(self)
            }

            fn from_domain(value: DomainValue) -> Result<Self> {
                match value {
                    DomainValue::$variant(v) => Ok(v),
                    other => Err(unexpected::<Self>(&other)),
                }
            }
        }
    };
}

scalar_domain_type!(bool, Bool, DeclaredType::Bool);
scalar_domain_type!(i16, Short, DeclaredType::Short);
scalar_domain_type!(i32, Int, DeclaredType::Int);
scalar_domain_type!(i64, Long, DeclaredType::Long);
scalar_domain_type!(f32, Float, DeclaredType::Float);
scalar_domain_type!(f64, Double, DeclaredType::Double);
scalar_domain_type!(String, Text, DeclaredType::Text);
scalar_domain_type!(Decimal, Decimal, DeclaredType::Decimal);
scalar_domain_type!(DateTime<FixedOffset>, OffsetDateTime, DeclaredType::OffsetDateTime);
scalar_domain_type!(DateTime<Utc>, ZonedDateTime, DeclaredType::ZonedDateTime);
scalar_domain_type!(NaiveDate, LocalDate, DeclaredType::LocalDate);
scalar_domain_type!(NaiveDateTime, LocalDateTime, DeclaredType::LocalDateTime);
scalar_domain_type!(NaiveTime, LocalTime, DeclaredType::LocalTime);
scalar_domain_type!(Uuid, Uuid, DeclaredType::Uuid);
scalar_domain_type!(Vec<u8>, Bytes, DeclaredType::Bytes);
scalar_domain_type!(Key, Key, DeclaredType::Key);

impl<T: DomainType> DomainType for Option<T> {
    fn field_type() -> FieldType {
        T::field_type().nullable()
    }

    fn into_domain(self) -> DomainValue {
        match self {
            Some(value) => value.into_domain(),
            None => DomainValue::Null,
        }
    }

    fn from_domain(value: DomainValue) -> Result<Self> {
        match value {
            DomainValue::Null => Ok(None),
            other => T::from_domain(other).map(Some),
        }
    }
}

impl<T: DomainType> DomainType for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::required(DeclaredType::List(Box::new(T::field_type().declared)))
    }

    fn into_domain(self) -> DomainValue {
        DomainValue::List(self.into_iter().map(DomainType::into_domain).collect())
    }

    fn from_domain(value: DomainValue) -> Result<Self> {
        match value {
            DomainValue::List(items) => items.into_iter().map(T::from_domain).collect(),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

/// Declares user types as custom domain types.
///
/// Such fields are carried as [`DomainValue::Object`] and need a mapper,
/// either on the field or registered with the
/// [`MapperFactory`](crate::MapperFactory).
#[macro_export]
macro_rules! custom_domain_type {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::DomainType for $ty {
                fn field_type() -> $crate::FieldType {
                    $crate::FieldType::required($crate::DeclaredType::custom::<$ty>())
                }

                fn into_domain(self) -> $crate::DomainValue {
                    $crate::DomainValue::object(self)
                }

                fn from_domain(value: $crate::DomainValue) -> $crate::Result<Self> {
                    value.into_object::<$ty>()
                }
            }
        )+
    };
}
