use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use super::class::{ClassShape, shape_of};
use super::invoke::*;
use super::Persistent;
use crate::core::{DomainType, DomainValue, FieldType, Result, simple_type_name};
use crate::mapper::Mapper;

/// What a field means to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    Property,
    Identifier,
    Version,
    CreatedTimestamp,
    UpdatedTimestamp,
    ParentKey,
}

impl FieldRole {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Identifier => "identifier",
            Self::Version => "version",
            Self::CreatedTimestamp => "created timestamp",
            Self::UpdatedTimestamp => "updated timestamp",
            Self::ParentKey => "parent key",
        }
    }
}

/// Storage layout of an embedded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddedMode {
    /// Properties flattened into the parent as `<prefix>_<name>`.
    #[default]
    Exploded,
    /// One nested record.
    Imploded,
}

/// Declared field of `T` with Rust type `V`.
///
/// ```ignore
/// Field::<Contact, String>::new("name")
///     .get(|c| c.name.clone())
///     .set(|c, v| c.name = v)
///     .property_name("full_name")
/// ```
pub struct Field<T, V> {
    name: String,
    role: FieldRole,
    property_name: Option<String>,
    optional: bool,
    indexed: bool,
    mapper: Option<Arc<dyn Mapper>>,
    decimal: Option<(u32, u32)>,
    id_class: Option<IdClassDescriptor>,
    accessor: Option<Accessor>,
    mutator: Option<Mutator>,
    _marker: PhantomData<fn(T) -> V>,
}

impl<T: Any + Send, V: DomainType> Field<T, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::Property)
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::Identifier)
    }

    pub fn version(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::Version)
    }

    pub fn created_timestamp(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::CreatedTimestamp)
    }

    pub fn updated_timestamp(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::UpdatedTimestamp)
    }

    pub fn parent_key(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::ParentKey)
    }

    fn with_role(name: impl Into<String>, role: FieldRole) -> Self {
        Self {
            name: name.into(),
            role,
            property_name: None,
            optional: false,
            indexed: true,
            mapper: None,
            decimal: None,
            id_class: None,
            accessor: None,
            mutator: None,
            _marker: PhantomData,
        }
    }

    pub fn get<F>(mut self, getter: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.accessor = Some(Arc::new(move |any: &dyn Any| {
            Ok(getter(downcast_ref::<T>(any)?).into_domain())
        }));
        self
    }

    pub fn set<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.mutator = Some(Arc::new(move |any: &mut dyn Any, value: DomainValue| {
            let target = downcast_mut::<T>(any)?;
            setter(target, V::from_domain(value)?);
            Ok(())
        }));
        self
    }

    /// Store property name, defaults to the field name.
    pub fn property_name(mut self, name: impl Into<String>) -> Self {
        self.property_name = Some(name.into());
        self
    }

    /// Omit the property from the record when the value is `None`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    pub fn mapper(mut self, mapper: impl Mapper + 'static) -> Self {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// Fixed-point storage for `Decimal` fields.
    pub fn decimal(mut self, precision: u32, scale: u32) -> Self {
        self.decimal = Some((precision, scale));
        self
    }

    /// Marks the identifier as a wrapper around a scalar.
    pub fn id_class<W: Any + Send, S: DomainType>(mut self, id_class: IdClass<W, S>) -> Self {
        self.id_class = Some(id_class.into_descriptor());
        self
    }

    pub(crate) fn into_descriptor(self) -> FieldDescriptor {
        FieldDescriptor {
            name: self.name,
            role: self.role,
            field_type: V::field_type(),
            property_name: self.property_name,
            optional: self.optional,
            indexed: self.indexed,
            mapper: self.mapper,
            decimal: self.decimal,
            id_class: self.id_class,
            accessor: self.accessor,
            mutator: self.mutator,
        }
    }
}

/// Type-erased form of [`Field`].
#[derive(Clone)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) role: FieldRole,
    pub(crate) field_type: FieldType,
    pub(crate) property_name: Option<String>,
    pub(crate) optional: bool,
    pub(crate) indexed: bool,
    pub(crate) mapper: Option<Arc<dyn Mapper>>,
    pub(crate) decimal: Option<(u32, u32)>,
    pub(crate) id_class: Option<IdClassDescriptor>,
    pub(crate) accessor: Option<Accessor>,
    pub(crate) mutator: Option<Mutator>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> FieldRole {
        self.role
    }

    pub(crate) fn lifted(mut self, lift: &Lift) -> Self {
        self.accessor = self.accessor.map(|a| lift.accessor(a));
        self.mutator = self.mutator.map(|m| lift.mutator(m));
        self
    }
}

pub type IdReader = Arc<dyn Fn(&dyn Any) -> Result<DomainValue> + Send + Sync>;
pub type IdConstructor = Arc<dyn Fn(DomainValue) -> Result<DomainValue> + Send + Sync>;

/// Reader and constructor pair of an identifier wrapper `W` around scalar `S`.
pub struct IdClass<W, S> {
    readers: Vec<(String, IdReader)>,
    constructors: Vec<(String, IdConstructor)>,
    _marker: PhantomData<fn(S) -> W>,
}

impl<W: Any + Send, S: DomainType> Default for IdClass<W, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Any + Send, S: DomainType> IdClass<W, S> {
    pub fn new() -> Self {
        Self {
            readers: Vec::new(),
            constructors: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn reader<F>(mut self, name: impl Into<String>, reader: F) -> Self
    where
        F: Fn(&W) -> S + Send + Sync + 'static,
    {
        self.readers.push((
            name.into(),
            Arc::new(move |any: &dyn Any| Ok(reader(downcast_ref::<W>(any)?).into_domain())),
        ));
        self
    }

    pub fn constructor<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(S) -> W + Send + Sync + 'static,
    {
        self.constructors.push((
            name.into(),
            Arc::new(move |value: DomainValue| {
                Ok(DomainValue::object(constructor(S::from_domain(value)?)))
            }),
        ));
        self
    }

    fn into_descriptor(self) -> IdClassDescriptor {
        IdClassDescriptor {
            wrapper: TypeId::of::<W>(),
            wrapper_name: simple_type_name::<W>(),
            scalar: S::field_type(),
            readers: self.readers,
            constructors: self.constructors,
        }
    }
}

#[derive(Clone)]
pub struct IdClassDescriptor {
    pub(crate) wrapper: TypeId,
    pub(crate) wrapper_name: &'static str,
    pub(crate) scalar: FieldType,
    pub(crate) readers: Vec<(String, IdReader)>,
    pub(crate) constructors: Vec<(String, IdConstructor)>,
}

/// Declared embedded object of type `E` inside `T`.
///
/// `get`/`set` declare a required field, `get_opt`/`set_opt` an `Option<E>`
/// field.
pub struct Embedded<T, E> {
    name: String,
    property_name: Option<String>,
    mode: Option<EmbeddedMode>,
    nullable: bool,
    accessor: Option<EmbeddedAccessor>,
    mutator: Option<Mutator>,
    _marker: PhantomData<fn(T) -> E>,
}

impl<T: Any + Send, E: Persistent> Embedded<T, E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_name: None,
            mode: None,
            nullable: false,
            accessor: None,
            mutator: None,
            _marker: PhantomData,
        }
    }

    pub fn get<F>(mut self, getter: F) -> Self
    where
        F: Fn(&T) -> &E + Send + Sync + 'static,
    {
        self.nullable = false;
        self.accessor = Some(embedded_accessor(move |any| {
            Ok(Some(getter(downcast_ref::<T>(any)?) as &dyn Any))
        }));
        self
    }

    pub fn get_opt<F>(mut self, getter: F) -> Self
    where
        F: Fn(&T) -> Option<&E> + Send + Sync + 'static,
    {
        self.nullable = true;
        self.accessor = Some(embedded_accessor(move |any| {
            Ok(getter(downcast_ref::<T>(any)?).map(|e| e as &dyn Any))
        }));
        self
    }

    pub fn set<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut T, E) + Send + Sync + 'static,
    {
        self.mutator = Some(Arc::new(move |any: &mut dyn Any, value: DomainValue| {
            if value.is_null() {
                return Ok(());
            }
            let embedded = value.into_object::<E>()?;
            setter(downcast_mut::<T>(any)?, embedded);
            Ok(())
        }));
        self
    }

    pub fn set_opt<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut T, Option<E>) + Send + Sync + 'static,
    {
        self.mutator = Some(Arc::new(move |any: &mut dyn Any, value: DomainValue| {
            let embedded = match value {
                DomainValue::Null => None,
                other => Some(other.into_object::<E>()?),
            };
            setter(downcast_mut::<T>(any)?, embedded);
            Ok(())
        }));
        self
    }

    pub fn property_name(mut self, name: impl Into<String>) -> Self {
        self.property_name = Some(name.into());
        self
    }

    pub fn imploded(mut self) -> Self {
        self.mode = Some(EmbeddedMode::Imploded);
        self
    }

    pub fn exploded(mut self) -> Self {
        self.mode = Some(EmbeddedMode::Exploded);
        self
    }

    pub(crate) fn into_descriptor(self) -> EmbeddedDescriptor {
        EmbeddedDescriptor {
            name: self.name,
            property_name: self.property_name,
            mode: self.mode,
            nullable: self.nullable,
            class_name: simple_type_name::<E>(),
            type_id: TypeId::of::<E>(),
            shape: shape_of::<E>,
            accessor: self.accessor,
            mutator: self.mutator,
        }
    }
}

/// Type-erased form of [`Embedded`].
#[derive(Clone)]
pub struct EmbeddedDescriptor {
    pub(crate) name: String,
    pub(crate) property_name: Option<String>,
    pub(crate) mode: Option<EmbeddedMode>,
    pub(crate) nullable: bool,
    pub(crate) class_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) shape: fn() -> ClassShape,
    pub(crate) accessor: Option<EmbeddedAccessor>,
    pub(crate) mutator: Option<Mutator>,
}

impl EmbeddedDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn lifted(mut self, lift: &Lift) -> Self {
        self.accessor = self.accessor.map(|a| lift.embedded_accessor(a));
        self.mutator = self.mutator.map(|m| lift.mutator(m));
        self
    }
}
