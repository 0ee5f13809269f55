use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;
use super::field::{Embedded, EmbeddedDescriptor, Field, FieldDescriptor};
use super::invoke::*;
use super::listener::{CallbackType, EntityListener, ListenerDescriptor, ListenerMethod};
use super::Persistent;
use crate::core::{DomainType, DomainValue, simple_type_name};

/// How a described type participates in mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassRole {
    /// Stored as a record of its own kind.
    Entity,
    /// Stored inside an entity.
    Embeddable,
    /// Contributes fields and callbacks to the types that inherit it.
    MappedSuperclass,
}

/// Capability table of `T`, returned from [`Persistent::descriptor`].
///
/// Declares identifier, properties, embedded objects, construction and
/// callbacks. Nothing is validated here; the introspector checks the whole
/// table when the class is first used.
pub struct ClassDescriptor<T> {
    shape: ClassShape,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send> ClassDescriptor<T> {
    pub fn entity() -> Self {
        Self::with_role(ClassRole::Entity)
    }

    pub fn embeddable() -> Self {
        Self::with_role(ClassRole::Embeddable)
    }

    pub fn mapped_superclass() -> Self {
        Self::with_role(ClassRole::MappedSuperclass)
    }

    fn with_role(role: ClassRole) -> Self {
        Self {
            shape: ClassShape {
                class_name: simple_type_name::<T>(),
                type_id: TypeId::of::<T>(),
                role,
                kind: None,
                constructors: Vec::new(),
                fields: Vec::new(),
                embedded: Vec::new(),
                builder: None,
                callbacks: Vec::new(),
                listeners: Vec::new(),
                superclasses: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Store kind, defaults to the type's simple name.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.shape.kind = Some(kind.into());
        self
    }

    pub fn constructor(
        mut self,
        name: impl Into<String>,
        constructor: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        self.shape
            .constructors
            .push((name.into(), Arc::new(move || Box::new(constructor()) as Instance)));
        self
    }

    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor("default", T::default)
    }

    pub fn field<V: DomainType>(mut self, field: Field<T, V>) -> Self {
        self.shape.fields.push(field.into_descriptor());
        self
    }

    pub fn embedded<E: Persistent>(mut self, embedded: Embedded<T, E>) -> Self {
        self.shape.embedded.push(embedded.into_descriptor());
        self
    }

    pub fn builder<B: Any + Send>(mut self, builder: BuilderSpec<T, B>) -> Self {
        self.shape.builder = Some(builder.into_descriptor());
        self
    }

    /// Internal callback, a method taking only `&mut self`.
    pub fn callback(
        self,
        callback: CallbackType,
        name: impl Into<String>,
        method: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        self.listener_method(ListenerMethod::receiver::<T>(callback, name, method))
    }

    pub fn listener_method(mut self, method: ListenerMethod) -> Self {
        self.shape.callbacks.push(method);
        self
    }

    /// Registers an external listener type; listeners fire in registration order.
    pub fn listener<L: EntityListener>(mut self) -> Self {
        self.shape.listeners.push(L::listener());
        self
    }

    pub fn listener_descriptor(mut self, listener: ListenerDescriptor) -> Self {
        self.shape.listeners.push(listener);
        self
    }

    /// Inherits the fields and callbacks of mapped superclass `B` embedded in `T`.
    pub fn inherit<B: Persistent>(
        mut self,
        project: impl Fn(&T) -> &B + Send + Sync + 'static,
        project_mut: impl Fn(&mut T) -> &mut B + Send + Sync + 'static,
    ) -> Self {
        let lift = Lift {
            project: projection(move |any| Ok(project(downcast_ref::<T>(any)?) as &dyn Any)),
            project_mut: projection_mut(move |any| {
                Ok(project_mut(downcast_mut::<T>(any)?) as &mut dyn Any)
            }),
        };
        self.shape.superclasses.push(SuperclassDescriptor {
            class_name: simple_type_name::<B>(),
            type_id: TypeId::of::<B>(),
            shape: shape_of::<B>,
            lift,
        });
        self
    }

    pub fn class_name(&self) -> &'static str {
        self.shape.class_name
    }

    pub(crate) fn into_shape(self) -> ClassShape {
        self.shape
    }
}

pub(crate) fn shape_of<T: Persistent>() -> ClassShape {
    T::descriptor().into_shape()
}

/// Type-erased contents of a [`ClassDescriptor`].
#[derive(Clone)]
pub struct ClassShape {
    pub(crate) class_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) role: ClassRole,
    pub(crate) kind: Option<String>,
    pub(crate) constructors: Vec<(String, Constructor)>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) embedded: Vec<EmbeddedDescriptor>,
    pub(crate) builder: Option<BuilderDescriptor>,
    pub(crate) callbacks: Vec<ListenerMethod>,
    pub(crate) listeners: Vec<ListenerDescriptor>,
    pub(crate) superclasses: Vec<SuperclassDescriptor>,
}

impl ClassShape {
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn role(&self) -> ClassRole {
        self.role
    }
}

#[derive(Clone)]
pub struct SuperclassDescriptor {
    pub(crate) class_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) shape: fn() -> ClassShape,
    pub(crate) lift: Lift,
}

/// Builder-based construction of `T` through builder type `B`.
///
/// Setters are keyed by field name. A class needs exactly one factory and one
/// build method to be constructed this way.
pub struct BuilderSpec<T, B> {
    factories: Vec<(String, Constructor)>,
    build_methods: Vec<(String, BuildMethod)>,
    setters: Vec<(String, BuilderSetter)>,
    _marker: PhantomData<fn(B) -> T>,
}

impl<T: Any + Send, B: Any + Send> Default for BuilderSpec<T, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any + Send, B: Any + Send> BuilderSpec<T, B> {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
            build_methods: Vec::new(),
            setters: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn factory(
        mut self,
        name: impl Into<String>,
        factory: impl Fn() -> B + Send + Sync + 'static,
    ) -> Self {
        self.factories
            .push((name.into(), Arc::new(move || Box::new(factory()) as Instance)));
        self
    }

    pub fn build_method(
        mut self,
        name: impl Into<String>,
        build: impl Fn(B) -> T + Send + Sync + 'static,
    ) -> Self {
        self.build_methods.push((
            name.into(),
            Arc::new(move |instance: Instance| {
                let builder = downcast_instance::<B>(instance)?;
                Ok(Box::new(build(*builder)) as Instance)
            }),
        ));
        self
    }

    pub fn setter<V: DomainType>(
        mut self,
        field: impl Into<String>,
        setter: impl Fn(B, V) -> B + Send + Sync + 'static,
    ) -> Self {
        self.setters.push((
            field.into(),
            Arc::new(move |instance: Instance, value: DomainValue| {
                let builder = downcast_instance::<B>(instance)?;
                let value = V::from_domain(value)?;
                Ok(Box::new(setter(*builder, value)) as Instance)
            }),
        ));
        self
    }

    /// Setter for an embedded field; a null embedded value leaves the builder as is.
    pub fn embedded_setter<E: Persistent>(
        mut self,
        field: impl Into<String>,
        setter: impl Fn(B, E) -> B + Send + Sync + 'static,
    ) -> Self {
        self.setters.push((
            field.into(),
            Arc::new(move |instance: Instance, value: DomainValue| {
                if value.is_null() {
                    return Ok(instance);
                }
                let builder = downcast_instance::<B>(instance)?;
                let embedded = value.into_object::<E>()?;
                Ok(Box::new(setter(*builder, embedded)) as Instance)
            }),
        ));
        self
    }

    fn into_descriptor(self) -> BuilderDescriptor {
        BuilderDescriptor {
            builder_name: simple_type_name::<B>(),
            factories: self.factories,
            build_methods: self.build_methods,
            setters: self.setters,
        }
    }
}

#[derive(Clone)]
pub struct BuilderDescriptor {
    pub(crate) builder_name: &'static str,
    pub(crate) factories: Vec<(String, Constructor)>,
    pub(crate) build_methods: Vec<(String, BuildMethod)>,
    pub(crate) setters: Vec<(String, BuilderSetter)>,
}

impl BuilderDescriptor {
    pub(crate) fn setter(&self, field: &str) -> Option<&BuilderSetter> {
        self.setters
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, setter)| setter)
    }
}
