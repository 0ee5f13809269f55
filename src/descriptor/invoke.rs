//! Type-erased invokers.
//!
//! Everything a descriptor declares about a class ends up as one of these
//! closures over `dyn Any`. They are built once per class by the typed
//! builders and called by the marshaller and unmarshaller.

use std::any::Any;
use std::sync::Arc;
use crate::core::{DomainValue, MappingError, Result, simple_type_name};

/// A domain object or builder under construction.
pub type Instance = Box<dyn Any + Send>;

/// Reads one field as a domain value.
pub type Accessor = Arc<dyn Fn(&dyn Any) -> Result<DomainValue> + Send + Sync>;

/// Writes one field in place.
pub type Mutator = Arc<dyn Fn(&mut dyn Any, DomainValue) -> Result<()> + Send + Sync>;

/// Borrows an embedded object, `None` when the field holds no value.
pub type EmbeddedAccessor =
    Arc<dyn for<'a> Fn(&'a dyn Any) -> Result<Option<&'a dyn Any>> + Send + Sync>;

pub type Constructor = Arc<dyn Fn() -> Instance + Send + Sync>;

/// Consumes a builder and returns it with one more value set.
pub type BuilderSetter = Arc<dyn Fn(Instance, DomainValue) -> Result<Instance> + Send + Sync>;

/// Consumes a builder and returns the built object.
pub type BuildMethod = Arc<dyn Fn(Instance) -> Result<Instance> + Send + Sync>;

/// Callback on the entity's own hierarchy.
pub type ReceiverFn = Arc<dyn Fn(&mut dyn Any) -> Result<()> + Send + Sync>;

/// Callback on a listener instance, receiving the entity.
pub type ListenerFn = Arc<dyn Fn(&dyn Any, &mut dyn Any) -> Result<()> + Send + Sync>;

pub(crate) type Projection =
    Arc<dyn for<'a> Fn(&'a dyn Any) -> Result<&'a dyn Any> + Send + Sync>;

pub(crate) type ProjectionMut =
    Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Result<&'a mut dyn Any> + Send + Sync>;

pub(crate) fn downcast_ref<T: Any>(value: &dyn Any) -> Result<&T> {
    value.downcast_ref::<T>().ok_or_else(|| wrong_instance::<T>())
}

pub(crate) fn downcast_mut<T: Any>(value: &mut dyn Any) -> Result<&mut T> {
    value.downcast_mut::<T>().ok_or_else(|| wrong_instance::<T>())
}

pub(crate) fn downcast_instance<T: Any>(instance: Instance) -> Result<Box<T>> {
    instance.downcast::<T>().map_err(|_| wrong_instance::<T>())
}

fn wrong_instance<T>() -> MappingError {
    MappingError::TypeMismatch(format!("instance is not a {}", simple_type_name::<T>()))
}

pub(crate) fn embedded_accessor<F>(f: F) -> EmbeddedAccessor
where
    F: for<'a> Fn(&'a dyn Any) -> Result<Option<&'a dyn Any>> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn projection<F>(f: F) -> Projection
where
    F: for<'a> Fn(&'a dyn Any) -> Result<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn projection_mut<F>(f: F) -> ProjectionMut
where
    F: for<'a> Fn(&'a mut dyn Any) -> Result<&'a mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// How a reconstructed value reaches the object being built.
#[derive(Clone)]
pub enum FieldWriter {
    Mutator(Mutator),
    BuilderSetter(BuilderSetter),
}

impl FieldWriter {
    pub fn apply(&self, mut target: Instance, value: DomainValue) -> Result<Instance> {
        match self {
            Self::Mutator(mutator) => {
                mutator(&mut *target, value)?;
                Ok(target)
            }
            Self::BuilderSetter(setter) => setter(target, value),
        }
    }

    pub fn is_builder_setter(&self) -> bool {
        matches!(self, Self::BuilderSetter(_))
    }
}

/// Superclass-to-subclass lifting of accessors, mutators and callbacks.
#[derive(Clone)]
pub(crate) struct Lift {
    pub(crate) project: Projection,
    pub(crate) project_mut: ProjectionMut,
}

impl Lift {
    pub(crate) fn accessor(&self, inner: Accessor) -> Accessor {
        let project = self.project.clone();
        Arc::new(move |any: &dyn Any| inner(project(any)?))
    }

    pub(crate) fn mutator(&self, inner: Mutator) -> Mutator {
        let project_mut = self.project_mut.clone();
        Arc::new(move |any: &mut dyn Any, value| inner(project_mut(any)?, value))
    }

    pub(crate) fn embedded_accessor(&self, inner: EmbeddedAccessor) -> EmbeddedAccessor {
        let project = self.project.clone();
        embedded_accessor(move |any| inner(project(any)?))
    }

    pub(crate) fn receiver(&self, inner: ReceiverFn) -> ReceiverFn {
        let project_mut = self.project_mut.clone();
        Arc::new(move |any: &mut dyn Any| inner(project_mut(any)?))
    }

    pub(crate) fn listener(&self, inner: ListenerFn) -> ListenerFn {
        let project_mut = self.project_mut.clone();
        Arc::new(move |listener: &dyn Any, entity: &mut dyn Any| inner(listener, project_mut(entity)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        hits: i64,
    }

    #[test]
    fn test_mutator_writer_keeps_instance() {
        let mutator: Mutator = Arc::new(|any: &mut dyn Any, value: DomainValue| {
            let counter = downcast_mut::<Counter>(any)?;
            counter.hits = match value {
                DomainValue::Long(v) => v,
                _ => 0,
            };
            Ok(())
        });

        let instance: Instance = Box::new(Counter::default());
        let instance = FieldWriter::Mutator(mutator)
            .apply(instance, DomainValue::Long(3))
            .unwrap();
        assert_eq!(downcast_instance::<Counter>(instance).unwrap().hits, 3);
    }

    #[test]
    fn test_downcast_reports_expected_type() {
        let err = downcast_ref::<Counter>(&5i32).unwrap_err();
        assert!(err.to_string().contains("Counter"));
    }
}
