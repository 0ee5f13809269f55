//! Capability tables
//!
//! Rust types describe their persistence shape with a [`ClassDescriptor`]
//! instead of being inspected at runtime. The derive macros in
//! `docmapper_derive` generate the same calls as a hand-written descriptor.
//!
//! - `class.rs` - class descriptor, builder specs, mapped superclasses
//! - `field.rs` - fields, identifier wrappers, embedded objects
//! - `listener.rs` - callback types, listener methods, external listeners
//! - `invoke.rs` - the type-erased closures everything is stored as

pub mod class;
pub mod field;
pub mod invoke;
pub mod listener;

pub use class::{BuilderSpec, ClassDescriptor, ClassRole, ClassShape};
pub use field::{Embedded, EmbeddedMode, Field, FieldRole, IdClass};
pub use invoke::{FieldWriter, Instance};
pub use listener::{
    CallbackType, Callable, EntityListener, ListenerDescriptor, ListenerMethod, ParamType,
};

use crate::core::DomainType;

/// A type that can be introspected: an entity, an embeddable or a mapped
/// superclass.
pub trait Persistent: Sized + Send + 'static {
    fn descriptor() -> ClassDescriptor<Self>;
}

/// A newtype used as an entity identifier.
pub trait IdWrapper: DomainType {
    type Scalar: DomainType;

    fn id_class() -> IdClass<Self, Self::Scalar>;
}
