// ============================================================================
// docmapper
// ============================================================================

//! Metadata-driven mapping between Rust domain types and schemaless
//! document-store records.
//!
//! Types declare their persistence shape once, either by hand through a
//! [`ClassDescriptor`] or with the derive macros. The [`EntityMapper`]
//! validates that declaration into cached [`EntityMetadata`] and uses it to
//! convert objects to [`NativeEntity`] records and back.
//!
//! ```
//! use docmapper::{Embeddable, Entity, EntityMapper, Intent};
//!
//! #[derive(Embeddable, Default, Clone, Debug, PartialEq)]
//! struct Address {
//!     city: String,
//!     zip: String,
//! }
//!
//! #[derive(Entity, Default, Debug, PartialEq)]
//! #[entity(kind = "Contact")]
//! struct Contact {
//!     #[identifier]
//!     id: i64,
//!     name: String,
//!     #[embedded(name = "homeAddress", imploded)]
//!     home_address: Option<Address>,
//! }
//!
//! let mapper = EntityMapper::new();
//! let mut contact = Contact {
//!     id: 1,
//!     name: "Ada".into(),
//!     home_address: Some(Address { city: "London".into(), zip: "NW1".into() }),
//! };
//!
//! let record = mapper.marshal(&mut contact, Intent::Update)?;
//! assert_eq!(record.get_entity("homeAddress")?.get_string("zip")?, "NW1");
//!
//! let loaded: Contact = mapper.unmarshal(&record)?;
//! assert_eq!(loaded, contact);
//! # Ok::<(), docmapper::MappingError>(())
//! ```

extern crate self as docmapper;

pub mod config;
pub mod core;
pub mod descriptor;
pub mod facade;
pub mod mapper;
pub mod marshal;
pub mod metadata;

// Re-export main types for convenience
pub use config::MapperConfig;
pub use core::{
    DeclaredType, DomainType, DomainValue, FieldType, Key, KeyId, MappingError, NativeEntity,
    Result, Value, ValueType,
};
pub use descriptor::{
    BuilderSpec, CallbackType, ClassDescriptor, Embedded, EmbeddedMode, EntityListener, Field,
    IdClass, IdWrapper, ListenerDescriptor, ListenerMethod, Persistent,
};
pub use facade::EntityMapper;
pub use mapper::{Mapper, MapperFactory};
pub use marshal::Intent;
pub use metadata::{CacheStats, EntityMetadata, MetadataCache};

// Re-export derive macros
pub use docmapper_derive::{Embeddable, Entity, IdWrapper, MappedSuperclass};
