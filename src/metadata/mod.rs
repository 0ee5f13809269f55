//! Entity metadata
//!
//! The validated, immutable persistence shape of one class. Built by the
//! [`Introspector`] from a class descriptor and shared as
//! `Arc<EntityMetadata>` through the [`MetadataCache`].

pub mod cache;
pub mod construction;
pub mod introspector;
pub mod listeners;

pub use cache::{CacheStats, MetadataCache};
pub use construction::ConstructionMetadata;
pub use introspector::Introspector;
pub use listeners::{BoundCallback, EntityListenersMetadata, ListenerMetadata};

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use crate::core::{DeclaredType, DomainValue, FieldType, KeyId, MappingError, Result};
use crate::descriptor::EmbeddedMode;
use crate::descriptor::field::{IdConstructor, IdReader};
use crate::descriptor::invoke::{Accessor, EmbeddedAccessor, FieldWriter};
use crate::mapper::Mapper;

/// Logical type of an identifier, as stored in the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierType {
    Long,
    String,
}

impl IdentifierType {
    pub(crate) fn of(declared: &DeclaredType) -> Option<Self> {
        match declared {
            DeclaredType::Long => Some(Self::Long),
            DeclaredType::Text => Some(Self::String),
            _ => None,
        }
    }
}

/// Reader and constructor of an identifier wrapper type.
#[derive(Clone)]
pub struct IdClassMetadata {
    pub(crate) wrapper_name: &'static str,
    pub(crate) scalar: IdentifierType,
    pub(crate) reader_name: String,
    pub(crate) constructor_name: String,
    pub(crate) reader: IdReader,
    pub(crate) constructor: IdConstructor,
}

impl IdClassMetadata {
    pub fn wrapper_name(&self) -> &'static str {
        self.wrapper_name
    }

    pub fn scalar_type(&self) -> IdentifierType {
        self.scalar
    }

    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    pub fn constructor_name(&self) -> &str {
        &self.constructor_name
    }

    /// Unwraps a boxed wrapper to its scalar.
    pub(crate) fn unwrap_value(&self, value: DomainValue) -> Result<DomainValue> {
        match value {
            DomainValue::Object(wrapper) => (self.reader)(&*wrapper),
            other => Ok(other),
        }
    }

    pub(crate) fn wrap_value(&self, scalar: DomainValue) -> Result<DomainValue> {
        (self.constructor)(scalar)
    }
}

impl fmt::Debug for IdClassMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdClassMetadata")
            .field("wrapper", &self.wrapper_name)
            .field("scalar", &self.scalar)
            .field("reader", &self.reader_name)
            .field("constructor", &self.constructor_name)
            .finish()
    }
}

#[derive(Clone)]
pub struct IdentifierMetadata {
    pub(crate) field_name: String,
    pub(crate) field_type: FieldType,
    pub(crate) id_type: IdentifierType,
    pub(crate) id_class: Option<IdClassMetadata>,
    pub(crate) accessor: Accessor,
    pub(crate) writer: FieldWriter,
}

impl IdentifierMetadata {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn identifier_type(&self) -> IdentifierType {
        self.id_type
    }

    pub fn id_class(&self) -> Option<&IdClassMetadata> {
        self.id_class.as_ref()
    }

    /// Current identifier of `object`, `None` while unset.
    ///
    /// A long identifier of `0` and an empty string count as unset.
    pub(crate) fn read(&self, object: &dyn Any) -> Result<Option<KeyId>> {
        let mut value = (self.accessor)(object)?;
        if let Some(id_class) = &self.id_class {
            value = id_class.unwrap_value(value)?;
        }
        match value {
            DomainValue::Null | DomainValue::Long(0) => Ok(None),
            DomainValue::Long(id) => Ok(Some(KeyId::Id(id))),
            DomainValue::Text(name) if name.is_empty() => Ok(None),
            DomainValue::Text(name) => Ok(Some(KeyId::Name(name))),
            other => Err(MappingError::TypeMismatch(format!(
                "identifier '{}' produced a {} value",
                self.field_name,
                other.kind_name()
            ))),
        }
    }

    /// Domain value of the identifier field for a key id.
    pub(crate) fn domain_value(&self, id: &KeyId) -> Result<DomainValue> {
        let scalar = match (self.id_type, id) {
            (IdentifierType::Long, KeyId::Id(id)) => DomainValue::Long(*id),
            (IdentifierType::String, KeyId::Name(name)) => DomainValue::Text(name.clone()),
            (expected, found) => {
                return Err(MappingError::Conversion(format!(
                    "key id {} does not match {:?} identifier '{}'",
                    found, expected, self.field_name
                )));
            }
        };
        match &self.id_class {
            Some(id_class) => id_class.wrap_value(scalar),
            None => Ok(scalar),
        }
    }
}

impl fmt::Debug for IdentifierMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierMetadata")
            .field("field", &self.field_name)
            .field("type", &self.id_type)
            .field("id_class", &self.id_class)
            .finish()
    }
}

/// Role of a property in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRole {
    Plain,
    Version,
    CreatedTimestamp,
    UpdatedTimestamp,
}

#[derive(Clone)]
pub struct PropertyMetadata {
    pub(crate) field_name: String,
    pub(crate) mapped_name: String,
    pub(crate) field_type: FieldType,
    pub(crate) mapper: Arc<dyn Mapper>,
    pub(crate) optional: bool,
    pub(crate) indexed: bool,
    pub(crate) role: PropertyRole,
    pub(crate) accessor: Accessor,
    pub(crate) writer: FieldWriter,
}

impl PropertyMetadata {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Property name in the record. Exploded embedded properties carry their prefix.
    pub fn mapped_name(&self) -> &str {
        &self.mapped_name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn mapper(&self) -> &Arc<dyn Mapper> {
        &self.mapper
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn role(&self) -> PropertyRole {
        self.role
    }
}

impl fmt::Debug for PropertyMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("field", &self.field_name)
            .field("mapped_name", &self.mapped_name)
            .field("type", &self.field_type)
            .field("mapper", &self.mapper.name())
            .field("optional", &self.optional)
            .field("indexed", &self.indexed)
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Clone)]
pub struct ParentKeyMetadata {
    pub(crate) field_name: String,
    pub(crate) accessor: Accessor,
    pub(crate) writer: FieldWriter,
}

impl ParentKeyMetadata {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

#[derive(Clone)]
pub struct EmbeddedMetadata {
    pub(crate) field_name: String,
    pub(crate) mapped_name: String,
    pub(crate) class_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) mode: EmbeddedMode,
    pub(crate) nullable: bool,
    pub(crate) accessor: EmbeddedAccessor,
    pub(crate) writer: FieldWriter,
    pub(crate) properties: Vec<PropertyMetadata>,
    pub(crate) embedded: Vec<EmbeddedMetadata>,
    pub(crate) construction: ConstructionMetadata,
}

impl EmbeddedMetadata {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Record property of an imploded object, or the prefix of an exploded one.
    pub fn mapped_name(&self) -> &str {
        &self.mapped_name
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn mode(&self) -> EmbeddedMode {
        self.mode
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    pub fn property(&self, mapped_name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.mapped_name == mapped_name)
    }

    pub fn embedded(&self) -> &[EmbeddedMetadata] {
        &self.embedded
    }

    pub fn construction(&self) -> &ConstructionMetadata {
        &self.construction
    }

    /// Record names of all exploded descendants.
    pub(crate) fn exploded_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        if self.mode == EmbeddedMode::Imploded {
            names.push(&self.mapped_name);
            return names;
        }
        names.extend(self.properties.iter().map(|p| p.mapped_name.as_str()));
        for nested in &self.embedded {
            names.extend(nested.exploded_names());
        }
        names
    }
}

impl fmt::Debug for EmbeddedMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedMetadata")
            .field("field", &self.field_name)
            .field("mapped_name", &self.mapped_name)
            .field("class", &self.class_name)
            .field("mode", &self.mode)
            .field("nullable", &self.nullable)
            .field("properties", &self.properties)
            .field("embedded", &self.embedded)
            .field("construction", &self.construction)
            .finish()
    }
}

/// Persistence shape of one entity class.
#[derive(Clone)]
pub struct EntityMetadata {
    pub(crate) class_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) kind: String,
    pub(crate) identifier: IdentifierMetadata,
    pub(crate) parent_key: Option<ParentKeyMetadata>,
    pub(crate) properties: Vec<PropertyMetadata>,
    pub(crate) embedded: Vec<EmbeddedMetadata>,
    pub(crate) construction: ConstructionMetadata,
    pub(crate) listeners: EntityListenersMetadata,
}

impl EntityMetadata {
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn identifier(&self) -> &IdentifierMetadata {
        &self.identifier
    }

    pub fn parent_key(&self) -> Option<&ParentKeyMetadata> {
        self.parent_key.as_ref()
    }

    /// Properties in declaration order, audit properties included.
    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    pub fn property(&self, mapped_name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.mapped_name == mapped_name)
    }

    pub fn version(&self) -> Option<&PropertyMetadata> {
        self.with_role(PropertyRole::Version)
    }

    pub fn created_timestamp(&self) -> Option<&PropertyMetadata> {
        self.with_role(PropertyRole::CreatedTimestamp)
    }

    pub fn updated_timestamp(&self) -> Option<&PropertyMetadata> {
        self.with_role(PropertyRole::UpdatedTimestamp)
    }

    fn with_role(&self, role: PropertyRole) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.role == role)
    }

    pub fn embedded(&self) -> &[EmbeddedMetadata] {
        &self.embedded
    }

    pub fn embedded_field(&self, field_name: &str) -> Option<&EmbeddedMetadata> {
        self.embedded.iter().find(|e| e.field_name == field_name)
    }

    pub fn construction(&self) -> &ConstructionMetadata {
        &self.construction
    }

    pub fn listeners(&self) -> &EntityListenersMetadata {
        &self.listeners
    }
}

impl fmt::Debug for EntityMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMetadata")
            .field("class", &self.class_name)
            .field("kind", &self.kind)
            .field("identifier", &self.identifier)
            .field("properties", &self.properties)
            .field("embedded", &self.embedded)
            .field("construction", &self.construction)
            .field("listeners", &self.listeners)
            .finish()
    }
}
