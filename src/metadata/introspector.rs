//! Builds [`EntityMetadata`] from a class descriptor.
//!
//! The introspector lifts mapped superclasses into the class, validates
//! identifier, audit fields and embedded graphs, resolves a mapper per
//! property, picks the construction strategy and binds callbacks. Any failure
//! aborts the whole class.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;
use log::debug;
use super::construction::{self, ConstructionMetadata, Member};
use super::listeners::{self, EntityListenersMetadata};
use super::*;
use crate::core::{DeclaredType, MappingError, Result};
use crate::descriptor::class::{ClassRole, ClassShape, shape_of};
use crate::descriptor::field::{EmbeddedDescriptor, FieldDescriptor, FieldRole, IdClassDescriptor};
use crate::descriptor::invoke::{Accessor, EmbeddedAccessor, FieldWriter, Mutator};
use crate::descriptor::listener::{Callable, ListenerDescriptor, ListenerMethod};
use crate::descriptor::{EmbeddedMode, Persistent};
use crate::mapper::{DecimalMapper, Mapper, MapperFactory};

pub struct Introspector<'a> {
    factory: &'a MapperFactory,
    default_mode: EmbeddedMode,
}

/// Fields and callbacks contributed by mapped superclasses.
#[derive(Default)]
struct Inherited {
    fields: Vec<FieldDescriptor>,
    embedded: Vec<EmbeddedDescriptor>,
    callbacks: Vec<ListenerMethod>,
    listeners: Vec<ListenerDescriptor>,
}

/// Where an embedded object's properties land.
#[derive(Clone, Copy)]
struct Placement<'p> {
    prefix: Option<&'p str>,
    inside_imploded: bool,
}

struct PendingIdentifier {
    field_name: String,
    field_type: crate::core::FieldType,
    id_type: IdentifierType,
    id_class: Option<IdClassMetadata>,
    accessor: Accessor,
    mutator: Option<Mutator>,
}

struct PendingProperty {
    field_name: String,
    mapped_name: String,
    field_type: crate::core::FieldType,
    mapper: Arc<dyn Mapper>,
    optional: bool,
    indexed: bool,
    role: PropertyRole,
    accessor: Accessor,
    mutator: Option<Mutator>,
}

struct PendingEmbedded {
    field_name: String,
    mapped_name: String,
    class_name: &'static str,
    type_id: TypeId,
    mode: EmbeddedMode,
    nullable: bool,
    accessor: EmbeddedAccessor,
    mutator: Option<Mutator>,
    properties: Vec<PropertyMetadata>,
    embedded: Vec<EmbeddedMetadata>,
    construction: ConstructionMetadata,
}

/// A persisted member waiting for its writer.
enum Pending {
    Identifier(PendingIdentifier),
    Property(PendingProperty),
    ParentKey {
        field_name: String,
        accessor: Accessor,
        mutator: Option<Mutator>,
    },
    Embedded(PendingEmbedded),
}

impl Pending {
    fn name(&self) -> &str {
        match self {
            Self::Identifier(id) => &id.field_name,
            Self::Property(p) => &p.field_name,
            Self::ParentKey { field_name, .. } => field_name,
            Self::Embedded(e) => &e.field_name,
        }
    }

    fn mutator(&self) -> Option<Mutator> {
        match self {
            Self::Identifier(id) => id.mutator.clone(),
            Self::Property(p) => p.mutator.clone(),
            Self::ParentKey { mutator, .. } => mutator.clone(),
            Self::Embedded(e) => e.mutator.clone(),
        }
    }
}

/// Resolved members of one class, split by kind.
#[derive(Default)]
struct Members {
    identifier: Option<IdentifierMetadata>,
    parent_key: Option<ParentKeyMetadata>,
    properties: Vec<PropertyMetadata>,
    embedded: Vec<EmbeddedMetadata>,
}

impl<'a> Introspector<'a> {
    pub fn new(factory: &'a MapperFactory, default_mode: EmbeddedMode) -> Self {
        Self {
            factory,
            default_mode,
        }
    }

    pub fn introspect<T: Persistent>(&self) -> Result<EntityMetadata> {
        self.introspect_shape(shape_of::<T>())
    }

    pub fn introspect_shape(&self, shape: ClassShape) -> Result<EntityMetadata> {
        let class = shape.class_name;
        debug!("Introspecting entity {}", class);

        if shape.role != ClassRole::Entity {
            return Err(MappingError::UnsupportedType(format!(
                "{} is not an entity",
                class
            )));
        }

        let inherited = self.inherited(&shape)?;
        let fields: Vec<FieldDescriptor> =
            inherited.fields.into_iter().chain(shape.fields.iter().cloned()).collect();
        let embedded: Vec<EmbeddedDescriptor> =
            inherited.embedded.into_iter().chain(shape.embedded.iter().cloned()).collect();

        let mut identifier: Option<FieldDescriptor> = None;
        let mut parent_key: Option<FieldDescriptor> = None;
        let mut seen_roles: Vec<(FieldRole, String)> = Vec::new();
        let mut pending: Vec<Pending> = Vec::new();

        for field in fields {
            match field.role {
                FieldRole::Identifier => {
                    if let Some(first) = &identifier {
                        return Err(MappingError::InvalidIdentifier {
                            class: class.to_string(),
                            reason: format!(
                                "more than one identifier field ('{}' and '{}')",
                                first.name, field.name
                            ),
                        });
                    }
                    identifier = Some(field);
                }
                FieldRole::ParentKey => {
                    check_single(class, &mut seen_roles, &field)?;
                    parent_key = Some(field);
                }
                FieldRole::Property => {
                    pending.push(Pending::Property(self.property(class, field, None)?));
                }
                _ => {
                    check_single(class, &mut seen_roles, &field)?;
                    pending.push(Pending::Property(self.property(class, field, None)?));
                }
            }
        }

        let identifier = identifier.ok_or_else(|| MappingError::InvalidIdentifier {
            class: class.to_string(),
            reason: "no identifier field declared".into(),
        })?;
        pending.insert(0, Pending::Identifier(self.identifier(class, identifier)?));

        if let Some(field) = parent_key {
            if field.field_type.declared != DeclaredType::Key {
                return Err(MappingError::UnsupportedType(format!(
                    "parent key field '{}' of {} must be a Key, found {}",
                    field.name, class, field.field_type
                )));
            }
            pending.push(Pending::ParentKey {
                accessor: require_accessor(class, &field.name, field.accessor.clone())?,
                mutator: field.mutator,
                field_name: field.name,
            });
        }

        let mut stack = vec![(shape.type_id, class)];
        let top_level = Placement {
            prefix: None,
            inside_imploded: false,
        };
        for desc in embedded {
            pending.push(Pending::Embedded(self.embedded(class, desc, top_level, &mut stack)?));
        }

        let (construction, members) = self.construct(&shape, pending)?;
        let identifier = members.identifier.ok_or_else(|| MappingError::InvalidIdentifier {
            class: class.to_string(),
            reason: "no identifier field declared".into(),
        })?;

        check_unique(class, record_names(&members.properties, &members.embedded))?;

        let declared: Vec<ListenerDescriptor> =
            inherited.listeners.into_iter().chain(shape.listeners.iter().cloned()).collect();
        let mut external = Vec::with_capacity(declared.len());
        for (index, listener) in declared.iter().enumerate() {
            if declared[..index].iter().any(|l| l.type_id == listener.type_id) {
                return Err(MappingError::InvalidListener {
                    class: listener.class_name.to_string(),
                    reason: format!("registered more than once for {}", class),
                });
            }
            external.push(listeners::introspect_external(class, shape.type_id, listener)?);
        }
        let internal =
            listeners::introspect_internal(class, shape.type_id, inherited.callbacks, shape.callbacks)?;

        let metadata = EntityMetadata {
            class_name: class,
            type_id: shape.type_id,
            kind: shape.kind.unwrap_or_else(|| class.to_string()),
            identifier,
            parent_key: members.parent_key,
            properties: members.properties,
            embedded: members.embedded,
            construction,
            listeners: EntityListenersMetadata { external, internal },
        };
        debug!(
            "Introspected {} as kind '{}' with {} properties and {} embedded fields",
            class,
            metadata.kind,
            metadata.properties.len(),
            metadata.embedded.len()
        );
        Ok(metadata)
    }

    /// Collects superclass contributions, lifted onto `shape`'s type.
    fn inherited(&self, shape: &ClassShape) -> Result<Inherited> {
        let mut chain = vec![(shape.type_id, shape.class_name)];
        self.inherited_along(shape, &mut chain)
    }

    /// `chain` holds the classes from the introspected one down to `shape`.
    fn inherited_along(
        &self,
        shape: &ClassShape,
        chain: &mut Vec<(TypeId, &'static str)>,
    ) -> Result<Inherited> {
        let mut out = Inherited::default();
        for superclass in &shape.superclasses {
            if chain.iter().any(|(type_id, _)| *type_id == superclass.type_id) {
                let mut path: Vec<&str> = chain.iter().map(|(_, name)| *name).collect();
                path.push(superclass.class_name);
                return Err(MappingError::CyclicInheritance {
                    path: path.join(" -> "),
                });
            }

            let base = (superclass.shape)();
            if base.role != ClassRole::MappedSuperclass {
                return Err(MappingError::UnsupportedType(format!(
                    "{} inherits {}, which is not a mapped superclass",
                    shape.class_name, superclass.class_name
                )));
            }

            chain.push((superclass.type_id, superclass.class_name));
            let nested = self.inherited_along(&base, chain);
            chain.pop();
            let nested = nested?;

            let lift = &superclass.lift;
            out.fields.extend(
                nested.fields.into_iter().chain(base.fields).map(|f| f.lifted(lift)),
            );
            out.embedded.extend(
                nested.embedded.into_iter().chain(base.embedded).map(|e| e.lifted(lift)),
            );
            out.listeners.extend(
                nested
                    .listeners
                    .into_iter()
                    .chain(base.listeners)
                    .map(|l| l.lifted(superclass.type_id, shape.type_id, shape.class_name, lift)),
            );

            let overridden: HashSet<String> =
                base.callbacks.iter().map(|m| m.name.clone()).collect();
            let base_callbacks: Vec<ListenerMethod> = nested
                .callbacks
                .into_iter()
                .filter(|m| !overridden.contains(&m.name))
                .chain(base.callbacks)
                .collect();
            for method in base_callbacks {
                let callable = match method.callable {
                    Callable::Receiver {
                        owner,
                        owner_name,
                        invoke,
                    } if owner == superclass.type_id => Callable::Receiver {
                        owner: shape.type_id,
                        owner_name,
                        invoke: lift.receiver(invoke),
                    },
                    other => other,
                };
                out.callbacks.push(ListenerMethod { callable, ..method });
            }
        }
        Ok(out)
    }

    fn identifier(&self, class: &str, field: FieldDescriptor) -> Result<PendingIdentifier> {
        let invalid = |reason: String| MappingError::InvalidIdentifier {
            class: class.to_string(),
            reason,
        };

        let (id_type, id_class) = match &field.id_class {
            None => {
                let id_type = IdentifierType::of(&field.field_type.declared).ok_or_else(|| {
                    invalid(format!(
                        "identifier '{}' has unsupported type {}",
                        field.name, field.field_type
                    ))
                })?;
                (id_type, None)
            }
            Some(id_class) => {
                let wraps_field = matches!(
                    &field.field_type.declared,
                    DeclaredType::Custom { type_id, .. } if *type_id == id_class.wrapper
                );
                if !wraps_field {
                    return Err(invalid(format!(
                        "identifier '{}' of type {} is not the wrapper {}",
                        field.name, field.field_type, id_class.wrapper_name
                    )));
                }
                let metadata = id_class_metadata(id_class).map_err(invalid)?;
                (metadata.scalar, Some(metadata))
            }
        };

        Ok(PendingIdentifier {
            accessor: require_accessor(class, &field.name, field.accessor.clone())?,
            mutator: field.mutator,
            field_name: field.name,
            field_type: field.field_type,
            id_type,
            id_class,
        })
    }

    fn property(
        &self,
        class: &str,
        field: FieldDescriptor,
        prefix: Option<&str>,
    ) -> Result<PendingProperty> {
        let role = match field.role {
            FieldRole::Version => PropertyRole::Version,
            FieldRole::CreatedTimestamp => PropertyRole::CreatedTimestamp,
            FieldRole::UpdatedTimestamp => PropertyRole::UpdatedTimestamp,
            _ => PropertyRole::Plain,
        };

        let declared = &field.field_type.declared;
        let type_ok = match role {
            PropertyRole::Plain => true,
            PropertyRole::Version => *declared == DeclaredType::Long,
            PropertyRole::CreatedTimestamp | PropertyRole::UpdatedTimestamp => matches!(
                declared,
                DeclaredType::ZonedDateTime
                    | DeclaredType::OffsetDateTime
                    | DeclaredType::LocalDateTime
                    | DeclaredType::Long
            ),
        };
        if !type_ok {
            return Err(MappingError::UnsupportedType(format!(
                "{} field '{}' of {} cannot have type {}",
                field.role.name(),
                field.name,
                class,
                field.field_type
            )));
        }

        let mapper = self.mapper_for(class, &field)?;
        let base_name = field.property_name.clone().unwrap_or_else(|| field.name.clone());
        let mapped_name = match prefix {
            Some(prefix) => format!("{}_{}", prefix, base_name),
            None => base_name,
        };

        Ok(PendingProperty {
            accessor: require_accessor(class, &field.name, field.accessor.clone())?,
            mutator: field.mutator,
            optional: field.optional && field.field_type.nullable && role == PropertyRole::Plain,
            indexed: field.indexed,
            field_name: field.name,
            mapped_name,
            field_type: field.field_type,
            mapper,
            role,
        })
    }

    /// Field mapper, then fixed-point decimal, then the factory.
    fn mapper_for(&self, class: &str, field: &FieldDescriptor) -> Result<Arc<dyn Mapper>> {
        if let Some(mapper) = &field.mapper {
            return Ok(mapper.clone());
        }

        if let Some((precision, scale)) = field.decimal {
            if field.field_type.declared != DeclaredType::Decimal {
                return Err(MappingError::UnsupportedType(format!(
                    "precision and scale declared on non-decimal field '{}' of {}",
                    field.name, class
                )));
            }
            return DecimalMapper::new(precision, scale)
                .map(|m| Arc::new(m) as Arc<dyn Mapper>)
                .map_err(|e| e.in_field(class, &field.name));
        }

        self.factory
            .resolve(&field.field_type.declared)?
            .ok_or_else(|| MappingError::NoSuitableMapper {
                class: class.to_string(),
                field: field.name.clone(),
                type_name: field.field_type.to_string(),
            })
    }

    fn embedded(
        &self,
        owner: &str,
        desc: EmbeddedDescriptor,
        placement: Placement<'_>,
        stack: &mut Vec<(TypeId, &'static str)>,
    ) -> Result<PendingEmbedded> {
        if stack.iter().any(|(type_id, _)| *type_id == desc.type_id) {
            let mut path: Vec<&str> = stack.iter().map(|(_, name)| *name).collect();
            path.push(desc.class_name);
            return Err(MappingError::CyclicEmbedding {
                path: path.join(" -> "),
            });
        }

        let shape = (desc.shape)();
        if shape.role != ClassRole::Embeddable {
            return Err(MappingError::UnsupportedType(format!(
                "{} embedded in {} as '{}' is not embeddable",
                shape.class_name, owner, desc.name
            )));
        }

        let base_name = desc.property_name.clone().unwrap_or_else(|| desc.name.clone());
        let mapped_name = match placement.prefix {
            Some(prefix) => format!("{}_{}", prefix, base_name),
            None => base_name,
        };
        let mode = if placement.inside_imploded {
            EmbeddedMode::Imploded
        } else {
            desc.mode.unwrap_or(self.default_mode)
        };
        let accessor = desc.accessor.clone().ok_or_else(|| MappingError::MissingAccessor {
            class: owner.to_string(),
            field: desc.name.clone(),
        })?;

        let child = match mode {
            EmbeddedMode::Exploded => Placement {
                prefix: Some(&mapped_name),
                inside_imploded: false,
            },
            EmbeddedMode::Imploded => Placement {
                prefix: None,
                inside_imploded: true,
            },
        };

        stack.push((desc.type_id, desc.class_name));
        let built = self.embeddable(shape, child, stack);
        stack.pop();
        let (construction, members) = built?;

        if mode == EmbeddedMode::Imploded {
            check_unique(desc.class_name, record_names(&members.properties, &members.embedded))?;
        }

        Ok(PendingEmbedded {
            field_name: desc.name,
            mapped_name,
            class_name: desc.class_name,
            type_id: desc.type_id,
            mode,
            nullable: desc.nullable,
            accessor,
            mutator: desc.mutator,
            properties: members.properties,
            embedded: members.embedded,
            construction,
        })
    }

    fn embeddable(
        &self,
        shape: ClassShape,
        placement: Placement<'_>,
        stack: &mut Vec<(TypeId, &'static str)>,
    ) -> Result<(ConstructionMetadata, Members)> {
        let class = shape.class_name;
        let inherited = self.inherited(&shape)?;

        if let Some(method) = inherited.callbacks.iter().chain(&shape.callbacks).next() {
            return Err(MappingError::InvalidListenerMethod {
                class: class.to_string(),
                method: method.name.clone(),
                reason: "embeddable classes have no lifecycle callbacks".into(),
            });
        }
        if let Some(listener) = inherited.listeners.iter().chain(&shape.listeners).next() {
            return Err(MappingError::InvalidListener {
                class: listener.class_name.to_string(),
                reason: format!("embeddable {} has no lifecycle callbacks", class),
            });
        }

        let mut pending: Vec<Pending> = Vec::new();
        for field in inherited.fields.into_iter().chain(shape.fields.iter().cloned()) {
            if field.role != FieldRole::Property {
                return Err(MappingError::UnsupportedType(format!(
                    "embeddable {} cannot declare {} field '{}'",
                    class,
                    field.role.name(),
                    field.name
                )));
            }
            pending.push(Pending::Property(self.property(class, field, placement.prefix)?));
        }
        for desc in inherited.embedded.into_iter().chain(shape.embedded.iter().cloned()) {
            pending.push(Pending::Embedded(self.embedded(class, desc, placement, stack)?));
        }

        self.construct(&shape, pending)
    }

    /// Resolves the construction strategy and hands every member its writer.
    fn construct(
        &self,
        shape: &ClassShape,
        pending: Vec<Pending>,
    ) -> Result<(ConstructionMetadata, Members)> {
        let resolver_members: Vec<Member> = pending
            .iter()
            .map(|p| Member {
                name: p.name().to_string(),
                mutator: p.mutator(),
            })
            .collect();
        let (construction, writers) = construction::resolve(
            shape.class_name,
            &shape.constructors,
            shape.builder.as_ref(),
            &resolver_members,
        )?;

        let mut members = Members::default();
        for (member, writer) in pending.into_iter().zip(writers) {
            match member {
                Pending::Identifier(id) => {
                    members.identifier = Some(IdentifierMetadata {
                        field_name: id.field_name,
                        field_type: id.field_type,
                        id_type: id.id_type,
                        id_class: id.id_class,
                        accessor: id.accessor,
                        writer,
                    });
                }
                Pending::Property(p) => members.properties.push(PropertyMetadata {
                    field_name: p.field_name,
                    mapped_name: p.mapped_name,
                    field_type: p.field_type,
                    mapper: p.mapper,
                    optional: p.optional,
                    indexed: p.indexed,
                    role: p.role,
                    accessor: p.accessor,
                    writer,
                }),
                Pending::ParentKey {
                    field_name,
                    accessor,
                    ..
                } => {
                    members.parent_key = Some(ParentKeyMetadata {
                        field_name,
                        accessor,
                        writer,
                    });
                }
                Pending::Embedded(e) => members.embedded.push(EmbeddedMetadata {
                    field_name: e.field_name,
                    mapped_name: e.mapped_name,
                    class_name: e.class_name,
                    type_id: e.type_id,
                    mode: e.mode,
                    nullable: e.nullable,
                    accessor: e.accessor,
                    writer,
                    properties: e.properties,
                    embedded: e.embedded,
                    construction: e.construction,
                }),
            }
        }
        Ok((construction, members))
    }
}

fn id_class_metadata(id_class: &IdClassDescriptor) -> std::result::Result<IdClassMetadata, String> {
    let scalar = match &id_class.scalar.declared {
        DeclaredType::Long => IdentifierType::Long,
        DeclaredType::Text => IdentifierType::String,
        other => {
            return Err(format!(
                "wrapper {} wraps unsupported type {}",
                id_class.wrapper_name, other
            ));
        }
    };

    let (reader_name, reader) = exactly_one(id_class.wrapper_name, "reader", &id_class.readers)?;
    let (constructor_name, constructor) =
        exactly_one(id_class.wrapper_name, "constructor", &id_class.constructors)?;

    Ok(IdClassMetadata {
        wrapper_name: id_class.wrapper_name,
        scalar,
        reader_name,
        constructor_name,
        reader,
        constructor,
    })
}

fn exactly_one<F: Clone>(
    wrapper: &str,
    what: &str,
    declared: &[(String, F)],
) -> std::result::Result<(String, F), String> {
    match declared {
        [(name, f)] => Ok((name.clone(), f.clone())),
        [] => Err(format!("wrapper {} declares no {}", wrapper, what)),
        many => Err(format!(
            "wrapper {} declares {} {}s, expected exactly one",
            wrapper,
            many.len(),
            what
        )),
    }
}

fn require_accessor(class: &str, field: &str, accessor: Option<Accessor>) -> Result<Accessor> {
    accessor.ok_or_else(|| MappingError::MissingAccessor {
        class: class.to_string(),
        field: field.to_string(),
    })
}

fn check_single(
    class: &str,
    seen: &mut Vec<(FieldRole, String)>,
    field: &FieldDescriptor,
) -> Result<()> {
    if let Some((_, first)) = seen.iter().find(|(role, _)| *role == field.role) {
        return Err(MappingError::DuplicateField {
            class: class.to_string(),
            role: field.role.name().to_string(),
            first: first.clone(),
            second: field.name.clone(),
        });
    }
    seen.push((field.role, field.name.clone()));
    Ok(())
}

/// Names a record holds: own properties, exploded descendants and imploded records.
fn record_names<'m>(
    properties: &'m [PropertyMetadata],
    embedded: &'m [EmbeddedMetadata],
) -> Vec<&'m str> {
    let mut names: Vec<&str> = properties.iter().map(|p| p.mapped_name.as_str()).collect();
    for e in embedded {
        names.extend(e.exploded_names());
    }
    names
}

fn check_unique(class: &str, names: Vec<&str>) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name) {
            return Err(MappingError::DuplicatePropertyName {
                class: class.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
