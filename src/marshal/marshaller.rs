use std::any::Any;
use chrono::{DateTime, Utc};
use log::trace;
use uuid::Uuid;
use super::Intent;
use crate::core::{DeclaredType, DomainValue, Key, KeyId, MappingError, NativeEntity, Result, Value};
use crate::descriptor::{CallbackType, EmbeddedMode};
use crate::mapper::to_store_instant;
use crate::metadata::{
    EmbeddedMetadata, EntityMetadata, IdentifierType, PropertyMetadata, PropertyRole,
};

/// Writes objects of one class into native records.
pub struct Marshaller<'m> {
    metadata: &'m EntityMetadata,
    generate_string_ids: bool,
    now: DateTime<Utc>,
}

impl<'m> Marshaller<'m> {
    pub fn new(metadata: &'m EntityMetadata) -> Self {
        Self {
            metadata,
            generate_string_ids: true,
            now: to_store_instant(Utc::now()),
        }
    }

    /// Generate a UUID for unset string identifiers on insert.
    pub fn generate_string_ids(mut self, generate: bool) -> Self {
        self.generate_string_ids = generate;
        self
    }

    /// Instant written to audit timestamps, defaults to the creation time.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = to_store_instant(now);
        self
    }

    /// Fires the pre-write callback, then builds the record.
    ///
    /// Audit fields are computed into the record only; `entity` keeps its
    /// version and timestamps.
    pub fn marshal(&self, entity: &mut dyn Any, intent: Intent) -> Result<NativeEntity> {
        let meta = self.metadata;
        let callback = match intent {
            Intent::Insert => CallbackType::PreInsert,
            Intent::Update => CallbackType::PreUpdate,
            Intent::Upsert => {
                if meta.identifier.read(entity)?.is_some() {
                    CallbackType::PreUpdate
                } else {
                    CallbackType::PreInsert
                }
            }
        };
        meta.listeners.invoke(callback, entity)?;

        let object: &dyn Any = entity;
        let key = self.key(object, Some(intent))?;
        trace!("Marshalling {} as {}", meta.class_name, key);

        let mut record = NativeEntity::with_key(key);
        for property in &meta.properties {
            let value = self
                .property_value(property, object, intent)
                .map_err(|e| e.in_field(meta.class_name, &property.field_name))?;
            put(&mut record, property, value);
        }
        for embedded in &meta.embedded {
            write_embedded(meta.class_name, embedded, Some(object), &mut record)?;
        }
        Ok(record)
    }

    /// Key of `object` without side effects.
    ///
    /// An unset long identifier gives an incomplete key; an unset string
    /// identifier is an error since no name has been assigned yet.
    pub fn key_of(&self, object: &dyn Any) -> Result<Key> {
        self.key(object, None)
    }

    fn key(&self, object: &dyn Any, intent: Option<Intent>) -> Result<Key> {
        let meta = self.metadata;
        let missing = || MappingError::MissingIdentifier {
            class: meta.class_name.to_string(),
        };

        let id = meta
            .identifier
            .read(object)
            .map_err(|e| e.in_field(meta.class_name, &meta.identifier.field_name))?;
        let mut key = match id {
            Some(KeyId::Id(id)) => Key::with_id(meta.kind.as_str(), id),
            Some(KeyId::Name(name)) => Key::with_name(meta.kind.as_str(), name),
            None if intent == Some(Intent::Update) => return Err(missing()),
            None => match meta.identifier.id_type {
                IdentifierType::Long => Key::incomplete(meta.kind.as_str()),
                IdentifierType::String if intent.is_some() && self.generate_string_ids => {
                    Key::with_name(meta.kind.as_str(), Uuid::new_v4().to_string())
                }
                IdentifierType::String => return Err(missing()),
            },
        };

        if let Some(parent) = &meta.parent_key {
            match (parent.accessor)(object)? {
                DomainValue::Key(parent_key) => key = key.parent_key(parent_key),
                DomainValue::Null => {}
                other => {
                    return Err(MappingError::TypeMismatch(format!(
                        "parent key '{}' of {} produced a {} value",
                        parent.field_name,
                        meta.class_name,
                        other.kind_name()
                    )));
                }
            }
        }
        Ok(key)
    }

    fn property_value(&self, property: &PropertyMetadata, object: &dyn Any, intent: Intent) -> Result<Value> {
        let current = (property.accessor)(object)?;
        let value = match property.role {
            PropertyRole::Plain => current,
            PropertyRole::Version => next_version(current, intent)?,
            PropertyRole::CreatedTimestamp => match intent {
                Intent::Insert => self.timestamp(&property.field_type.declared)?,
                Intent::Upsert if is_unset(&current) => self.timestamp(&property.field_type.declared)?,
                _ => current,
            },
            PropertyRole::UpdatedTimestamp => self.timestamp(&property.field_type.declared)?,
        };
        property.mapper.to_store(value)
    }

    fn timestamp(&self, declared: &DeclaredType) -> Result<DomainValue> {
        match declared {
            DeclaredType::ZonedDateTime => Ok(DomainValue::ZonedDateTime(self.now)),
            DeclaredType::OffsetDateTime => Ok(DomainValue::OffsetDateTime(self.now.fixed_offset())),
            DeclaredType::LocalDateTime => Ok(DomainValue::LocalDateTime(self.now.naive_utc())),
            DeclaredType::Long => Ok(DomainValue::Long(self.now.timestamp_millis())),
            other => Err(MappingError::UnsupportedType(format!(
                "{} cannot hold an audit timestamp",
                other
            ))),
        }
    }
}

fn next_version(current: DomainValue, intent: Intent) -> Result<DomainValue> {
    match (intent, current) {
        (Intent::Insert, _) | (_, DomainValue::Null) => Ok(DomainValue::Long(1)),
        (_, DomainValue::Long(version)) => version
            .checked_add(1)
            .map(DomainValue::Long)
            .ok_or_else(|| MappingError::Conversion(format!("version {} cannot be incremented", version))),
        (_, other) => Err(MappingError::TypeMismatch(format!(
            "version produced a {} value",
            other.kind_name()
        ))),
    }
}

fn is_unset(value: &DomainValue) -> bool {
    matches!(value, DomainValue::Null | DomainValue::Long(0))
}

fn put(record: &mut NativeEntity, property: &PropertyMetadata, value: Value) {
    if value.is_null() && property.optional {
        return;
    }
    store(record, property, value);
}

fn store(record: &mut NativeEntity, property: &PropertyMetadata, value: Value) {
    if property.indexed {
        record.set(property.mapped_name.as_str(), value);
    } else {
        record.set_unindexed(property.mapped_name.as_str(), value);
    }
}

/// Writes one embedded field of `parent`. A missing parent writes nulls.
fn write_embedded(
    owner: &str,
    embedded: &EmbeddedMetadata,
    parent: Option<&dyn Any>,
    record: &mut NativeEntity,
) -> Result<()> {
    let object = match parent {
        Some(parent) => {
            (embedded.accessor)(parent).map_err(|e| e.in_field(owner, &embedded.field_name))?
        }
        None => None,
    };

    match embedded.mode {
        EmbeddedMode::Imploded => match object {
            None => {
                record.set(embedded.mapped_name.as_str(), Value::Null);
            }
            Some(object) => {
                let mut nested = NativeEntity::new();
                write_members(embedded, Some(object), &mut nested)?;
                record.set(embedded.mapped_name.as_str(), Value::Entity(nested));
            }
        },
        EmbeddedMode::Exploded => write_members(embedded, object, record)?,
    }
    Ok(())
}

fn write_members(embedded: &EmbeddedMetadata, object: Option<&dyn Any>, record: &mut NativeEntity) -> Result<()> {
    let class = embedded.class_name;
    for property in &embedded.properties {
        match object {
            Some(object) => {
                let value = (property.accessor)(object)
                    .and_then(|value| property.mapper.to_store(value))
                    .map_err(|e| e.in_field(class, &property.field_name))?;
                put(record, property, value);
            }
            None => store(record, property, Value::Null),
        }
    }
    for nested in &embedded.embedded {
        write_embedded(class, nested, object, record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::descriptor::{ClassDescriptor, Field, Persistent};
    use crate::mapper::MapperFactory;
    use crate::metadata::Introspector;

    #[derive(Default)]
    struct Ticket {
        id: i64,
        title: String,
        note: Option<String>,
        version: i64,
        created: Option<DateTime<Utc>>,
        touched: i64,
    }

    impl Persistent for Ticket {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::entity()
                .default_constructor()
                .field(Field::identifier("id").get(|t: &Ticket| t.id).set(|t: &mut Ticket, v| t.id = v))
                .field(Field::new("title").get(|t: &Ticket| t.title.clone()).set(|t: &mut Ticket, v| t.title = v))
                .field(
                    Field::new("note")
                        .get(|t: &Ticket| t.note.clone())
                        .set(|t: &mut Ticket, v| t.note = v)
                        .optional()
                        .indexed(false),
                )
                .field(Field::version("version").get(|t: &Ticket| t.version).set(|t: &mut Ticket, v| t.version = v))
                .field(
                    Field::created_timestamp("created")
                        .get(|t: &Ticket| t.created)
                        .set(|t: &mut Ticket, v| t.created = v),
                )
                .field(
                    Field::updated_timestamp("touched")
                        .get(|t: &Ticket| t.touched)
                        .set(|t: &mut Ticket, v| t.touched = v),
                )
        }
    }

    fn metadata() -> EntityMetadata {
        let factory = MapperFactory::new();
        Introspector::new(&factory, EmbeddedMode::Exploded)
            .introspect::<Ticket>()
            .unwrap()
    }

    #[test]
    fn test_insert_sets_audit_fields_in_record_only() {
        let meta = metadata();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut ticket = Ticket {
            title: "Broken build".into(),
            version: 7,
            ..Default::default()
        };

        let record = Marshaller::new(&meta).at(now).marshal(&mut ticket, Intent::Insert).unwrap();

        assert!(!record.key().unwrap().is_complete());
        assert_eq!(record.get_long("version").unwrap(), 1);
        assert_eq!(record.get_timestamp("created").unwrap(), now);
        assert_eq!(record.get_long("touched").unwrap(), now.timestamp_millis());
        assert!(!record.contains("note"));
        assert_eq!(ticket.version, 7);
        assert!(ticket.created.is_none());
    }

    #[test]
    fn test_update_increments_version_and_keeps_created() {
        let meta = metadata();
        let created = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut ticket = Ticket {
            id: 42,
            title: "Flaky test".into(),
            note: Some("seen twice".into()),
            version: 3,
            created: Some(created),
            ..Default::default()
        };

        let record = Marshaller::new(&meta).marshal(&mut ticket, Intent::Update).unwrap();

        assert_eq!(record.key().unwrap().id(), Some(42));
        assert_eq!(record.get_long("version").unwrap(), 4);
        assert_eq!(record.get_timestamp("created").unwrap(), created);
        assert!(!record.is_indexed("note"));
        assert!(record.is_indexed("title"));
    }

    #[test]
    fn test_update_without_identifier_fails() {
        let meta = metadata();
        let mut ticket = Ticket::default();
        let err = Marshaller::new(&meta).marshal(&mut ticket, Intent::Update).unwrap_err();
        assert!(matches!(err, MappingError::MissingIdentifier { .. }));
    }

    #[test]
    fn test_upsert_sets_missing_created_timestamp() {
        let meta = metadata();
        let mut ticket = Ticket {
            id: 5,
            version: 1,
            ..Default::default()
        };
        let record = Marshaller::new(&meta).marshal(&mut ticket, Intent::Upsert).unwrap();
        assert!(record.get_timestamp("created").is_ok());
        assert_eq!(record.get_long("version").unwrap(), 2);
    }

    #[test]
    fn test_version_overflow_is_reported_per_field() {
        let meta = metadata();
        let mut ticket = Ticket {
            id: 1,
            version: i64::MAX,
            ..Default::default()
        };
        let err = Marshaller::new(&meta).marshal(&mut ticket, Intent::Update).unwrap_err();
        assert!(matches!(err, MappingError::Field { ref field, .. } if field == "version"));
        assert!(matches!(err.root_cause(), MappingError::Conversion(_)));
    }
}
