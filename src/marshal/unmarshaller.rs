use log::trace;
use crate::core::{DomainValue, NativeEntity, Result, Value, ValueType};
use crate::descriptor::{CallbackType, EmbeddedMode, Instance};
use crate::metadata::{EmbeddedMetadata, EntityMetadata, PropertyMetadata};

static NULL: Value = Value::Null;

/// Rebuilds objects of one class from native records.
pub struct Unmarshaller<'m> {
    metadata: &'m EntityMetadata,
}

impl<'m> Unmarshaller<'m> {
    pub fn new(metadata: &'m EntityMetadata) -> Self {
        Self { metadata }
    }

    /// Builds the object and fires its post-load callbacks.
    pub fn unmarshal(&self, record: &NativeEntity) -> Result<Instance> {
        let meta = self.metadata;
        let class = meta.class_name;
        let mut target = meta.construction.instantiate();

        if let Some(key) = record.key() {
            trace!("Unmarshalling {} from {}", class, key);
            if let Some(id) = key.key_id() {
                let identifier = &meta.identifier;
                target = identifier
                    .domain_value(id)
                    .and_then(|value| identifier.writer.apply(target, value))
                    .map_err(|e| e.in_field(class, &identifier.field_name))?;
            }
            if let (Some(parent_key), Some(parent)) = (&meta.parent_key, key.parent()) {
                target = parent_key
                    .writer
                    .apply(target, DomainValue::Key(parent.clone()))
                    .map_err(|e| e.in_field(class, &parent_key.field_name))?;
            }
        }

        target = read_members(class, &meta.properties, &meta.embedded, record, target)?;
        let mut object = meta.construction.finish(target)?;
        meta.listeners.invoke(CallbackType::PostLoad, &mut *object)?;
        Ok(object)
    }
}

fn read_members(
    class: &str,
    properties: &[PropertyMetadata],
    embedded: &[EmbeddedMetadata],
    source: &NativeEntity,
    mut target: Instance,
) -> Result<Instance> {
    for property in properties {
        let value = source.get(&property.mapped_name).unwrap_or(&NULL);
        if value.is_null() && !property.field_type.nullable {
            continue;
        }
        target = property
            .mapper
            .to_domain(value)
            .and_then(|domain| property.writer.apply(target, domain))
            .map_err(|e| e.in_field(class, &property.field_name))?;
    }

    for field in embedded {
        let value = match read_embedded(class, field, source)? {
            Some(object) => DomainValue::Object(object),
            None if field.nullable => DomainValue::Null,
            None => continue,
        };
        target = field
            .writer
            .apply(target, value)
            .map_err(|e| e.in_field(class, &field.field_name))?;
    }
    Ok(target)
}

/// `None` when the nested record is null or every exploded property is.
fn read_embedded(owner: &str, field: &EmbeddedMetadata, source: &NativeEntity) -> Result<Option<Instance>> {
    match field.mode {
        EmbeddedMode::Imploded => match source.get(&field.mapped_name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Entity(nested)) => build(field, nested).map(Some),
            Some(other) => Err(other
                .mismatch(ValueType::Entity)
                .in_field(owner, &field.field_name)),
        },
        EmbeddedMode::Exploded => {
            if field.exploded_names().iter().all(|name| source.is_null(name)) {
                Ok(None)
            } else {
                build(field, source).map(Some)
            }
        }
    }
}

fn build(field: &EmbeddedMetadata, source: &NativeEntity) -> Result<Instance> {
    let target = field.construction.instantiate();
    let target = read_members(field.class_name, &field.properties, &field.embedded, source, target)?;
    field.construction.finish(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Key, MappingError};
    use crate::descriptor::{BuilderSpec, ClassDescriptor, Embedded, Field, Persistent};
    use crate::descriptor::invoke::downcast_instance;
    use crate::mapper::MapperFactory;
    use crate::metadata::Introspector;

    #[derive(Default, Debug, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl Persistent for Point {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::embeddable()
                .default_constructor()
                .field(Field::new("x").get(|p: &Point| p.x).set(|p: &mut Point, v| p.x = v))
                .field(Field::new("y").get(|p: &Point| p.y).set(|p: &mut Point, v| p.y = v))
        }
    }

    #[derive(Debug, PartialEq)]
    struct Marker {
        name: String,
        label: Option<String>,
        position: Option<Point>,
        loaded: bool,
    }

    #[derive(Default)]
    struct MarkerBuilder {
        name: String,
        label: Option<String>,
        position: Option<Point>,
    }

    impl Persistent for Marker {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::entity()
                .field(Field::identifier("name").get(|m: &Marker| m.name.clone()))
                .field(Field::new("label").get(|m: &Marker| m.label.clone()))
                .embedded(Embedded::new("position").get_opt(|m: &Marker| m.position.as_ref()))
                .builder(
                    BuilderSpec::new()
                        .factory("builder", MarkerBuilder::default)
                        .setter("name", |b: MarkerBuilder, v: String| MarkerBuilder { name: v, ..b })
                        .setter("label", |b: MarkerBuilder, v: Option<String>| MarkerBuilder { label: v, ..b })
                        .embedded_setter("position", |b: MarkerBuilder, p: Point| MarkerBuilder {
                            position: Some(p),
                            ..b
                        })
                        .build_method("build", |b: MarkerBuilder| Marker {
                            name: b.name,
                            label: b.label,
                            position: b.position,
                            loaded: false,
                        }),
                )
                .callback(CallbackType::PostLoad, "mark_loaded", |m: &mut Marker| m.loaded = true)
        }
    }

    fn metadata() -> EntityMetadata {
        let factory = MapperFactory::new();
        Introspector::new(&factory, EmbeddedMode::Exploded)
            .introspect::<Marker>()
            .unwrap()
    }

    fn unmarshal(record: &NativeEntity) -> Result<Marker> {
        let meta = metadata();
        Unmarshaller::new(&meta)
            .unmarshal(record)
            .and_then(downcast_instance::<Marker>)
            .map(|marker| *marker)
    }

    #[test]
    fn test_builder_construction_with_exploded_embedded() {
        let mut record = NativeEntity::with_key(Key::with_name("Marker", "home"));
        record.set("label", "Home").set("position_x", 3i64).set("position_y", 4i64);

        let marker = unmarshal(&record).unwrap();
        assert_eq!(marker.name, "home");
        assert_eq!(marker.label.as_deref(), Some("Home"));
        assert_eq!(marker.position, Some(Point { x: 3, y: 4 }));
        assert!(marker.loaded);
    }

    #[test]
    fn test_all_null_exploded_gives_none() {
        let mut record = NativeEntity::with_key(Key::with_name("Marker", "void"));
        record.set("position_x", Value::Null);

        let marker = unmarshal(&record).unwrap();
        assert_eq!(marker.position, None);
        assert_eq!(marker.label, None);
    }

    #[test]
    fn test_wrong_store_type_names_the_field() {
        let mut record = NativeEntity::with_key(Key::with_name("Marker", "bad"));
        record.set("label", 12i64);

        let err = unmarshal(&record).unwrap_err();
        assert!(matches!(err, MappingError::Field { ref field, .. } if field == "label"));
    }

    #[test]
    fn test_key_id_type_must_match_identifier() {
        let record = NativeEntity::with_key(Key::with_id("Marker", 9));
        let err = unmarshal(&record).unwrap_err();
        assert!(matches!(err.root_cause(), MappingError::Conversion(_)));
    }
}
