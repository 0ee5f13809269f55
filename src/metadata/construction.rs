//! Construction strategy resolution.
//!
//! A class is built either through its constructor and per-field mutators or
//! through a builder type: one factory, a setter per field, one build method.

use crate::core::{MappingError, Result};
use crate::descriptor::class::BuilderDescriptor;
use crate::descriptor::invoke::{BuildMethod, Constructor, FieldWriter, Instance, Mutator};

/// Resolved way to create instances of one class.
#[derive(Clone)]
pub enum ConstructionMetadata {
    Constructor {
        name: String,
        constructor: Constructor,
    },
    Builder {
        builder_name: &'static str,
        factory_name: String,
        factory: Constructor,
        build_name: String,
        build: BuildMethod,
    },
}

impl ConstructionMetadata {
    pub fn is_builder(&self) -> bool {
        matches!(self, Self::Builder { .. })
    }

    /// The object itself, or the builder that will produce it.
    pub(crate) fn instantiate(&self) -> Instance {
        match self {
            Self::Constructor { constructor, .. } => constructor(),
            Self::Builder { factory, .. } => factory(),
        }
    }

    pub(crate) fn finish(&self, instance: Instance) -> Result<Instance> {
        match self {
            Self::Constructor { .. } => Ok(instance),
            Self::Builder { build, .. } => build(instance),
        }
    }
}

impl std::fmt::Debug for ConstructionMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constructor { name, .. } => write!(f, "Constructor({})", name),
            Self::Builder {
                builder_name,
                factory_name,
                build_name,
                ..
            } => write!(f, "Builder({}::{} .. {})", builder_name, factory_name, build_name),
        }
    }
}

/// A persisted field as seen by the resolver.
pub(crate) struct Member {
    pub(crate) name: String,
    pub(crate) mutator: Option<Mutator>,
}

/// Picks the construction strategy and the writer for every member, in order.
pub(crate) fn resolve(
    class: &str,
    constructors: &[(String, Constructor)],
    builder: Option<&BuilderDescriptor>,
    members: &[Member],
) -> Result<(ConstructionMetadata, Vec<FieldWriter>)> {
    if constructors.len() > 1 {
        let names: Vec<&str> = constructors.iter().map(|(name, _)| name.as_str()).collect();
        return Err(unsupported(
            class,
            format!("ambiguous constructors: {}", names.join(", ")),
        ));
    }

    let constructor = constructors.first();
    let missing_mutator = members.iter().find(|m| m.mutator.is_none());

    match (constructor, missing_mutator, builder) {
        (Some((name, constructor)), None, _) => {
            let writers = members
                .iter()
                .filter_map(|m| m.mutator.clone())
                .map(FieldWriter::Mutator)
                .collect();
            Ok((
                ConstructionMetadata::Constructor {
                    name: name.clone(),
                    constructor: constructor.clone(),
                },
                writers,
            ))
        }
        (_, _, Some(builder)) => resolve_builder(class, builder, members),
        (Some(_), Some(member), None) => Err(MappingError::MissingMutator {
            class: class.to_string(),
            field: member.name.clone(),
        }),
        (None, _, None) => Err(unsupported(class, "no constructor or builder declared".into())),
    }
}

fn resolve_builder(
    class: &str,
    builder: &BuilderDescriptor,
    members: &[Member],
) -> Result<(ConstructionMetadata, Vec<FieldWriter>)> {
    let (factory_name, factory) = single(class, builder.builder_name, "factory", &builder.factories)?;
    let (build_name, build) = single(class, builder.builder_name, "build method", &builder.build_methods)?;

    let writers = members
        .iter()
        .map(|m| {
            builder
                .setter(&m.name)
                .cloned()
                .map(FieldWriter::BuilderSetter)
                .ok_or_else(|| MappingError::MissingMutator {
                    class: class.to_string(),
                    field: m.name.clone(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((
        ConstructionMetadata::Builder {
            builder_name: builder.builder_name,
            factory_name,
            factory,
            build_name,
            build,
        },
        writers,
    ))
}

fn single<F: Clone>(
    class: &str,
    builder_name: &str,
    what: &str,
    declared: &[(String, F)],
) -> Result<(String, F)> {
    match declared {
        [(name, f)] => Ok((name.clone(), f.clone())),
        [] => Err(unsupported(
            class,
            format!("builder {} declares no {}", builder_name, what),
        )),
        many => {
            let names: Vec<&str> = many.iter().map(|(name, _)| name.as_str()).collect();
            Err(unsupported(
                class,
                format!("builder {} declares more than one {}: {}", builder_name, what, names.join(", ")),
            ))
        }
    }
}

fn unsupported(class: &str, reason: String) -> MappingError {
    MappingError::UnsupportedConstructionStrategy {
        class: class.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::DomainValue;

    fn ctor() -> Constructor {
        Arc::new(|| Box::new(0i64) as Instance)
    }

    fn mutator() -> Mutator {
        Arc::new(|_: &mut dyn std::any::Any, _: DomainValue| Ok(()))
    }

    fn member(name: &str, with_mutator: bool) -> Member {
        Member {
            name: name.to_string(),
            mutator: with_mutator.then(mutator),
        }
    }

    fn builder(factories: usize, builds: usize, setters: &[&str]) -> BuilderDescriptor {
        BuilderDescriptor {
            builder_name: "ItemBuilder",
            factories: (0..factories).map(|i| (format!("new{}", i), ctor())).collect(),
            build_methods: (0..builds)
                .map(|i| {
                    let build: BuildMethod = Arc::new(|instance: Instance| -> Result<Instance> { Ok(instance) });
                    (format!("build{}", i), build)
                })
                .collect(),
            setters: setters
                .iter()
                .map(|name| {
                    let setter: crate::descriptor::invoke::BuilderSetter =
                        Arc::new(|instance: Instance, _: DomainValue| -> Result<Instance> { Ok(instance) });
                    (name.to_string(), setter)
                })
                .collect(),
        }
    }

    #[test]
    fn test_constructor_preferred_when_complete() {
        let b = builder(1, 1, &["id"]);
        let (strategy, writers) =
            resolve("Item", &[("new".into(), ctor())], Some(&b), &[member("id", true)]).unwrap();
        assert!(!strategy.is_builder());
        assert!(!writers[0].is_builder_setter());
    }

    #[test]
    fn test_falls_back_to_builder() {
        let b = builder(1, 1, &["id", "name"]);
        let members = [member("id", true), member("name", false)];
        let (strategy, writers) = resolve("Item", &[("new".into(), ctor())], Some(&b), &members).unwrap();
        assert!(strategy.is_builder());
        assert!(writers.iter().all(FieldWriter::is_builder_setter));
    }

    #[test]
    fn test_strategy_errors() {
        let members = [member("id", false)];

        let err = resolve("Item", &[("new".into(), ctor())], None, &members).err().unwrap();
        assert!(matches!(err, MappingError::MissingMutator { ref field, .. } if field == "id"));

        let err = resolve("Item", &[], None, &members).err().unwrap();
        assert!(matches!(err, MappingError::UnsupportedConstructionStrategy { .. }));

        let two = [("a".to_string(), ctor()), ("b".to_string(), ctor())];
        let err = resolve("Item", &two, None, &[member("id", true)]).err().unwrap();
        assert!(err.to_string().contains("ambiguous"));

        let err = resolve("Item", &[], Some(&builder(2, 1, &["id"])), &members).err().unwrap();
        assert!(err.to_string().contains("more than one factory"));

        let err = resolve("Item", &[], Some(&builder(1, 0, &["id"])), &members).err().unwrap();
        assert!(err.to_string().contains("no build method"));

        let err = resolve("Item", &[], Some(&builder(1, 1, &[])), &members).err().unwrap();
        assert!(matches!(err, MappingError::MissingMutator { .. }));
    }
}
