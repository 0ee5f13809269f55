use std::any::TypeId;
use std::num::NonZeroUsize;
use std::sync::Arc;
use log::debug;
use crate::config::MapperConfig;
use crate::core::{DeclaredType, DomainType, Key, MappingError, NativeEntity, Result};
use crate::descriptor::invoke::downcast_instance;
use crate::descriptor::{CallbackType, Persistent};
use crate::mapper::{Mapper, MapperFactory};
use crate::marshal::{Intent, Marshaller, Unmarshaller};
use crate::metadata::{EntityMetadata, Introspector, MetadataCache};

/// Entry point of the mapping layer.
///
/// Owns the metadata cache and the mapper overrides. `EntityMapper` is
/// `Send + Sync`; share one instance through an `Arc`.
///
/// ```
/// use docmapper::{ClassDescriptor, EntityMapper, Field, Intent, Persistent};
///
/// #[derive(Default)]
/// struct Note {
///     id: i64,
///     text: String,
/// }
///
/// impl Persistent for Note {
///     fn descriptor() -> ClassDescriptor<Self> {
///         ClassDescriptor::entity()
///             .default_constructor()
///             .field(Field::identifier("id").get(|n: &Note| n.id).set(|n: &mut Note, v| n.id = v))
///             .field(Field::new("text").get(|n: &Note| n.text.clone()).set(|n: &mut Note, v| n.text = v))
///     }
/// }
///
/// let mapper = EntityMapper::new();
/// let mut note = Note { id: 7, text: "hello".into() };
/// let record = mapper.marshal(&mut note, Intent::Update)?;
/// assert_eq!(record.get_string("text")?, "hello");
///
/// let loaded: Note = mapper.unmarshal(&record)?;
/// assert_eq!(loaded.id, 7);
/// # Ok::<(), docmapper::MappingError>(())
/// ```
pub struct EntityMapper {
    cache: MetadataCache,
    factory: MapperFactory,
    config: MapperConfig,
}

impl EntityMapper {
    pub fn new() -> Self {
        let config = MapperConfig::default();
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: MetadataCache::with_capacity(capacity),
            factory: MapperFactory::new(),
            config,
        }
    }

    pub fn with_config(config: MapperConfig) -> Result<Self> {
        config.validate()?;
        debug!("Creating entity mapper with {:?}", config);
        Ok(Self {
            cache: MetadataCache::new(config.cache_capacity)?,
            factory: MapperFactory::new(),
            config,
        })
    }

    /// Validated metadata of `T`, introspected on first use and cached.
    pub fn introspect<T: Persistent>(&self) -> Result<Arc<EntityMetadata>> {
        self.cache.get_or_insert_with(TypeId::of::<T>(), || {
            Introspector::new(&self.factory, self.config.default_embedded_mode).introspect::<T>()
        })
    }

    /// Fires the pre-write callbacks on `entity` and converts it to a record.
    pub fn marshal<T: Persistent>(&self, entity: &mut T, intent: Intent) -> Result<NativeEntity> {
        let metadata = self.introspect::<T>()?;
        Marshaller::new(&metadata)
            .generate_string_ids(self.config.generate_string_ids)
            .marshal(entity, intent)
    }

    pub fn marshal_all<'e, T, I>(&self, entities: I, intent: Intent) -> Result<Vec<NativeEntity>>
    where
        T: Persistent,
        I: IntoIterator<Item = &'e mut T>,
    {
        let metadata = self.introspect::<T>()?;
        let marshaller = Marshaller::new(&metadata).generate_string_ids(self.config.generate_string_ids);
        entities
            .into_iter()
            .map(|entity| marshaller.marshal(entity, intent))
            .collect()
    }

    /// Rebuilds a `T` from `record` and fires its post-load callbacks.
    pub fn unmarshal<T: Persistent>(&self, record: &NativeEntity) -> Result<T> {
        let metadata = self.introspect::<T>()?;
        if let Some(key) = record.key() {
            if key.kind() != metadata.kind() {
                return Err(MappingError::TypeMismatch(format!(
                    "record of kind '{}' cannot be loaded as {} (kind '{}')",
                    key.kind(),
                    metadata.class_name(),
                    metadata.kind()
                )));
            }
        }
        let object = Unmarshaller::new(&metadata).unmarshal(record)?;
        downcast_instance::<T>(object).map(|boxed| *boxed)
    }

    pub fn unmarshal_all<T: Persistent>(&self, records: &[NativeEntity]) -> Result<Vec<T>> {
        records.iter().map(|record| self.unmarshal(record)).collect()
    }

    /// Key of `entity` as it would be written, without firing callbacks.
    pub fn key_of<T: Persistent>(&self, entity: &T) -> Result<Key> {
        let metadata = self.introspect::<T>()?;
        Marshaller::new(&metadata).key_of(entity)
    }

    /// Fires the callbacks of one type, external listeners first.
    pub fn run_callbacks<T: Persistent>(&self, callback: CallbackType, entity: &mut T) -> Result<()> {
        let metadata = self.introspect::<T>()?;
        metadata.listeners().invoke(callback, entity)
    }

    /// Overrides the mapper of a declared type for classes introspected afterwards.
    pub fn register_mapper(&self, declared: DeclaredType, mapper: Arc<dyn Mapper>) -> Result<()> {
        self.factory.register(declared, mapper)
    }

    pub fn register_mapper_for<V: DomainType>(&self, mapper: impl Mapper + 'static) -> Result<()> {
        self.factory.register_for::<V>(mapper)
    }

    pub fn set_cache_capacity(&self, capacity: usize) -> Result<()> {
        self.cache.set_capacity(capacity)
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn factory(&self) -> &MapperFactory {
        &self.factory
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }
}

impl Default for EntityMapper {
    fn default() -> Self {
        Self::new()
    }
}
