use std::any::TypeId;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use log::{debug, trace, warn};
use lru::LruCache;
use super::EntityMetadata;
use crate::core::{MappingError, Result};

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheState {
    entries: LruCache<TypeId, Arc<EntityMetadata>>,
    /// Reduced capacity, applied on the next insert.
    pending_capacity: Option<NonZeroUsize>,
    stats: CacheStats,
}

impl CacheState {
    fn evict_lru(&mut self) {
        if let Some((_, evicted)) = self.entries.pop_lru() {
            self.stats.evictions += 1;
            debug!("Evicted metadata of {}", evicted.class_name());
        }
    }
}

/// Bounded, recency-ordered metadata cache keyed by class.
///
/// Introspection runs outside the lock. When two threads introspect the same
/// class concurrently, the first insert wins and both get the same `Arc`.
pub struct MetadataCache {
    state: Mutex<CacheState>,
}

impl MetadataCache {
    pub fn new(capacity: usize) -> Result<Self> {
        non_zero(capacity).map(Self::with_capacity)
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                pending_capacity: None,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Looks up a class, marking it most recently used.
    pub fn get(&self, type_id: TypeId) -> Result<Option<Arc<EntityMetadata>>> {
        let mut state = self.state.lock()?;
        match state.entries.get(&type_id).cloned() {
            Some(metadata) => {
                state.stats.hits += 1;
                trace!("Metadata cache hit for {}", metadata.class_name());
                Ok(Some(metadata))
            }
            None => {
                state.stats.misses += 1;
                Ok(None)
            }
        }
    }

    /// Returns the cached metadata, building and inserting it on a miss.
    ///
    /// A failed build leaves the cache untouched.
    pub fn get_or_insert_with<F>(&self, type_id: TypeId, build: F) -> Result<Arc<EntityMetadata>>
    where
        F: FnOnce() -> Result<EntityMetadata>,
    {
        if let Some(metadata) = self.get(type_id)? {
            return Ok(metadata);
        }
        let built = Arc::new(build()?);
        self.insert(type_id, built)
    }

    /// Inserts unless the class is already present; returns the cached instance.
    pub fn insert(&self, type_id: TypeId, metadata: Arc<EntityMetadata>) -> Result<Arc<EntityMetadata>> {
        let mut state = self.state.lock()?;
        if let Some(existing) = state.entries.get(&type_id) {
            return Ok(existing.clone());
        }

        if let Some(capacity) = state.pending_capacity.take() {
            while state.entries.len() >= capacity.get() {
                state.evict_lru();
            }
            state.entries.resize(capacity);
        } else if state.entries.len() >= state.entries.cap().get() {
            state.evict_lru();
        }

        state.entries.put(type_id, metadata.clone());
        Ok(metadata)
    }

    /// Changes the capacity. Growing applies at once; shrinking below the
    /// current size evicts least recently used entries on the next insert.
    pub fn set_capacity(&self, capacity: usize) -> Result<()> {
        let capacity = non_zero(capacity)?;
        let mut state = self.state.lock()?;
        if capacity >= state.entries.cap() || state.entries.len() <= capacity.get() {
            state.entries.resize(capacity);
            state.pending_capacity = None;
        } else {
            warn!(
                "Metadata cache capacity reduced from {} to {}; {} entries will be evicted on next insert",
                state.entries.cap(),
                capacity,
                state.entries.len() - capacity.get()
            );
            state.pending_capacity = Some(capacity);
        }
        Ok(())
    }

    pub fn capacity(&self) -> Result<usize> {
        let state = self.state.lock()?;
        Ok(state.pending_capacity.unwrap_or(state.entries.cap()).get())
    }

    /// Does not affect recency.
    pub fn contains(&self, type_id: TypeId) -> Result<bool> {
        Ok(self.state.lock()?.entries.contains(&type_id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.state.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<()> {
        self.state.lock()?.entries.clear();
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        Ok(self.state.lock()?.stats)
    }
}

fn non_zero(capacity: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(capacity).ok_or_else(|| {
        MappingError::Configuration("metadata cache capacity must be greater than zero".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(MetadataCache::new(0), Err(MappingError::Configuration(_))));

        let cache = MetadataCache::new(4).unwrap();
        assert!(cache.set_capacity(0).is_err());
        assert_eq!(cache.capacity().unwrap(), 4);
    }

    #[test]
    fn test_growth_applies_immediately() {
        let cache = MetadataCache::new(2).unwrap();
        cache.set_capacity(10).unwrap();
        assert_eq!(cache.capacity().unwrap(), 10);
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache = MetadataCache::new(2).unwrap();
        let err = cache
            .get_or_insert_with(TypeId::of::<u8>(), || {
                Err(MappingError::UnsupportedType("u8 is not an entity".into()))
            })
            .unwrap_err();
        assert!(matches!(err, MappingError::UnsupportedType(_)));
        assert!(!cache.contains(TypeId::of::<u8>()).unwrap());
        assert_eq!(cache.stats().unwrap().misses, 1);
    }
}
