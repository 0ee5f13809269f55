/// Metadata cache tests
///
/// Concurrent introspection, LRU eviction and capacity changes.
/// Run with: cargo test --test cache_tests

use std::any::TypeId;
use std::sync::{Arc, Barrier};
use std::thread;
use docmapper::{Entity, EntityMapper, MapperConfig};

#[derive(Entity, Default)]
struct Order {
    #[identifier]
    id: i64,
    total: f64,
}

#[derive(Entity, Default)]
struct Customer {
    #[identifier]
    id: String,
}

#[derive(Entity, Default)]
struct Product {
    #[identifier]
    id: i64,
}

#[derive(Entity, Default)]
struct Warehouse {
    #[identifier]
    id: i64,
}

fn mapper(capacity: usize) -> EntityMapper {
    EntityMapper::with_config(MapperConfig::new().cache_capacity(capacity)).unwrap()
}

#[test]
fn test_concurrent_introspection_shares_one_instance() {
    let mapper = Arc::new(EntityMapper::new());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let mapper = Arc::clone(&mapper);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                mapper.introspect::<Order>().unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for metadata in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], metadata));
    }
    assert_eq!(mapper.cache().len().unwrap(), 1);
    assert!(Arc::ptr_eq(&results[0], &mapper.introspect::<Order>().unwrap()));
}

#[test]
fn test_hits_and_misses() {
    let mapper = mapper(4);
    mapper.introspect::<Order>().unwrap();
    mapper.introspect::<Order>().unwrap();
    mapper.introspect::<Customer>().unwrap();

    let stats = mapper.cache().stats().unwrap();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.evictions, 0);
}

#[test]
fn test_least_recently_used_class_is_evicted() {
    let mapper = mapper(2);
    mapper.introspect::<Order>().unwrap();
    mapper.introspect::<Customer>().unwrap();
    mapper.introspect::<Order>().unwrap();
    mapper.introspect::<Product>().unwrap();

    let cache = mapper.cache();
    assert!(cache.contains(TypeId::of::<Order>()).unwrap());
    assert!(!cache.contains(TypeId::of::<Customer>()).unwrap());
    assert!(cache.contains(TypeId::of::<Product>()).unwrap());
    assert_eq!(cache.stats().unwrap().evictions, 1);
}

#[test]
fn test_shrinking_is_applied_on_next_insert() {
    let mapper = mapper(3);
    mapper.introspect::<Order>().unwrap();
    mapper.introspect::<Customer>().unwrap();
    mapper.introspect::<Product>().unwrap();

    mapper.set_cache_capacity(1).unwrap();
    assert_eq!(mapper.cache().capacity().unwrap(), 1);
    assert_eq!(mapper.cache().len().unwrap(), 3);

    mapper.introspect::<Warehouse>().unwrap();
    let cache = mapper.cache();
    assert_eq!(cache.len().unwrap(), 1);
    assert!(cache.contains(TypeId::of::<Warehouse>()).unwrap());
    assert_eq!(cache.stats().unwrap().evictions, 3);
}

#[test]
fn test_shrinking_keeps_most_recently_used() {
    let mapper = mapper(3);
    mapper.introspect::<Order>().unwrap();
    mapper.introspect::<Customer>().unwrap();
    mapper.introspect::<Product>().unwrap();
    mapper.introspect::<Order>().unwrap();

    mapper.set_cache_capacity(2).unwrap();
    mapper.introspect::<Warehouse>().unwrap();

    let cache = mapper.cache();
    assert_eq!(cache.len().unwrap(), 2);
    assert!(cache.contains(TypeId::of::<Order>()).unwrap());
    assert!(!cache.contains(TypeId::of::<Customer>()).unwrap());
    assert!(!cache.contains(TypeId::of::<Product>()).unwrap());
    assert!(cache.contains(TypeId::of::<Warehouse>()).unwrap());
    assert_eq!(cache.stats().unwrap().evictions, 2);
}

#[test]
fn test_evicted_metadata_stays_usable() {
    let mapper = mapper(1);
    let order = mapper.introspect::<Order>().unwrap();
    mapper.introspect::<Customer>().unwrap();

    assert!(!mapper.cache().contains(TypeId::of::<Order>()).unwrap());
    assert_eq!(order.class_name(), "Order");
    assert!(order.property("total").is_some());

    let again = mapper.introspect::<Order>().unwrap();
    assert!(!Arc::ptr_eq(&order, &again));
}

#[test]
fn test_clear() {
    let mapper = mapper(4);
    mapper.introspect::<Order>().unwrap();
    mapper.cache().clear().unwrap();
    assert!(mapper.cache().is_empty().unwrap());
    assert!(mapper.set_cache_capacity(0).is_err());
}
