/// Derive macro tests
///
/// Checks the class metadata generated by `#[derive(Entity)]`,
/// `#[derive(Embeddable)]`, `#[derive(MappedSuperclass)]` and
/// `#[derive(IdWrapper)]`.
/// Run with: cargo test --test derive_tests

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use docmapper::metadata::{IdentifierType, PropertyRole};
use docmapper::{
    CallbackType, DeclaredType, Embeddable, EmbeddedMode, Entity, EntityMapper, IdWrapper, Intent,
    Key, MappedSuperclass,
};

#[derive(Embeddable, Default, Clone)]
struct Dimensions {
    width: f64,
    height: f64,
}

#[derive(Embeddable, Default, Clone)]
struct Packaging {
    label: String,
    #[embedded(name = "size")]
    dimensions: Dimensions,
}

#[derive(MappedSuperclass, Default)]
#[mapped_superclass(callbacks(pre_insert = "on_create"))]
struct Tracked {
    #[created_timestamp]
    created_at: Option<DateTime<Utc>>,
    #[updated_timestamp]
    updated_at: Option<DateTime<Utc>>,
    #[transient]
    created_calls: u32,
}

impl Tracked {
    fn on_create(&mut self) {
        self.created_calls += 1;
    }
}

#[derive(IdWrapper, Clone, Default, Debug, PartialEq)]
struct Sku {
    code: String,
}

#[derive(Entity, Default)]
#[entity(kind = "catalog_item", callbacks(post_load = "after_load"))]
struct CatalogItem {
    #[identifier(wrapped)]
    sku: Sku,
    #[parent_key]
    category: Option<Key>,
    #[superclass]
    tracking: Tracked,
    #[version]
    revision: i64,
    #[property(name = "title")]
    name: String,
    #[property(optional)]
    subtitle: Option<String>,
    #[property(indexed = false)]
    description: String,
    #[decimal(precision = 10, scale = 2)]
    price: Decimal,
    #[embedded(imploded)]
    packaging: Option<Packaging>,
    #[embedded(exploded)]
    shipping: Dimensions,
    #[transient]
    loaded: bool,
}

impl CatalogItem {
    fn after_load(&mut self) {
        self.loaded = true;
    }
}

#[test]
fn test_generated_identifier_and_kind() {
    let meta = EntityMapper::new().introspect::<CatalogItem>().unwrap();

    assert_eq!(meta.class_name(), "CatalogItem");
    assert_eq!(meta.kind(), "catalog_item");
    assert_eq!(meta.identifier().field_name(), "sku");
    assert_eq!(meta.identifier().identifier_type(), IdentifierType::String);

    let id_class = meta.identifier().id_class().unwrap();
    assert_eq!(id_class.wrapper_name(), "Sku");
    assert_eq!(id_class.reader_name(), "code");
    assert_eq!(id_class.constructor_name(), "new");
    assert_eq!(meta.parent_key().unwrap().field_name(), "category");
}

#[test]
fn test_generated_properties() {
    let meta = EntityMapper::new().introspect::<CatalogItem>().unwrap();

    let title = meta.property("title").unwrap();
    assert_eq!(title.field_name(), "name");
    assert!(meta.property("name").is_none());

    let subtitle = meta.property("subtitle").unwrap();
    assert!(subtitle.is_optional());
    assert!(subtitle.field_type().nullable);

    assert!(!meta.property("description").unwrap().is_indexed());

    let price = meta.property("price").unwrap();
    assert_eq!(price.field_type().declared, DeclaredType::Decimal);
    assert_eq!(price.mapper().name(), "DecimalMapper");

    assert_eq!(meta.version().unwrap().field_name(), "revision");
    assert_eq!(meta.created_timestamp().unwrap().role(), PropertyRole::CreatedTimestamp);
    assert_eq!(meta.updated_timestamp().unwrap().mapped_name(), "updated_at");
    assert!(meta.property("loaded").is_none());
    assert!(meta.property("created_calls").is_none());
}

#[test]
fn test_generated_embedded_fields() {
    let meta = EntityMapper::new().introspect::<CatalogItem>().unwrap();

    let packaging = meta.embedded_field("packaging").unwrap();
    assert_eq!(packaging.mode(), EmbeddedMode::Imploded);
    assert!(packaging.is_nullable());
    assert_eq!(packaging.embedded()[0].mapped_name(), "size");
    assert_eq!(packaging.embedded()[0].mode(), EmbeddedMode::Imploded);
    assert!(packaging.embedded()[0].property("width").is_some());

    let shipping = meta.embedded_field("shipping").unwrap();
    assert_eq!(shipping.mode(), EmbeddedMode::Exploded);
    assert!(!shipping.is_nullable());
    assert!(shipping.property("shipping_width").is_some());
    assert_eq!(shipping.class_name(), "Dimensions");
}

#[test]
fn test_generated_callbacks() {
    let meta = EntityMapper::new().introspect::<CatalogItem>().unwrap();
    let internal = meta.listeners().internal();

    assert_eq!(internal.get(CallbackType::PreInsert).unwrap().method_name(), "on_create");
    assert_eq!(internal.get(CallbackType::PostLoad).unwrap().method_name(), "after_load");
    assert!(meta.listeners().external().is_empty());
}

#[test]
fn test_derived_entity_round_trip() {
    let mapper = EntityMapper::new();
    let mut item = CatalogItem {
        sku: Sku { code: "A-100".into() },
        category: Some(Key::with_name("category", "tools")),
        name: "Hammer".into(),
        description: "Claw hammer".into(),
        price: Decimal::new(1999, 2),
        packaging: Some(Packaging {
            label: "box".into(),
            dimensions: Dimensions { width: 0.3, height: 0.1 },
        }),
        shipping: Dimensions { width: 0.4, height: 0.2 },
        ..CatalogItem::default()
    };

    let record = mapper.marshal(&mut item, Intent::Insert).unwrap();
    assert_eq!(item.tracking.created_calls, 1);
    assert_eq!(record.key().unwrap().to_string(), "category(\"tools\")/catalog_item(\"A-100\")");
    assert_eq!(record.get_long("price").unwrap(), 1999);
    assert_eq!(record.get_long("revision").unwrap(), 1);
    assert!(record.get_timestamp("created_at").is_ok());
    let size = record.get_entity("packaging").unwrap().get_entity("size").unwrap();
    assert_eq!(size.get_double("height").unwrap(), 0.1);
    assert_eq!(record.get_double("shipping_width").unwrap(), 0.4);

    let loaded: CatalogItem = mapper.unmarshal(&record).unwrap();
    assert!(loaded.loaded);
    assert_eq!(loaded.sku, item.sku);
    assert_eq!(loaded.category, item.category);
    assert_eq!(loaded.name, "Hammer");
    assert_eq!(loaded.subtitle, None);
    assert_eq!(loaded.price, item.price);
    assert_eq!(loaded.revision, 1);
    assert!(loaded.tracking.created_at.is_some());
    assert_eq!(loaded.tracking.created_calls, 0);
    assert_eq!(loaded.packaging.unwrap().dimensions.width, 0.3);
    assert_eq!(loaded.shipping.height, 0.2);
}
