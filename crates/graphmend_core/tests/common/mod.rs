//! Shared fixtures for the integration suites: an orders domain with
//! every relationship shape, served by the in-memory adapter.
#![allow(dead_code)]

use graphmend_core::{GraphEngine, Payload, Persisted};
use graphmend_store::{Attributes, Entity, EntityType, InMemoryStore, KeyValue, Schema, Value};
use std::sync::Arc;

/// Orders domain: `Order` fans out to every relationship shape, `Note`
/// is keyed by the order's id (its foreign key doubles as its primary
/// key), and `LockedOrder` carries an optimistic-lock version attribute.
pub fn schema() -> Schema {
    Schema::new()
        .with(
            EntityType::new("Order", &["name"])
                .has_many("items", "Item", "orderId")
                .has_many("notes", "Note", "orderId")
                .has_one("audit", "Audit", "orderId")
                .belongs_to("customer", "Customer", "customerId"),
        )
        .with(EntityType::new("Customer", &["name"]).belongs_to("region", "Region", "regionId"))
        .with(EntityType::new("Region", &["name"]))
        .with(
            EntityType::new("Item", &["quantity", "orderId"]).belongs_to(
                "type",
                "ItemType",
                "typeId",
            ),
        )
        .with(EntityType::new("ItemType", &["dept"]))
        .with(
            EntityType::new("Note", &["body"])
                .primary_key(&["orderId"])
                .has_many("flags", "Flag", "orderId"),
        )
        .with(EntityType::new("Flag", &["code", "orderId"]))
        .with(EntityType::new("Audit", &["manager", "authorized", "orderId"]))
        .with(
            EntityType::new("LockedOrder", &["name"])
                .versioned("rev")
                .belongs_to("customer", "Customer", "customerId"),
        )
}

pub fn store() -> InMemoryStore {
    InMemoryStore::new(schema())
}

pub fn engine(store: &InMemoryStore) -> GraphEngine<InMemoryStore> {
    GraphEngine::new(Arc::new(store.clone()))
}

/// Parses a JSON object into a payload.
pub fn payload(json: serde_json::Value) -> Payload {
    Payload::from_json(json).unwrap()
}

/// Converts a flat JSON object into row attributes for seeding.
pub fn row(json: serde_json::Value) -> Attributes {
    let serde_json::Value::Object(map) = json else {
        panic!("row fixture must be a JSON object");
    };
    map.into_iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::Null => Value::Null,
                serde_json::Value::Bool(b) => Value::Bool(b),
                serde_json::Value::Number(n) => Value::Integer(n.as_i64().unwrap()),
                serde_json::Value::String(s) => Value::Text(s),
                other => panic!("row fixture value must be scalar, got {other}"),
            };
            (name, value)
        })
        .collect()
}

/// Echo-back helper: a payload carrying an entity's scalar attributes.
pub fn payload_of(entity: &Entity) -> Payload {
    let mut payload = Payload::new();
    for (name, value) in &entity.attributes {
        payload.insert(name.clone(), graphmend_core::Field::Scalar(value.clone()));
    }
    payload
}

pub fn key(n: i64) -> KeyValue {
    KeyValue::single(Value::Integer(n)).unwrap()
}

pub fn entity(result: Persisted) -> Entity {
    result.into_entity().expect("expected an entity result")
}

pub fn int(entity: &Entity, attr: &str) -> i64 {
    match entity.get(attr) {
        Some(Value::Integer(n)) => *n,
        other => panic!("{attr} is not an integer: {other:?}"),
    }
}

pub fn text<'e>(entity: &'e Entity, attr: &str) -> &'e str {
    match entity.get(attr) {
        Some(Value::Text(t)) => t,
        other => panic!("{attr} is not text: {other:?}"),
    }
}
