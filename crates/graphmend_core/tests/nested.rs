//! Nested graphs: relationships reconciled through multiple levels of
//! the include tree.

mod common;

use common::*;
use graphmend_core::{IncludeNode, Options, ReloadOptions};
use serde_json::json;

#[tokio::test]
async fn belongs_to_within_has_many_inserts_nested_value() {
    let store = store();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    store
        .seed("Item", row(json!({ "id": 1, "orderId": 1, "quantity": 7 })))
        .unwrap();
    let engine = engine(&store);
    let include = vec![IncludeNode::new("items").with(IncludeNode::new("type"))];

    let result = engine
        .update(
            "Order",
            payload(json!({ "id": 1, "items": [{ "id": 1, "type": { "dept": "seafood" } }] })),
            &include,
            Options::default(),
        )
        .await
        .unwrap();

    let order = entity(result);
    let items = order.related_many("items");
    assert_eq!(items.len(), 1);
    assert_eq!(text(items[0].related_one("type").unwrap(), "dept"), "seafood");
}

#[tokio::test]
async fn belongs_to_within_has_many_updates_existing_nested_value() {
    let store = store();
    store
        .seed("ItemType", row(json!({ "id": 2, "dept": "meat" })))
        .unwrap();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    store
        .seed(
            "Item",
            row(json!({ "id": 1, "orderId": 1, "typeId": 2, "quantity": 7 })),
        )
        .unwrap();
    let engine = engine(&store);
    let include = vec![IncludeNode::new("items").with(IncludeNode::new("type"))];

    let result = engine
        .update(
            "Order",
            payload(
                json!({ "id": 1, "items": [{ "id": 1, "type": { "id": 2, "dept": "seafood" } }] }),
            ),
            &include,
            Options::default(),
        )
        .await
        .unwrap();

    let order = entity(result);
    let item_type = order.related_many("items")[0].related_one("type").unwrap();
    assert_eq!(int(item_type, "id"), 2);
    assert_eq!(text(item_type, "dept"), "seafood");
    assert_eq!(store.count("ItemType").unwrap(), 1);
}

#[tokio::test]
async fn belongs_to_within_has_many_unlinks_on_null() {
    let store = store();
    store
        .seed("ItemType", row(json!({ "id": 2, "dept": "meat" })))
        .unwrap();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    store
        .seed(
            "Item",
            row(json!({ "id": 1, "orderId": 1, "typeId": 2, "quantity": 7 })),
        )
        .unwrap();
    let engine = engine(&store);
    let include = vec![IncludeNode::new("items").with(IncludeNode::new("type"))];

    let result = engine
        .update(
            "Order",
            payload(json!({ "id": 1, "items": [{ "id": 1, "type": null }] })),
            &include,
            Options::default(),
        )
        .await
        .unwrap();

    let order = entity(result);
    let items = order.related_many("items");
    assert!(items[0].related_is_none("type"));
    // The unlinked type survives; only the reference was cleared.
    assert_eq!(store.count("ItemType").unwrap(), 1);
}

#[tokio::test]
async fn nested_value_outside_include_is_not_reconciled() {
    let store = store();
    store
        .seed("ItemType", row(json!({ "id": 2, "dept": "meat" })))
        .unwrap();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    store
        .seed(
            "Item",
            row(json!({ "id": 1, "orderId": 1, "typeId": 2, "quantity": 7 })),
        )
        .unwrap();
    let engine = engine(&store);
    let include = vec![IncludeNode::new("items")];
    let reload_include = vec![IncludeNode::new("items").with(IncludeNode::new("type"))];

    let result = engine
        .update(
            "Order",
            payload(
                json!({ "id": 1, "items": [{ "id": 1, "type": { "id": 2, "dept": "seafood" } }] }),
            ),
            &include,
            Options::reload_with(ReloadOptions {
                include: Some(reload_include),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

    let order = entity(result);
    let item_type = order.related_many("items")[0].related_one("type").unwrap();
    assert_eq!(text(item_type, "dept"), "meat");
}

#[tokio::test]
async fn belongs_to_within_belongs_to_inserts_nested_value() {
    let store = store();
    store
        .seed("Customer", row(json!({ "id": 5, "name": "c1" })))
        .unwrap();
    let engine = engine(&store);
    let include = vec![IncludeNode::new("customer").with(IncludeNode::new("region"))];

    let result = engine
        .insert(
            "Order",
            payload(
                json!({ "name": "o1", "customer": { "id": 5, "region": { "name": "northwest" } } }),
            ),
            &include,
            Options::default(),
        )
        .await
        .unwrap();

    let order = entity(result);
    let customer = order.related_one("customer").unwrap();
    assert_eq!(int(customer, "id"), 5);
    let region = customer.related_one("region").unwrap();
    assert_eq!(text(region, "name"), "northwest");
}

#[tokio::test]
async fn belongs_to_within_belongs_to_unlinks_on_null() {
    let store = store();
    store
        .seed("Region", row(json!({ "id": 9, "name": "nw" })))
        .unwrap();
    store
        .seed("Customer", row(json!({ "id": 5, "name": "c1", "regionId": 9 })))
        .unwrap();
    store
        .seed(
            "Order",
            row(json!({ "id": 1, "name": "o1", "customerId": 5 })),
        )
        .unwrap();
    let engine = engine(&store);
    let include = vec![IncludeNode::new("customer").with(IncludeNode::new("region"))];

    let result = engine
        .update(
            "Order",
            payload(json!({ "id": 1, "customer": { "id": 5, "region": null } })),
            &include,
            Options::default(),
        )
        .await
        .unwrap();

    let order = entity(result);
    let customer = order.related_one("customer").unwrap();
    assert!(customer.related_is_none("region"));
    assert_eq!(store.count("Region").unwrap(), 1);
}

#[tokio::test]
async fn has_many_within_has_many_inserts_nested_value() {
    let store = store();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    store
        .seed("Note", row(json!({ "orderId": 1, "body": "foo" })))
        .unwrap();
    let engine = engine(&store);
    let include = vec![IncludeNode::new("notes").with(IncludeNode::new("flags"))];

    let result = engine
        .update(
            "Order",
            payload(json!({ "id": 1, "notes": [{ "flags": [{ "code": "bar" }] }] })),
            &include,
            Options::default(),
        )
        .await
        .unwrap();

    let order = entity(result);
    let notes = order.related_many("notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(text(&notes[0], "body"), "foo");
    let flags = notes[0].related_many("flags");
    assert_eq!(flags.len(), 1);
    assert_eq!(text(&flags[0], "code"), "bar");
}

#[tokio::test]
async fn has_many_within_has_many_updates_existing_nested_value() {
    let store = store();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    store
        .seed("Note", row(json!({ "orderId": 1, "body": "foo" })))
        .unwrap();
    store
        .seed("Flag", row(json!({ "id": 3, "orderId": 1, "code": "bar" })))
        .unwrap();
    let engine = engine(&store);
    let include = vec![IncludeNode::new("notes").with(IncludeNode::new("flags"))];

    let result = engine
        .update(
            "Order",
            payload(json!({ "id": 1, "notes": [{ "flags": [{ "id": 3, "code": "baz" }] }] })),
            &include,
            Options::default(),
        )
        .await
        .unwrap();

    let order = entity(result);
    let flags = order.related_many("notes")[0].related_many("flags");
    assert_eq!(flags.len(), 1);
    assert_eq!(int(&flags[0], "id"), 3);
    assert_eq!(text(&flags[0], "code"), "baz");
}

#[tokio::test]
async fn has_many_within_has_many_clears_on_empty_array() {
    let store = store();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    store
        .seed("Note", row(json!({ "orderId": 1, "body": "foo" })))
        .unwrap();
    store
        .seed("Flag", row(json!({ "id": 3, "orderId": 1, "code": "bar" })))
        .unwrap();
    let engine = engine(&store);
    let include = vec![IncludeNode::new("notes").with(IncludeNode::new("flags"))];

    let result = engine
        .update(
            "Order",
            payload(json!({ "id": 1, "notes": [{ "flags": [] }] })),
            &include,
            Options::default(),
        )
        .await
        .unwrap();

    let order = entity(result);
    let notes = order.related_many("notes");
    assert_eq!(text(&notes[0], "body"), "foo");
    assert!(notes[0].related_many("flags").is_empty());
    assert_eq!(store.count("Flag").unwrap(), 0);
}

#[tokio::test]
async fn deep_insert_builds_the_whole_graph() {
    let store = store();
    let engine = engine(&store);
    let include = vec![
        IncludeNode::new("customer").with(IncludeNode::new("region")),
        IncludeNode::new("items").with(IncludeNode::new("type")),
        IncludeNode::new("audit"),
    ];

    let result = engine
        .insert(
            "Order",
            payload(json!({
                "name": "o1",
                "customer": { "name": "c1", "region": { "name": "northwest" } },
                "items": [
                    { "quantity": 7, "type": { "dept": "seafood" } },
                    { "quantity": 9 },
                ],
                "audit": { "manager": "m1" },
            })),
            &include,
            Options::default(),
        )
        .await
        .unwrap();

    let order = entity(result);
    let customer = order.related_one("customer").unwrap();
    assert_eq!(text(customer.related_one("region").unwrap(), "name"), "northwest");
    let items = order.related_many("items");
    assert_eq!(items.len(), 2);
    assert_eq!(text(items[0].related_one("type").unwrap(), "dept"), "seafood");
    assert!(items[1].related_one("type").is_none());
    assert_eq!(text(order.related_one("audit").unwrap(), "manager"), "m1");
}
