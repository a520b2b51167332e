//! Transaction boundaries: internal rollback on failure, and
//! caller-owned external transactions the engine never finishes.

mod common;

use common::*;
use graphmend_core::{GraphError, IncludeNode, Options};
use graphmend_store::{EntityStore, StoreError, StoreTransaction};
use serde_json::json;

fn include() -> Vec<IncludeNode> {
    vec![IncludeNode::new("audit")]
}

#[tokio::test]
async fn internal_transaction_rolls_back_on_nested_failure() {
    let store = store();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    let engine = engine(&store);

    // The audit payload carries an undeclared attribute, so its insert
    // fails after the order's own row was already saved in the same
    // transaction.
    let result = engine
        .update(
            "Order",
            payload(json!({
                "id": 1,
                "name": "o1.1",
                "audit": { "manager": "m1", "bogus": "x" },
            })),
            &include(),
            Options::default(),
        )
        .await;

    assert!(matches!(
        result,
        Err(GraphError::Store(StoreError::Validation { .. }))
    ));

    // Everything staged in the transaction rolled back.
    let order = store.fetch("Order", &key(1)).unwrap().unwrap();
    assert_eq!(text(&order, "name"), "o1");
    assert_eq!(store.count("Audit").unwrap(), 0);
}

#[tokio::test]
async fn external_transaction_commits_after_insert() {
    let store = store();
    let engine = engine(&store);

    let tx = store.begin().await.unwrap();
    engine
        .insert(
            "Order",
            payload(json!({ "id": 123, "name": "o1", "audit": { "id": 123, "manager": "m1" } })),
            &include(),
            Options::external(tx.clone()),
        )
        .await
        .unwrap();

    // The engine never finishes a caller-owned transaction.
    assert!(!tx.is_finished());
    tx.commit().await.unwrap();

    let order = store.fetch("Order", &key(123)).unwrap().unwrap();
    assert_eq!(text(&order, "name"), "o1");
    let audit = store.fetch("Audit", &key(123)).unwrap().unwrap();
    assert_eq!(text(&audit, "manager"), "m1");
}

#[tokio::test]
async fn external_transaction_commits_after_update() {
    let store = store();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    let engine = engine(&store);

    let tx = store.begin().await.unwrap();
    engine
        .update(
            "Order",
            payload(json!({ "id": 1, "name": "o1.1", "audit": { "id": 9, "manager": "m1" } })),
            &include(),
            Options::external(tx.clone()),
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let order = store.fetch("Order", &key(1)).unwrap().unwrap();
    assert_eq!(text(&order, "name"), "o1.1");
    assert!(store.fetch("Audit", &key(9)).unwrap().is_some());
}

#[tokio::test]
async fn external_transaction_can_roll_back_after_insert() {
    let store = store();
    let engine = engine(&store);

    let tx = store.begin().await.unwrap();
    let result = engine
        .insert(
            "Order",
            payload(json!({ "id": 123, "name": "o1", "audit": { "id": 123, "manager": "m1" } })),
            &include(),
            Options::external(tx.clone()),
        )
        .await
        .unwrap();

    // The in-flight result is visible through the transaction...
    let order = entity(result);
    assert_eq!(text(&order, "name"), "o1");

    // ...until the caller rolls everything back.
    tx.rollback().await.unwrap();
    assert!(store.fetch("Order", &key(123)).unwrap().is_none());
    assert_eq!(store.count("Audit").unwrap(), 0);
}

#[tokio::test]
async fn external_transaction_can_roll_back_after_update() {
    let store = store();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    let engine = engine(&store);

    let tx = store.begin().await.unwrap();
    engine
        .update(
            "Order",
            payload(json!({ "id": 1, "name": "o1.1", "audit": { "id": 9, "manager": "m1" } })),
            &include(),
            Options::external(tx.clone()),
        )
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let order = store.fetch("Order", &key(1)).unwrap().unwrap();
    assert_eq!(text(&order, "name"), "o1");
    assert_eq!(store.count("Audit").unwrap(), 0);
}

#[tokio::test]
async fn external_transaction_survives_a_failed_operation() {
    let store = store();
    store
        .seed("Order", row(json!({ "id": 1, "name": "o1" })))
        .unwrap();
    let engine = engine(&store);

    let tx = store.begin().await.unwrap();
    let result = engine
        .update(
            "Order",
            payload(json!({ "id": 1, "audit": { "manager": "m1", "bogus": "x" } })),
            &include(),
            Options::external(tx.clone()),
        )
        .await;

    assert!(result.is_err());
    // Failure recovery belongs to the transaction's owner.
    assert!(!tx.is_finished());
    tx.rollback().await.unwrap();

    let order = store.fetch("Order", &key(1)).unwrap().unwrap();
    assert_eq!(text(&order, "name"), "o1");
}
