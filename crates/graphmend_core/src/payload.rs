//! Caller-supplied nested payloads.
//!
//! A payload describes the desired state of an entity graph. Absence and
//! `null` are distinct states: an absent field is never modified, a
//! `null` field explicitly clears a relationship or foreign key.

use crate::error::{GraphError, GraphResult};
use graphmend_store::{Attributes, EntityType, KeyValue, Value};
use std::collections::BTreeMap;

/// One field of a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Explicit `null`: clear the relationship or foreign key.
    Null,
    /// A scalar attribute value.
    Scalar(Value),
    /// A nested payload (`BelongsTo` / `HasOne` embedding).
    One(Payload),
    /// A sequence of nested payloads (`HasMany` embedding).
    Many(Vec<Payload>),
}

/// An untyped nested structure shaped like an entity instance.
///
/// Fields not present in the map are absent — a representable state the
/// reconciler relies on to leave stored values untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: BTreeMap<String, Field>,
}

impl Payload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a field.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Writes a field.
    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    /// Writes a scalar field. Builder-style convenience.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, Field::Scalar(value.into()));
        self
    }

    /// Removes a field, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    /// Returns true if the field is present (including explicit `null`).
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates over all fields.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.fields.iter()
    }

    /// The payload's scalar attributes for the given type: scalar and
    /// null fields whose names are declared attributes rather than
    /// relationship accessors. Everything else — embedded relationships,
    /// stray nested values outside the include tree — is stripped here,
    /// which is what keeps undeclared payload content out of persisted
    /// rows.
    pub fn row_attributes(&self, entity_type: &EntityType) -> Attributes {
        self.fields
            .iter()
            .filter(|(name, _)| !entity_type.is_accessor(name))
            .filter_map(|(name, field)| match field {
                Field::Scalar(v) => Some((name.clone(), v.clone())),
                Field::Null => Some((name.clone(), Value::Null)),
                Field::One(_) | Field::Many(_) => None,
            })
            .collect()
    }

    /// The payload's canonical primary key for the given type, when
    /// every key attribute is present and non-empty.
    pub fn key(&self, entity_type: &EntityType) -> Option<KeyValue> {
        KeyValue::try_new(
            entity_type
                .primary_key
                .iter()
                .map(|attr| match self.fields.get(attr) {
                    Some(Field::Scalar(v)) => v.clone(),
                    _ => Value::Null,
                })
                .collect(),
        )
    }

    /// Converts a JSON value into a payload.
    ///
    /// The JSON must be an object. Scalars map to [`Field::Scalar`],
    /// `null` to [`Field::Null`], objects to [`Field::One`], arrays of
    /// objects to [`Field::Many`]. Floats have no canonical identity and
    /// are rejected, as are arrays of non-objects.
    pub fn from_json(json: serde_json::Value) -> GraphResult<Self> {
        let serde_json::Value::Object(map) = json else {
            return Err(GraphError::invalid_payload("payload must be a JSON object"));
        };
        let mut payload = Payload::new();
        for (name, value) in map {
            let field = match value {
                serde_json::Value::Null => Field::Null,
                serde_json::Value::Object(_) => Field::One(Payload::from_json(value)?),
                serde_json::Value::Array(items) => {
                    let mut nested = Vec::with_capacity(items.len());
                    for item in items {
                        if !item.is_object() {
                            return Err(GraphError::invalid_payload(format!(
                                "field {name:?}: array elements must be objects"
                            )));
                        }
                        nested.push(Payload::from_json(item)?);
                    }
                    Field::Many(nested)
                }
                other => Field::Scalar(scalar_from_json(&name, other)?),
            };
            payload.insert(name, field);
        }
        Ok(payload)
    }
}

impl TryFrom<serde_json::Value> for Payload {
    type Error = GraphError;

    fn try_from(json: serde_json::Value) -> GraphResult<Self> {
        Payload::from_json(json)
    }
}

fn scalar_from_json(name: &str, json: serde_json::Value) -> GraphResult<Value> {
    match json {
        serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_json::Value::Number(n) => n.as_i64().map(Value::Integer).ok_or_else(|| {
            GraphError::invalid_payload(format!("field {name:?}: non-integer number {n}"))
        }),
        serde_json::Value::String(s) => Ok(Value::Text(s)),
        other => Err(GraphError::invalid_payload(format!(
            "field {name:?}: unsupported value {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmend_store::EntityType;
    use serde_json::json;

    #[test]
    fn json_conversion_maps_shapes() {
        let payload = Payload::from_json(json!({
            "name": "o1",
            "customer": { "id": 5, "name": "c1" },
            "items": [{ "quantity": 7 }],
            "audit": null,
        }))
        .unwrap();

        assert!(matches!(payload.field("name"), Some(Field::Scalar(Value::Text(_)))));
        assert!(matches!(payload.field("customer"), Some(Field::One(_))));
        assert!(matches!(payload.field("items"), Some(Field::Many(v)) if v.len() == 1));
        assert!(matches!(payload.field("audit"), Some(Field::Null)));
        assert!(payload.field("absent").is_none());
    }

    #[test]
    fn json_conversion_rejects_floats_and_scalar_arrays() {
        assert!(Payload::from_json(json!({ "qty": 1.5 })).is_err());
        assert!(Payload::from_json(json!({ "ids": [1, 2] })).is_err());
        assert!(Payload::from_json(json!("not an object")).is_err());
    }

    #[test]
    fn row_attributes_strip_accessors_and_nested_values() {
        let ty = EntityType::new("Order", &["name"])
            .belongs_to("customer", "Customer", "customerId")
            .has_many("items", "Item", "orderId");
        let payload = Payload::from_json(json!({
            "id": 1,
            "name": "o1",
            "customerId": 5,
            "customer": { "id": 5 },
            "items": [{ "quantity": 7 }],
            "stray": { "nested": true },
        }))
        .unwrap();

        let attrs = payload.row_attributes(&ty);
        assert_eq!(attrs.get("id"), Some(&Value::Integer(1)));
        assert_eq!(attrs.get("customerId"), Some(&Value::Integer(5)));
        assert!(!attrs.contains_key("customer"));
        assert!(!attrs.contains_key("items"));
        assert!(!attrs.contains_key("stray"));
    }

    #[test]
    fn null_field_becomes_null_attribute() {
        let ty = EntityType::new("Order", &["name"]);
        let payload = Payload::from_json(json!({ "id": 1, "name": null })).unwrap();
        assert_eq!(
            payload.row_attributes(&ty).get("name"),
            Some(&Value::Null)
        );
    }

    #[test]
    fn key_needs_every_part() {
        let ty = EntityType::new("Order", &["name"]);
        let keyed = Payload::from_json(json!({ "id": "3" })).unwrap();
        assert_eq!(
            keyed.key(&ty).unwrap(),
            KeyValue::single(Value::Integer(3)).unwrap()
        );

        let keyless = Payload::from_json(json!({ "name": "o1" })).unwrap();
        assert!(keyless.key(&ty).is_none());

        let null_key = Payload::from_json(json!({ "id": null })).unwrap();
        assert!(null_key.key(&ty).is_none());
    }
}
