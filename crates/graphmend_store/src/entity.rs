//! In-memory entity representation.

use crate::schema::EntityType;
use crate::value::{KeyValue, Value};
use std::collections::BTreeMap;

/// Scalar attribute map of one entity row.
pub type Attributes = BTreeMap<String, Value>;

/// A populated relationship accessor on an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Single-valued accessor (`BelongsTo` / `HasOne`).
    One(Option<Box<Entity>>),
    /// Collection accessor (`HasMany`).
    Many(Vec<Entity>),
}

/// One persisted entity: its scalar attributes plus whichever
/// relationship accessors have been populated.
///
/// Entities are transient views over store rows. They are produced by
/// store reads and reconciliation, and discarded once an operation's
/// result has been returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    type_name: String,
    /// Scalar attributes of the row.
    pub attributes: Attributes,
    /// Populated relationship accessors, by accessor name.
    pub related: BTreeMap<String, Related>,
}

impl Entity {
    /// Creates an entity of the given type from its attributes.
    pub fn new(type_name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            type_name: type_name.into(),
            attributes,
            related: BTreeMap::new(),
        }
    }

    /// The entity's type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Reads a scalar attribute.
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Writes a scalar attribute.
    pub fn set(&mut self, attribute: impl Into<String>, value: Value) {
        self.attributes.insert(attribute.into(), value);
    }

    /// Removes a scalar attribute, returning its previous value.
    pub fn remove(&mut self, attribute: &str) -> Option<Value> {
        self.attributes.remove(attribute)
    }

    /// The entity's canonical primary key per its type metadata.
    ///
    /// `None` when any key attribute is missing or empty — an entity in
    /// that state cannot be matched against store rows.
    pub fn key(&self, entity_type: &EntityType) -> Option<KeyValue> {
        let parts = entity_type
            .primary_key
            .iter()
            .map(|attr| self.attributes.get(attr).cloned().unwrap_or(Value::Null))
            .collect();
        KeyValue::try_new(parts)
    }

    /// Populates a relationship accessor.
    pub fn set_related(&mut self, accessor: impl Into<String>, related: Related) {
        self.related.insert(accessor.into(), related);
    }

    /// Reads a single-valued accessor. `None` when the accessor has not
    /// been populated or holds a collection.
    pub fn related_one(&self, accessor: &str) -> Option<&Entity> {
        match self.related.get(accessor) {
            Some(Related::One(Some(entity))) => Some(entity),
            _ => None,
        }
    }

    /// Reads a collection accessor. Empty when the accessor has not been
    /// populated.
    pub fn related_many(&self, accessor: &str) -> &[Entity] {
        match self.related.get(accessor) {
            Some(Related::Many(entities)) => entities,
            _ => &[],
        }
    }

    /// Returns true if the accessor is populated and explicitly empty
    /// (a cleared `BelongsTo`/`HasOne`).
    pub fn related_is_none(&self, accessor: &str) -> bool {
        matches!(self.related.get(accessor), Some(Related::One(None)))
    }
}
