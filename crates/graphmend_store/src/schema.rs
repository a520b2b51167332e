//! Entity type and relationship metadata.
//!
//! The reconciliation core treats this metadata as read-only: it is
//! declared once by whoever owns the store and consulted at every
//! traversal point.

use std::collections::BTreeMap;

/// The shape of a relationship edge.
///
/// A closed tag: every traversal point in the core matches all four
/// variants exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Source holds the foreign key; at most one target per source.
    BelongsTo,
    /// Target holds the foreign key; at most one linked target per source.
    HasOne,
    /// Target holds the foreign key; zero or more linked targets.
    HasMany,
    /// Join-table relationship. Recognized, never traversed for embedding.
    BelongsToMany,
}

/// A directional relationship from one entity type to another.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Field name under which the relationship appears on payloads and
    /// entities.
    pub accessor: String,
    /// The relationship shape.
    pub kind: RelationKind,
    /// Name of the target entity type.
    pub target: String,
    /// Foreign-key attribute name. Lives on the source for `BelongsTo`,
    /// on the target for `HasOne`/`HasMany`.
    pub foreign_key: String,
    /// For `HasOne`/`HasMany`: the source-side attribute the foreign key
    /// references. Defaults to the source's primary key when `None`.
    pub source_key: Option<String>,
}

/// A named record shape: scalar attributes, a primary-key attribute set,
/// an optional optimistic-lock version attribute, and declared
/// relationships.
#[derive(Debug, Clone)]
pub struct EntityType {
    /// Type name.
    pub name: String,
    /// Declared scalar attribute names (primary key and foreign keys
    /// included).
    pub attributes: Vec<String>,
    /// Primary-key attribute set, commonly a single attribute.
    pub primary_key: Vec<String>,
    /// Version attribute for optimistic locking, if any.
    pub version_attribute: Option<String>,
    /// Declared relationships to other entity types.
    pub relationships: Vec<Relationship>,
}

impl EntityType {
    /// Creates a type with an integer `id` primary key and the given
    /// scalar attributes (the `id` attribute is added implicitly).
    pub fn new(name: impl Into<String>, attributes: &[&str]) -> Self {
        let mut attrs = vec!["id".to_string()];
        attrs.extend(attributes.iter().map(|a| a.to_string()));
        Self {
            name: name.into(),
            attributes: attrs,
            primary_key: vec!["id".to_string()],
            version_attribute: None,
            relationships: Vec::new(),
        }
    }

    /// Replaces the primary-key attribute set.
    ///
    /// The named attributes are appended to the declared attribute list
    /// if not already present; the implicit `id` is dropped unless named.
    pub fn primary_key(mut self, attributes: &[&str]) -> Self {
        self.primary_key = attributes.iter().map(|a| a.to_string()).collect();
        let keep_id = self.primary_key.iter().any(|p| p == "id");
        self.attributes.retain(|a| a != "id" || keep_id);
        for pk in &self.primary_key {
            if !self.attributes.iter().any(|a| a == pk) {
                self.attributes.push(pk.clone());
            }
        }
        self
    }

    /// Declares a version attribute for optimistic locking.
    pub fn versioned(mut self, attribute: &str) -> Self {
        if !self.attributes.iter().any(|a| a == attribute) {
            self.attributes.push(attribute.to_string());
        }
        self.version_attribute = Some(attribute.to_string());
        self
    }

    /// Declares a `BelongsTo` relationship. The foreign key lives on this
    /// type and is added to the declared attributes.
    pub fn belongs_to(mut self, accessor: &str, target: &str, foreign_key: &str) -> Self {
        if !self.attributes.iter().any(|a| a == foreign_key) {
            self.attributes.push(foreign_key.to_string());
        }
        self.relationships.push(Relationship {
            accessor: accessor.to_string(),
            kind: RelationKind::BelongsTo,
            target: target.to_string(),
            foreign_key: foreign_key.to_string(),
            source_key: None,
        });
        self
    }

    /// Declares a `HasOne` relationship. The foreign key lives on the
    /// target type.
    pub fn has_one(mut self, accessor: &str, target: &str, foreign_key: &str) -> Self {
        self.relationships.push(Relationship {
            accessor: accessor.to_string(),
            kind: RelationKind::HasOne,
            target: target.to_string(),
            foreign_key: foreign_key.to_string(),
            source_key: None,
        });
        self
    }

    /// Declares a `HasMany` relationship. The foreign key lives on the
    /// target type.
    pub fn has_many(mut self, accessor: &str, target: &str, foreign_key: &str) -> Self {
        self.relationships.push(Relationship {
            accessor: accessor.to_string(),
            kind: RelationKind::HasMany,
            target: target.to_string(),
            foreign_key: foreign_key.to_string(),
            source_key: None,
        });
        self
    }

    /// Declares a `BelongsToMany` relationship through a join table.
    /// Recognized as a shape, never traversed for recursive embedding.
    pub fn belongs_to_many(mut self, accessor: &str, target: &str, through_key: &str) -> Self {
        self.relationships.push(Relationship {
            accessor: accessor.to_string(),
            kind: RelationKind::BelongsToMany,
            target: target.to_string(),
            foreign_key: through_key.to_string(),
            source_key: None,
        });
        self
    }

    /// Overrides the source-side key of the most recently declared
    /// relationship.
    pub fn source_key(mut self, attribute: &str) -> Self {
        if let Some(rel) = self.relationships.last_mut() {
            rel.source_key = Some(attribute.to_string());
        }
        self
    }

    /// Looks up a relationship by accessor name.
    pub fn relationship(&self, accessor: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.accessor == accessor)
    }

    /// Returns true if `name` is a relationship accessor of this type.
    pub fn is_accessor(&self, name: &str) -> bool {
        self.relationships.iter().any(|r| r.accessor == name)
    }

    /// Returns true if `name` is a declared scalar attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }
}

/// The full set of entity types the store knows about.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: BTreeMap<String, EntityType>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity type. Replaces any previous type of the same name.
    pub fn with(mut self, entity_type: EntityType) -> Self {
        self.types.insert(entity_type.name.clone(), entity_type);
        self
    }

    /// Looks up an entity type by name.
    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    /// Iterates over all declared types.
    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }
}
