//! Reload and presentation: re-fetching a persisted graph and cleaning
//! it up for callers.

use crate::error::{GraphError, GraphResult};
use crate::include::IncludeNode;
use futures::future::BoxFuture;
use graphmend_store::{Entity, EntityStore, EntityType, KeyValue, Related, RelationKind, Schema, Value};

/// Re-fetches an entity and its include tree from the store.
///
/// Pass the operation's transaction when the caller owns an external,
/// still-open transaction so its uncommitted writes are visible; `None`
/// reads committed state.
pub async fn reload_graph<S: EntityStore>(
    store: &S,
    type_name: &str,
    key: &KeyValue,
    include: &[IncludeNode],
    tx: Option<&S::Tx>,
) -> GraphResult<Option<Entity>> {
    let ty = store
        .schema()
        .get(type_name)
        .ok_or_else(|| GraphError::unknown_type(type_name))?;
    let Some(mut entity) = store.find_by_key(type_name, key, tx).await? else {
        return Ok(None);
    };
    attach(store, ty, &mut entity, include, tx).await?;
    Ok(Some(entity))
}

fn attach<'a, S: EntityStore>(
    store: &'a S,
    ty: &'a EntityType,
    entity: &'a mut Entity,
    include: &'a [IncludeNode],
    tx: Option<&'a S::Tx>,
) -> BoxFuture<'a, GraphResult<()>> {
    Box::pin(async move {
        for node in include {
            let rel = ty
                .relationship(&node.accessor)
                .ok_or_else(|| GraphError::UnknownInclude {
                    type_name: ty.name.clone(),
                    accessor: node.accessor.clone(),
                })?;
            let target_ty = store
                .schema()
                .get(&rel.target)
                .ok_or_else(|| GraphError::unknown_type(&rel.target))?;
            match rel.kind {
                RelationKind::BelongsTo | RelationKind::HasOne => {
                    let rows = store
                        .related(&ty.name, entity, &node.accessor, tx)
                        .await?;
                    match rows.into_iter().next() {
                        Some(mut child) => {
                            attach(store, target_ty, &mut child, &node.children, tx).await?;
                            entity.set_related(
                                node.accessor.clone(),
                                Related::One(Some(Box::new(child))),
                            );
                        }
                        None => {
                            entity.set_related(node.accessor.clone(), Related::One(None));
                        }
                    }
                }
                RelationKind::HasMany => {
                    let rows = store
                        .related(&ty.name, entity, &node.accessor, tx)
                        .await?;
                    let mut children = Vec::with_capacity(rows.len());
                    for mut child in rows {
                        attach(store, target_ty, &mut child, &node.children, tx).await?;
                        children.push(child);
                    }
                    entity.set_related(node.accessor.clone(), Related::Many(children));
                }
                RelationKind::BelongsToMany => {}
            }
        }
        Ok(())
    })
}

/// Strips foreign keys made redundant by an embedded relationship,
/// recursively through the include tree.
///
/// A foreign key that is simultaneously a primary key is never stripped:
/// removing it would destroy the row's identity (one-to-one child tables
/// keyed by the parent's id).
pub fn prune_foreign_keys(schema: &Schema, entity: &mut Entity, include: &[IncludeNode]) {
    let Some(ty) = schema.get(entity.type_name()) else {
        return;
    };
    for node in include {
        let Some(rel) = ty.relationship(&node.accessor) else {
            continue;
        };
        match rel.kind {
            RelationKind::BelongsTo => {
                // The foreign key lives on this entity.
                if !ty.primary_key.contains(&rel.foreign_key) {
                    entity.remove(&rel.foreign_key);
                }
                if let Some(Related::One(Some(child))) = entity.related.get_mut(&node.accessor) {
                    prune_foreign_keys(schema, child, &node.children);
                }
            }
            RelationKind::HasOne => {
                let keep = schema
                    .get(&rel.target)
                    .map(|t| t.primary_key.contains(&rel.foreign_key))
                    .unwrap_or(true);
                if let Some(Related::One(Some(child))) = entity.related.get_mut(&node.accessor) {
                    if !keep {
                        child.remove(&rel.foreign_key);
                    }
                    prune_foreign_keys(schema, child, &node.children);
                }
            }
            RelationKind::HasMany => {
                let keep = schema
                    .get(&rel.target)
                    .map(|t| t.primary_key.contains(&rel.foreign_key))
                    .unwrap_or(true);
                if let Some(Related::Many(children)) = entity.related.get_mut(&node.accessor) {
                    for child in children {
                        if !keep {
                            child.remove(&rel.foreign_key);
                        }
                        prune_foreign_keys(schema, child, &node.children);
                    }
                }
            }
            RelationKind::BelongsToMany => {}
        }
    }
}

/// Converts an entity into a plain JSON structure: declared attributes
/// plus the relationships named in the include tree, recursively. Other
/// relationships are omitted entirely, even if populated.
pub fn to_plain(schema: &Schema, entity: &Entity, include: &[IncludeNode]) -> serde_json::Value {
    let Some(ty) = schema.get(entity.type_name()) else {
        return serde_json::Value::Null;
    };
    let mut map = serde_json::Map::new();
    for attr in &ty.attributes {
        if let Some(value) = entity.get(attr) {
            map.insert(attr.clone(), value_to_json(value));
        }
    }
    for node in include {
        let Some(rel) = ty.relationship(&node.accessor) else {
            continue;
        };
        match rel.kind {
            RelationKind::BelongsTo | RelationKind::HasOne => {
                let value = match entity.related_one(&node.accessor) {
                    Some(child) => to_plain(schema, child, &node.children),
                    None => serde_json::Value::Null,
                };
                map.insert(node.accessor.clone(), value);
            }
            RelationKind::HasMany => {
                let children = entity
                    .related_many(&node.accessor)
                    .iter()
                    .map(|child| to_plain(schema, child, &node.children))
                    .collect();
                map.insert(node.accessor.clone(), serde_json::Value::Array(children));
            }
            RelationKind::BelongsToMany => {}
        }
    }
    serde_json::Value::Object(map)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::Number((*n).into()),
        Value::Text(t) => serde_json::Value::String(t.clone()),
    }
}
