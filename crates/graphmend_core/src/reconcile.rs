//! Recursive insert-or-update over an entity graph.
//!
//! One traversal handles both entry points. For each entity: resolve the
//! `BelongsTo` relationships named in the include tree (so the row's own
//! foreign keys are known), persist the row itself, then converge the
//! `HasOne`/`HasMany` collections against the payload's desired state.
//! The upstream pass strictly precedes the self step, which strictly
//! precedes the downstream pass; across downstream siblings nothing is
//! ordered and everything joins under the all-settle discipline.

use crate::diff::diff;
use crate::error::{GraphError, GraphResult};
use crate::include::{node_for, IncludeNode};
use crate::join::join_settled;
use crate::payload::{Field, Payload};
use futures::future::BoxFuture;
use graphmend_store::{
    Entity, EntityStore, EntityType, Related, RelationKind, Relationship, Value,
};

/// Whether the self step creates a fresh row or saves an existing one.
#[derive(Debug, Clone, Copy)]
enum Mode {
    Insert,
    Update,
}

/// Applies insert-or-update semantics to one entity and its included
/// relationships, inside an already-open transaction.
pub struct Reconciler<'s, S: EntityStore> {
    store: &'s S,
}

impl<'s, S: EntityStore> Reconciler<'s, S> {
    /// Creates a reconciler over the given store.
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    fn entity_type(&self, name: &str) -> GraphResult<&'s EntityType> {
        self.store
            .schema()
            .get(name)
            .ok_or_else(|| GraphError::unknown_type(name))
    }

    /// Inserts `payload` as a new `type_name` row, recursing through
    /// `include`. Returns the persisted entity with its reconciled
    /// relationship accessors populated (not reloaded).
    pub fn insert_graph<'a>(
        &'a self,
        type_name: &'a str,
        payload: Payload,
        include: &'a [IncludeNode],
        tx: &'a S::Tx,
    ) -> BoxFuture<'a, GraphResult<Entity>> {
        Box::pin(self.traverse(type_name, payload, include, tx, Mode::Insert))
    }

    /// Updates the existing `type_name` row identified by the payload's
    /// primary key, recursing through `include`.
    pub fn update_graph<'a>(
        &'a self,
        type_name: &'a str,
        payload: Payload,
        include: &'a [IncludeNode],
        tx: &'a S::Tx,
    ) -> BoxFuture<'a, GraphResult<Entity>> {
        Box::pin(self.traverse(type_name, payload, include, tx, Mode::Update))
    }

    async fn traverse(
        &self,
        type_name: &str,
        mut payload: Payload,
        include: &[IncludeNode],
        tx: &S::Tx,
        mode: Mode,
    ) -> GraphResult<Entity> {
        let ty = self.entity_type(type_name)?;
        tracing::debug!(type_name, mode = ?mode, "reconciling entity");

        let upstream = self.apply_belongs_to(ty, &mut payload, include, tx).await?;

        let mut entity = match mode {
            Mode::Insert => {
                self.store
                    .create(&ty.name, payload.row_attributes(ty), tx)
                    .await?
            }
            Mode::Update => {
                if payload.key(ty).is_none() {
                    return Err(GraphError::missing_primary_key(&ty.name));
                }
                self.store
                    .save(&ty.name, payload.row_attributes(ty), tx)
                    .await?
            }
        };

        self.apply_has_relations(ty, &mut entity, &payload, include, tx)
            .await?;

        for (accessor, related) in upstream {
            entity.set_related(accessor, related);
        }
        Ok(entity)
    }

    /// Upstream pass: every `BelongsTo` relationship present in the
    /// payload is resolved before the owning row is written, so its
    /// foreign key is known at self-persist time.
    async fn apply_belongs_to(
        &self,
        ty: &'s EntityType,
        payload: &mut Payload,
        include: &[IncludeNode],
        tx: &S::Tx,
    ) -> GraphResult<Vec<(String, Related)>> {
        let mut resolved = Vec::new();
        for rel in &ty.relationships {
            match rel.kind {
                RelationKind::BelongsTo => {}
                RelationKind::HasOne | RelationKind::HasMany | RelationKind::BelongsToMany => {
                    continue;
                }
            }
            let Some(field) = payload.remove(&rel.accessor) else {
                continue;
            };
            match field {
                Field::Null => {
                    // Unlink: clear the foreign key.
                    payload.insert(rel.foreign_key.clone(), Field::Scalar(Value::Null));
                    resolved.push((rel.accessor.clone(), Related::One(None)));
                }
                Field::One(nested) => {
                    if let Some(node) = node_for(include, &rel.accessor) {
                        let target = self.upsert(&rel.target, nested, &node.children, tx).await?;
                        let target_ty = self.entity_type(&rel.target)?;
                        let fk_value = target_ty
                            .primary_key
                            .first()
                            .and_then(|pk| target.get(pk))
                            .cloned()
                            .unwrap_or(Value::Null);
                        payload.insert(rel.foreign_key.clone(), Field::Scalar(fk_value));
                        resolved.push((rel.accessor.clone(), Related::One(Some(Box::new(target)))));
                    } else {
                        // Not included: link to the reference's key
                        // without recursing into it.
                        let target_ty = self.entity_type(&rel.target)?;
                        if let Some(Field::Scalar(v)) =
                            target_ty.primary_key.first().and_then(|pk| nested.field(pk))
                        {
                            payload.insert(rel.foreign_key.clone(), Field::Scalar(v.clone()));
                        }
                    }
                }
                Field::Scalar(v) => {
                    // An id-only reference: pass it straight into the
                    // foreign key.
                    payload.insert(rel.foreign_key.clone(), Field::Scalar(v));
                }
                Field::Many(_) => {
                    return Err(GraphError::invalid_payload(format!(
                        "field {:?} on {} holds a collection but the relationship is single-valued",
                        rel.accessor, ty.name
                    )));
                }
            }
        }
        Ok(resolved)
    }

    /// Downstream pass: converge `HasOne` and `HasMany` collections.
    /// The two shapes run as concurrent branches; both settle before the
    /// parent resolves.
    async fn apply_has_relations(
        &self,
        ty: &'s EntityType,
        entity: &mut Entity,
        payload: &Payload,
        include: &[IncludeNode],
        tx: &S::Tx,
    ) -> GraphResult<()> {
        type BranchResult = Vec<(String, RelationKind, Vec<Entity>)>;

        let parent: &Entity = &*entity;
        let mut one_jobs = Vec::new();
        let mut many_jobs = Vec::new();

        for node in include {
            let Some(rel) = ty.relationship(&node.accessor) else {
                continue;
            };
            match rel.kind {
                RelationKind::HasOne => {
                    let desired = match payload.field(&rel.accessor) {
                        Some(Field::One(p)) => vec![p.clone()],
                        Some(Field::Null) => Vec::new(),
                        // Absent or shape mismatch: leave untouched.
                        _ => continue,
                    };
                    one_jobs.push(self.apply_children(ty, parent, rel, node, desired, tx));
                }
                RelationKind::HasMany => {
                    let desired = match payload.field(&rel.accessor) {
                        Some(Field::Many(list)) => list.clone(),
                        Some(Field::Null) => Vec::new(),
                        _ => continue,
                    };
                    many_jobs.push(self.apply_children(ty, parent, rel, node, desired, tx));
                }
                // BelongsTo is the upstream pass; join tables are never
                // traversed.
                RelationKind::BelongsTo | RelationKind::BelongsToMany => {}
            }
        }

        let branches: Vec<BoxFuture<'_, GraphResult<BranchResult>>> = vec![
            Box::pin(async move { join_settled(one_jobs).await }),
            Box::pin(async move { join_settled(many_jobs).await }),
        ];
        let settled = join_settled(branches).await?;

        for (accessor, kind, children) in settled.into_iter().flatten() {
            let related = match kind {
                RelationKind::HasOne => Related::One(children.into_iter().next().map(Box::new)),
                _ => Related::Many(children),
            };
            entity.set_related(accessor, related);
        }
        Ok(())
    }

    /// Delta application for one `HasOne`/`HasMany` relationship: stamp
    /// the parent key onto the desired children, diff against the
    /// currently linked rows, then upsert the added, destroy the
    /// removed, and recursively update the existing — concurrently,
    /// joined under the all-settle discipline.
    fn apply_children<'a>(
        &'a self,
        parent_ty: &'a EntityType,
        parent: &'a Entity,
        rel: &'a Relationship,
        node: &'a IncludeNode,
        desired: Vec<Payload>,
        tx: &'a S::Tx,
    ) -> BoxFuture<'a, GraphResult<(String, RelationKind, Vec<Entity>)>> {
        Box::pin(async move {
            let source_attr = rel
                .source_key
                .as_deref()
                .unwrap_or_else(|| parent_ty.primary_key[0].as_str());
            let parent_key = parent.get(source_attr).cloned().ok_or_else(|| {
                GraphError::invalid_payload(format!(
                    "parent {} carries no {source_attr:?} to link {:?}",
                    parent_ty.name, rel.accessor
                ))
            })?;

            let desired: Vec<(usize, Payload)> = desired
                .into_iter()
                .enumerate()
                .map(|(index, mut p)| {
                    p.insert(rel.foreign_key.clone(), Field::Scalar(parent_key.clone()));
                    (index, p)
                })
                .collect();

            let target_ty = self.entity_type(&rel.target)?;
            let current = self
                .store
                .related(&parent_ty.name, parent, &rel.accessor, Some(tx))
                .await?;
            tracing::trace!(
                accessor = %rel.accessor,
                desired = desired.len(),
                current = current.len(),
                "applying relationship delta"
            );

            let delta = diff(
                desired,
                current,
                |(_, p)| p.key(target_ty),
                |c| c.key(target_ty),
            );

            let mut jobs: Vec<BoxFuture<'_, GraphResult<Option<(usize, Entity)>>>> = Vec::new();
            for (index, added) in delta.added {
                jobs.push(Box::pin(async move {
                    let child = self.upsert(&rel.target, added, &node.children, tx).await?;
                    Ok(Some((index, child)))
                }));
            }
            for removed in delta.removed {
                jobs.push(Box::pin(async move {
                    let key = removed
                        .key(target_ty)
                        .ok_or_else(|| GraphError::missing_primary_key(&rel.target))?;
                    self.store.destroy(&rel.target, &key, tx).await?;
                    Ok(None)
                }));
            }
            for ((index, existing), _current) in delta.existing {
                jobs.push(Box::pin(async move {
                    let child = self
                        .update_graph(&rel.target, existing, &node.children, tx)
                        .await?;
                    Ok(Some((index, child)))
                }));
            }

            let mut children: Vec<(usize, Entity)> =
                join_settled(jobs).await?.into_iter().flatten().collect();
            children.sort_by_key(|(index, _)| *index);
            Ok((
                rel.accessor.clone(),
                rel.kind,
                children.into_iter().map(|(_, child)| child).collect(),
            ))
        })
    }

    /// Insert-or-update routed by primary key: a payload carrying a full
    /// key updates the row it names when one exists (a caller-assigned
    /// key is otherwise preserved on insert); a keyless payload always
    /// inserts.
    fn upsert<'a>(
        &'a self,
        type_name: &'a str,
        payload: Payload,
        include: &'a [IncludeNode],
        tx: &'a S::Tx,
    ) -> BoxFuture<'a, GraphResult<Entity>> {
        Box::pin(async move {
            let ty = self.entity_type(type_name)?;
            if let Some(key) = payload.key(ty) {
                let found = self.store.find_by_key(type_name, &key, Some(tx)).await?;
                if found.is_some() {
                    return self.update_graph(type_name, payload, include, tx).await;
                }
            }
            self.insert_graph(type_name, payload, include, tx).await
        })
    }
}
