//! Transaction orchestration around graph reconciliation.
//!
//! Wraps one reconciler invocation in a transaction boundary: begin,
//! reconcile, commit on success, roll back on failure, then reload the
//! persisted graph for the caller. Caller-supplied external transactions
//! are used as-is and never committed or rolled back here — their
//! lifecycle belongs to the caller.

use crate::error::{GraphError, GraphResult};
use crate::include::{validate_include, IncludeNode};
use crate::payload::Payload;
use crate::reconcile::Reconciler;
use crate::reload::{prune_foreign_keys, reload_graph, to_plain};
use graphmend_store::{Entity, EntityStore, StoreError, StoreTransaction};
use std::sync::Arc;

/// How to reload the persisted graph after an operation.
#[derive(Debug, Clone)]
pub struct ReloadOptions {
    /// Include tree for the fresh read. Defaults to the operation's own
    /// include tree.
    pub include: Option<Vec<IncludeNode>>,
    /// Strip foreign keys made redundant by embedded relationships.
    pub prune: bool,
    /// Return a plain JSON structure instead of a store entity.
    pub plain: bool,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            include: None,
            prune: true,
            plain: false,
        }
    }
}

/// Reload behavior after commit.
#[derive(Debug, Clone)]
pub enum ReloadMode {
    /// Return the in-memory reconciled entity as-is.
    Skip,
    /// Perform a fresh read with the given options.
    Load(ReloadOptions),
}

impl Default for ReloadMode {
    fn default() -> Self {
        ReloadMode::Load(ReloadOptions::default())
    }
}

/// Options for one insert/update operation.
pub struct Options<S: EntityStore> {
    /// Caller-owned transaction. When present, the engine joins it and
    /// never commits or rolls back.
    pub transaction: Option<S::Tx>,
    /// Reload behavior. Defaults to a pruned, non-plain fresh read.
    pub reload: ReloadMode,
}

impl<S: EntityStore> Default for Options<S> {
    fn default() -> Self {
        Self {
            transaction: None,
            reload: ReloadMode::default(),
        }
    }
}

impl<S: EntityStore> Options<S> {
    /// Options joining a caller-owned transaction.
    pub fn external(tx: S::Tx) -> Self {
        Self {
            transaction: Some(tx),
            ..Self::default()
        }
    }

    /// Options skipping the reload step.
    pub fn no_reload() -> Self {
        Self {
            transaction: None,
            reload: ReloadMode::Skip,
        }
    }

    /// Options with explicit reload settings.
    pub fn reload_with(options: ReloadOptions) -> Self {
        Self {
            transaction: None,
            reload: ReloadMode::Load(options),
        }
    }
}

/// Result of a graph operation: the persisted root entity, or its plain
/// projection when the reload asked for one.
#[derive(Debug, Clone)]
pub enum Persisted {
    /// A store entity.
    Entity(Entity),
    /// A plain JSON structure.
    Plain(serde_json::Value),
}

impl Persisted {
    /// The entity form, if this result holds one.
    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Persisted::Entity(entity) => Some(entity),
            Persisted::Plain(_) => None,
        }
    }

    /// Borrowed entity form, if this result holds one.
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Persisted::Entity(entity) => Some(entity),
            Persisted::Plain(_) => None,
        }
    }

    /// The plain form, if this result holds one.
    pub fn into_plain(self) -> Option<serde_json::Value> {
        match self {
            Persisted::Plain(value) => Some(value),
            Persisted::Entity(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Insert,
    Update,
}

/// The caller-facing operation surface: insert or update a nested graph
/// as one logical, transactional operation.
pub struct GraphEngine<S: EntityStore> {
    store: Arc<S>,
}

impl<S: EntityStore> GraphEngine<S> {
    /// Creates an engine over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Inserts `payload` as a new entity graph rooted at `type_name`.
    pub async fn insert(
        &self,
        type_name: &str,
        payload: Payload,
        include: &[IncludeNode],
        options: Options<S>,
    ) -> GraphResult<Persisted> {
        self.run(Operation::Insert, type_name, payload, include, options)
            .await
    }

    /// Updates the existing entity graph rooted at the row the payload's
    /// primary key names.
    pub async fn update(
        &self,
        type_name: &str,
        payload: Payload,
        include: &[IncludeNode],
        options: Options<S>,
    ) -> GraphResult<Persisted> {
        self.run(Operation::Update, type_name, payload, include, options)
            .await
    }

    async fn run(
        &self,
        operation: Operation,
        type_name: &str,
        payload: Payload,
        include: &[IncludeNode],
        options: Options<S>,
    ) -> GraphResult<Persisted> {
        let schema = self.store.schema();
        validate_include(schema, type_name, include)?;
        if let ReloadMode::Load(ReloadOptions {
            include: Some(reload_include),
            ..
        }) = &options.reload
        {
            validate_include(schema, type_name, reload_include)?;
        }

        let external = options.transaction.is_some();
        let tx = match options.transaction {
            Some(tx) => tx,
            None => self.store.begin().await?,
        };
        tracing::debug!(type_name, op = ?operation, external, "running graph operation");

        let reconciler = Reconciler::new(&*self.store);
        let result = match operation {
            Operation::Insert => {
                reconciler
                    .insert_graph(type_name, payload, include, &tx)
                    .await
            }
            Operation::Update => {
                reconciler
                    .update_graph(type_name, payload, include, &tx)
                    .await
            }
        };

        let entity = match result {
            Ok(entity) => {
                if !external {
                    tx.commit().await?;
                }
                entity
            }
            Err(error) => {
                if !external && !tx.is_finished() {
                    // A failed rollback must never mask the real cause.
                    if let Err(rollback_error) = tx.rollback().await {
                        tracing::warn!(error = %rollback_error, "rollback failed");
                    }
                }
                return Err(error);
            }
        };

        let reload_options = match options.reload {
            ReloadMode::Skip => return Ok(Persisted::Entity(entity)),
            ReloadMode::Load(reload_options) => reload_options,
        };
        let reload_include = reload_options.include.as_deref().unwrap_or(include);

        let ty = schema
            .get(type_name)
            .ok_or_else(|| GraphError::unknown_type(type_name))?;
        let key = entity
            .key(ty)
            .ok_or_else(|| GraphError::missing_primary_key(type_name))?;

        // An external transaction is still open: read through it so the
        // caller sees their own uncommitted writes.
        let tx_ref = if external { Some(&tx) } else { None };
        let mut fetched = reload_graph(&*self.store, type_name, &key, reload_include, tx_ref)
            .await?
            .ok_or_else(|| {
                GraphError::Store(StoreError::database(format!(
                    "no {type_name} row with key {key} after reconciliation"
                )))
            })?;

        if reload_options.prune {
            prune_foreign_keys(schema, &mut fetched, reload_include);
        }
        if reload_options.plain {
            return Ok(Persisted::Plain(to_plain(schema, &fetched, reload_include)));
        }
        Ok(Persisted::Entity(fetched))
    }
}
