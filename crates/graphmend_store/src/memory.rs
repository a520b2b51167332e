//! In-memory reference store adapter.
//!
//! Backs the test suite and zero-setup embedding. Rows live in
//! schema-checked tables keyed by canonical primary key; a transaction
//! snapshots the table state at begin and restores it on rollback, with
//! statements applying live in between. Statements issued concurrently
//! against one transaction handle are serialized by the table lock.
//!
//! One write transaction at a time — concurrent transactions against
//! the same store are not isolated from each other.

use crate::adapter::{EntityStore, StoreTransaction};
use crate::entity::{Attributes, Entity};
use crate::error::{StoreError, StoreResult};
use crate::schema::{EntityType, RelationKind, Schema};
use crate::value::{KeyValue, Value};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

type Row = Attributes;
type Table = BTreeMap<KeyValue, Row>;
type Tables = BTreeMap<String, Table>;

struct StoreInner {
    schema: Schema,
    tables: RwLock<Tables>,
    counters: Mutex<BTreeMap<String, i64>>,
}

/// A schema-checked, transactional, in-memory entity store.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Active,
    Committed,
    RolledBack,
}

struct TxInner {
    store: Arc<StoreInner>,
    snapshot: Mutex<Option<Tables>>,
    state: Mutex<TxState>,
}

/// Transaction handle for [`InMemoryStore`]. Cheap to clone; all clones
/// refer to the same transaction.
#[derive(Clone)]
pub struct MemTransaction {
    inner: Arc<TxInner>,
}

impl InMemoryStore {
    /// Creates a store serving the given schema, with one empty table
    /// per declared type.
    pub fn new(schema: Schema) -> Self {
        let tables = schema
            .types()
            .map(|ty| (ty.name.clone(), Table::new()))
            .collect();
        Self {
            inner: Arc::new(StoreInner {
                schema,
                tables: RwLock::new(tables),
                counters: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Inserts a committed row outside any transaction. Test setup
    /// convenience.
    pub fn seed(&self, type_name: &str, attrs: Attributes) -> StoreResult<Entity> {
        self.inner.insert_row(type_name, attrs)
    }

    /// Reads a committed row outside any transaction. Test convenience.
    pub fn fetch(&self, type_name: &str, key: &KeyValue) -> StoreResult<Option<Entity>> {
        self.inner.find(type_name, key)
    }

    /// Number of rows currently in a table.
    pub fn count(&self, type_name: &str) -> StoreResult<usize> {
        self.inner.entity_type(type_name)?;
        Ok(self
            .inner
            .tables
            .read()
            .get(type_name)
            .map(BTreeMap::len)
            .unwrap_or(0))
    }
}

impl StoreInner {
    fn entity_type(&self, name: &str) -> StoreResult<&EntityType> {
        self.schema
            .get(name)
            .ok_or_else(|| StoreError::unknown_type(name))
    }

    fn validate_attrs(&self, ty: &EntityType, attrs: &Attributes) -> StoreResult<()> {
        for name in attrs.keys() {
            if !ty.has_attribute(name) {
                return Err(StoreError::validation(
                    &ty.name,
                    format!("undeclared attribute {name:?}"),
                ));
            }
        }
        Ok(())
    }

    /// Canonicalizes primary-key attributes in place so stored rows and
    /// table keys agree.
    fn canonicalize_key_attrs(ty: &EntityType, attrs: &mut Attributes) {
        for pk in &ty.primary_key {
            if let Some(canonical) = attrs.get(pk).map(Value::canonical) {
                attrs.insert(pk.clone(), canonical);
            }
        }
    }

    fn key_of(ty: &EntityType, attrs: &Attributes) -> Option<KeyValue> {
        KeyValue::try_new(
            ty.primary_key
                .iter()
                .map(|a| attrs.get(a).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    fn insert_row(&self, type_name: &str, mut attrs: Attributes) -> StoreResult<Entity> {
        let ty = self.entity_type(type_name)?;
        self.validate_attrs(ty, &attrs)?;

        if let Some(version) = &ty.version_attribute {
            match attrs.get(version) {
                None | Some(Value::Null) => {
                    attrs.insert(version.clone(), Value::Integer(0));
                }
                Some(Value::Integer(_)) => {}
                Some(other) => {
                    return Err(StoreError::validation(
                        type_name,
                        format!("version attribute must be an integer, got {other}"),
                    ));
                }
            }
        }

        Self::canonicalize_key_attrs(ty, &mut attrs);
        let key = match Self::key_of(ty, &attrs) {
            Some(key) => key,
            None => {
                // Generate an id only for a single-attribute key.
                let [pk] = ty.primary_key.as_slice() else {
                    return Err(StoreError::missing_primary_key(type_name));
                };
                let mut counters = self.counters.lock();
                let next = counters.get(type_name).copied().unwrap_or(0) + 1;
                counters.insert(type_name.to_string(), next);
                attrs.insert(pk.clone(), Value::Integer(next));
                match KeyValue::single(Value::Integer(next)) {
                    Some(key) => key,
                    None => return Err(StoreError::missing_primary_key(type_name)),
                }
            }
        };

        // Keep generated ids ahead of any caller-assigned integer key.
        if let [Value::Integer(n)] = key.parts() {
            let mut counters = self.counters.lock();
            let current = counters.get(type_name).copied().unwrap_or(0);
            if *n > current {
                counters.insert(type_name.to_string(), *n);
            }
        }

        let mut tables = self.tables.write();
        let table = tables.entry(type_name.to_string()).or_default();
        if table.contains_key(&key) {
            return Err(StoreError::database(format!(
                "duplicate key {key} for {type_name}"
            )));
        }
        table.insert(key, attrs.clone());
        tracing::trace!(type_name, "inserted row");
        Ok(Entity::new(type_name, attrs))
    }

    fn patch_row(&self, type_name: &str, mut attrs: Attributes) -> StoreResult<Entity> {
        let ty = self.entity_type(type_name)?;
        self.validate_attrs(ty, &attrs)?;
        Self::canonicalize_key_attrs(ty, &mut attrs);
        let key = Self::key_of(ty, &attrs)
            .ok_or_else(|| StoreError::missing_primary_key(type_name))?;

        let mut tables = self.tables.write();
        let row = tables
            .get_mut(type_name)
            .and_then(|table| table.get_mut(&key))
            .ok_or_else(|| {
                StoreError::database(format!("no {type_name} row with key {key} to update"))
            })?;

        if let Some(version) = ty.version_attribute.clone() {
            let stored = match row.get(&version) {
                Some(Value::Integer(n)) => *n,
                _ => 0,
            };
            let expected = match attrs.get(&version) {
                Some(Value::Integer(n)) => *n,
                Some(Value::Null) | None => stored,
                Some(other) => {
                    return Err(StoreError::validation(
                        type_name,
                        format!("version attribute must be an integer, got {other}"),
                    ));
                }
            };
            if expected != stored {
                return Err(StoreError::OptimisticLock {
                    type_name: type_name.to_string(),
                    key: key.to_string(),
                    expected,
                    actual: stored,
                });
            }
            attrs.insert(version, Value::Integer(stored + 1));
        }

        for (name, value) in attrs {
            row.insert(name, value);
        }
        tracing::trace!(type_name, "patched row");
        Ok(Entity::new(type_name, row.clone()))
    }

    fn delete_row(&self, type_name: &str, key: &KeyValue) -> StoreResult<()> {
        self.entity_type(type_name)?;
        let removed = self
            .tables
            .write()
            .get_mut(type_name)
            .and_then(|table| table.remove(key));
        if removed.is_none() {
            return Err(StoreError::database(format!(
                "no {type_name} row with key {key} to delete"
            )));
        }
        tracing::trace!(type_name, "deleted row");
        Ok(())
    }

    fn find(&self, type_name: &str, key: &KeyValue) -> StoreResult<Option<Entity>> {
        self.entity_type(type_name)?;
        Ok(self
            .tables
            .read()
            .get(type_name)
            .and_then(|table| table.get(key))
            .map(|row| Entity::new(type_name, row.clone())))
    }

    fn related(&self, type_name: &str, parent: &Entity, accessor: &str) -> StoreResult<Vec<Entity>> {
        let ty = self.entity_type(type_name)?;
        let rel = ty
            .relationship(accessor)
            .ok_or_else(|| StoreError::unknown_relationship(type_name, accessor))?;
        self.entity_type(&rel.target)?;

        match rel.kind {
            RelationKind::BelongsTo => {
                let Some(fk) = parent.get(&rel.foreign_key) else {
                    return Ok(Vec::new());
                };
                let Some(key) = KeyValue::single(fk.clone()) else {
                    return Ok(Vec::new());
                };
                Ok(self.find(&rel.target, &key)?.into_iter().collect())
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                let source_attr = rel
                    .source_key
                    .clone()
                    .unwrap_or_else(|| ty.primary_key[0].clone());
                let Some(source) = parent.get(&source_attr) else {
                    return Ok(Vec::new());
                };
                let source = source.canonical();
                if source.is_empty_key() {
                    return Ok(Vec::new());
                }
                let tables = self.tables.read();
                let rows = tables
                    .get(&rel.target)
                    .map(|table| {
                        table
                            .values()
                            .filter(|row| {
                                row.get(&rel.foreign_key)
                                    .map(|v| v.canonical() == source)
                                    .unwrap_or(false)
                            })
                            .map(|row| Entity::new(&rel.target, row.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(rows)
            }
            RelationKind::BelongsToMany => Err(StoreError::database(
                "join-table traversal is not supported",
            )),
        }
    }
}

impl MemTransaction {
    fn check_active(&self) -> StoreResult<()> {
        if self.is_finished() {
            return Err(StoreError::TransactionFinished);
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemTransaction {
    async fn commit(&self) -> StoreResult<()> {
        let mut state = self.inner.state.lock();
        if *state != TxState::Active {
            return Err(StoreError::TransactionFinished);
        }
        *state = TxState::Committed;
        *self.inner.snapshot.lock() = None;
        tracing::debug!("transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> StoreResult<()> {
        let mut state = self.inner.state.lock();
        if *state != TxState::Active {
            return Err(StoreError::TransactionFinished);
        }
        let snapshot = self
            .inner
            .snapshot
            .lock()
            .take()
            .ok_or_else(|| StoreError::database("transaction snapshot missing"))?;
        *self.inner.store.tables.write() = snapshot;
        *state = TxState::RolledBack;
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    fn is_finished(&self) -> bool {
        *self.inner.state.lock() != TxState::Active
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    type Tx = MemTransaction;

    fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    async fn begin(&self) -> StoreResult<Self::Tx> {
        let snapshot = self.inner.tables.read().clone();
        Ok(MemTransaction {
            inner: Arc::new(TxInner {
                store: Arc::clone(&self.inner),
                snapshot: Mutex::new(Some(snapshot)),
                state: Mutex::new(TxState::Active),
            }),
        })
    }

    async fn create(
        &self,
        type_name: &str,
        attrs: Attributes,
        tx: &Self::Tx,
    ) -> StoreResult<Entity> {
        tx.check_active()?;
        self.inner.insert_row(type_name, attrs)
    }

    async fn save(&self, type_name: &str, attrs: Attributes, tx: &Self::Tx) -> StoreResult<Entity> {
        tx.check_active()?;
        self.inner.patch_row(type_name, attrs)
    }

    async fn destroy(&self, type_name: &str, key: &KeyValue, tx: &Self::Tx) -> StoreResult<()> {
        tx.check_active()?;
        self.inner.delete_row(type_name, key)
    }

    async fn find_by_key(
        &self,
        type_name: &str,
        key: &KeyValue,
        tx: Option<&Self::Tx>,
    ) -> StoreResult<Option<Entity>> {
        if let Some(tx) = tx {
            tx.check_active()?;
        }
        self.inner.find(type_name, key)
    }

    async fn related(
        &self,
        type_name: &str,
        parent: &Entity,
        accessor: &str,
        tx: Option<&Self::Tx>,
    ) -> StoreResult<Vec<Entity>> {
        if let Some(tx) = tx {
            tx.check_active()?;
        }
        self.inner.related(type_name, parent, accessor)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("tables", &self.inner.tables.read().len())
            .finish_non_exhaustive()
    }
}
