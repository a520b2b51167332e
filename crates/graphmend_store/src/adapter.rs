//! The store adapter contract.
//!
//! The reconciliation core drives a store exclusively through these two
//! traits. Implementations own schema, persistence, and the
//! optimistic-lock check; the core owns graph traversal and sequencing.

use crate::entity::{Attributes, Entity};
use crate::error::StoreResult;
use crate::schema::Schema;
use crate::value::KeyValue;
use async_trait::async_trait;

/// One open transaction against a store.
///
/// Handles are cloneable and shared read/write across every nested
/// operation of a single graph call; the adapter is responsible for
/// safely interleaving statements issued against one handle from
/// concurrent sub-operations.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    /// Commits the transaction. Fails if already finished.
    async fn commit(&self) -> StoreResult<()>;

    /// Rolls the transaction back. Fails if already finished.
    async fn rollback(&self) -> StoreResult<()>;

    /// Returns true once the transaction has committed or rolled back.
    fn is_finished(&self) -> bool;
}

/// A transactional entity store.
///
/// Reads take an optional transaction so a caller holding an external
/// transaction can observe its own uncommitted writes; `None` reads the
/// committed state.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// The adapter's transaction handle type.
    type Tx: StoreTransaction + Clone + Send + Sync;

    /// The schema this store serves.
    fn schema(&self) -> &Schema;

    /// Begins a new transaction.
    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// Inserts a new row from the given attributes.
    ///
    /// A caller-assigned primary key is preserved as the row's identity;
    /// a missing single-attribute key is generated by the store. For
    /// versioned types the version attribute is initialized (to the
    /// supplied value, else zero).
    async fn create(&self, type_name: &str, attrs: Attributes, tx: &Self::Tx)
        -> StoreResult<Entity>;

    /// Patches the row identified by the primary key within `attrs`:
    /// only the supplied attributes change.
    ///
    /// For versioned types this is a guarded compare-and-swap: the
    /// supplied version value (defaulting to the stored one when not
    /// supplied) must match the stored version, which then increments.
    async fn save(&self, type_name: &str, attrs: Attributes, tx: &Self::Tx)
        -> StoreResult<Entity>;

    /// Deletes the row with the given key. Missing rows are an error.
    async fn destroy(&self, type_name: &str, key: &KeyValue, tx: &Self::Tx) -> StoreResult<()>;

    /// Looks up a row by primary key.
    async fn find_by_key(
        &self,
        type_name: &str,
        key: &KeyValue,
        tx: Option<&Self::Tx>,
    ) -> StoreResult<Option<Entity>>;

    /// Fetches the rows currently linked to `parent` through the named
    /// relationship: zero or one for `BelongsTo`/`HasOne`, any number
    /// for `HasMany`.
    async fn related(
        &self,
        type_name: &str,
        parent: &Entity,
        accessor: &str,
        tx: Option<&Self::Tx>,
    ) -> StoreResult<Vec<Entity>>;
}
