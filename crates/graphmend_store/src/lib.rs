//! # Graphmend Store
//!
//! Entity store contract and in-memory reference adapter for graphmend.
//!
//! This crate provides:
//! - Scalar values and canonical primary keys
//! - Entity type / relationship metadata
//! - The transactional store adapter traits the reconciliation core
//!   drives
//! - An in-memory adapter for tests and zero-setup embedding
//!
//! The reconciliation engine itself lives in `graphmend_core`; anything
//! implementing [`EntityStore`] can sit underneath it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod entity;
mod error;
mod memory;
mod schema;
mod value;

pub use adapter::{EntityStore, StoreTransaction};
pub use entity::{Attributes, Entity, Related};
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, MemTransaction};
pub use schema::{EntityType, RelationKind, Relationship, Schema};
pub use value::{KeyValue, Value};
