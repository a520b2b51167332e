//! # Graphmend Core
//!
//! Transactional reconciliation of nested entity graphs.
//!
//! A caller submits a root payload plus related payloads reachable
//! through one-to-one, one-to-many, and many-to-one relationships, and
//! an include tree naming which relationships may be traversed. The
//! engine applies insert-or-update recursively to every entity in the
//! graph, deletes stale children, relinks relationships, and returns a
//! fully reloaded, cleaned copy — all inside one transaction with
//! commit/rollback semantics and optimistic-locking awareness.
//!
//! This crate provides:
//! - The set-diff utility partitioning desired vs. current collections
//! - Include trees with builder helpers and schema validation
//! - The recursive reconciler
//! - The transaction orchestrator ([`GraphEngine`])
//! - Reload and presentation helpers (foreign-key pruning, plain
//!   projection)
//!
//! Storage lives behind the `graphmend_store` adapter traits; anything
//! implementing them can sit underneath the engine.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod diff;
mod engine;
mod error;
mod include;
mod join;
mod payload;
mod reconcile;
mod reload;

pub use diff::{diff, Delta};
pub use engine::{GraphEngine, Options, Persisted, ReloadMode, ReloadOptions};
pub use error::{GraphError, GraphResult};
pub use include::{validate_include, when, IncludeNode};
pub use join::join_settled;
pub use payload::{Field, Payload};
pub use reconcile::Reconciler;
pub use reload::{prune_foreign_keys, reload_graph, to_plain};
