//! Error types for graph reconciliation.

use graphmend_store::StoreError;
use thiserror::Error;

/// Result type for reconciliation operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors a graph operation can raise.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Store-level failure, passed through un-translated so callers can
    /// still match the store's taxonomy (optimistic lock vs. validation
    /// vs. generic database failure).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Include tree names a relationship the entity type does not
    /// declare.
    #[error("include names unknown relationship {accessor:?} on {type_name}")]
    UnknownInclude {
        /// Entity type consulted.
        type_name: String,
        /// The undeclared accessor.
        accessor: String,
    },

    /// Include tree names a join-table relationship, which cannot be
    /// recursively embedded.
    #[error("relationship {accessor:?} on {type_name} is a join table and cannot be embedded")]
    NotEmbeddable {
        /// Entity type consulted.
        type_name: String,
        /// The join-table accessor.
        accessor: String,
    },

    /// Entity type not declared in the store's schema.
    #[error("unknown entity type: {name}")]
    UnknownType {
        /// The undeclared type name.
        name: String,
    },

    /// An update payload carries no usable primary key for its root.
    #[error("update payload for {type_name} is missing its primary key")]
    MissingPrimaryKey {
        /// Entity type being updated.
        type_name: String,
    },

    /// Payload structure the reconciler cannot interpret.
    #[error("invalid payload: {message}")]
    InvalidPayload {
        /// What was malformed.
        message: String,
    },
}

impl GraphError {
    /// Creates an unknown-type error.
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    /// Creates a missing-primary-key error.
    pub fn missing_primary_key(type_name: impl Into<String>) -> Self {
        Self::MissingPrimaryKey {
            type_name: type_name.into(),
        }
    }

    /// Creates an invalid-payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Returns true if this error is an optimistic-lock conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, GraphError::Store(StoreError::OptimisticLock { .. }))
    }
}
