//! Error types for store adapters.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a store adapter can raise.
///
/// The reconciliation core never translates these: an
/// [`OptimisticLock`](StoreError::OptimisticLock) raised three levels
/// deep in a nested graph reaches the caller as-is, after the enclosing
/// transaction has rolled back.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Version attribute mismatch on save: a conflicting write committed
    /// since the caller read the row.
    #[error("optimistic lock failure on {type_name} {key}: expected version {expected}, found {actual}")]
    OptimisticLock {
        /// Entity type of the conflicting row.
        type_name: String,
        /// Primary key of the conflicting row.
        key: String,
        /// Version the caller carried.
        expected: i64,
        /// Version actually stored.
        actual: i64,
    },

    /// Malformed entity data rejected by the store.
    #[error("validation failed for {type_name}: {message}")]
    Validation {
        /// Entity type being written.
        type_name: String,
        /// What was malformed.
        message: String,
    },

    /// Entity type not declared in the schema.
    #[error("unknown entity type: {name}")]
    UnknownType {
        /// The undeclared type name.
        name: String,
    },

    /// Relationship accessor not declared on the entity type.
    #[error("unknown relationship {accessor:?} on {type_name}")]
    UnknownRelationship {
        /// Entity type consulted.
        type_name: String,
        /// The undeclared accessor.
        accessor: String,
    },

    /// A write needed a primary key the row data does not carry.
    #[error("missing primary key for {type_name}")]
    MissingPrimaryKey {
        /// Entity type being written.
        type_name: String,
    },

    /// Operation issued against a committed or rolled-back transaction.
    #[error("transaction already finished")]
    TransactionFinished,

    /// Any other store-level failure (duplicate key, missing row,
    /// unsupported traversal).
    #[error("database error: {message}")]
    Database {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a validation error.
    pub fn validation(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown-type error.
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    /// Creates an unknown-relationship error.
    pub fn unknown_relationship(
        type_name: impl Into<String>,
        accessor: impl Into<String>,
    ) -> Self {
        Self::UnknownRelationship {
            type_name: type_name.into(),
            accessor: accessor.into(),
        }
    }

    /// Creates a missing-primary-key error.
    pub fn missing_primary_key(type_name: impl Into<String>) -> Self {
        Self::MissingPrimaryKey {
            type_name: type_name.into(),
        }
    }

    /// Creates a generic database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }
}
