//! Transaction engine errors
//!
//! Error codes:
//! - ATOMIX_UNREGISTERED_IDENTITY
//! - ATOMIX_SERIALIZATION_CONFLICT (retryable after abort)
//! - ATOMIX_PERSISTENCE_FAILED (retryable unless the store is corrupt)
//! - ATOMIX_COMMIT_ORDERING

use thiserror::Error;

use crate::mvcc::CommitAuthorityError;
use crate::storage::StorageError;

/// Result type for transaction engine operations
pub type TxnResult<T> = Result<T, TxnError>;

#[derive(Debug, Error)]
pub enum TxnError {
    #[error("Identity not registered: {0}")]
    UnregisteredIdentity(String),

    #[error("Serialization conflict for identity {identity} on key {key}")]
    SerializationConflict { identity: String, key: String },

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StorageError),

    #[error("Commit ordering violated: {0}")]
    CommitOrdering(#[from] CommitAuthorityError),
}

impl TxnError {
    pub fn code(&self) -> &'static str {
        match self {
            TxnError::UnregisteredIdentity(_) => "ATOMIX_UNREGISTERED_IDENTITY",
            TxnError::SerializationConflict { .. } => "ATOMIX_SERIALIZATION_CONFLICT",
            TxnError::Persistence(_) => "ATOMIX_PERSISTENCE_FAILED",
            TxnError::CommitOrdering(_) => "ATOMIX_COMMIT_ORDERING",
        }
    }

    /// True if the same transaction can succeed when retried.
    ///
    /// A conflict needs an abort first; a persistence failure can be retried
    /// as is because the workspace is left intact.
    pub fn is_retryable(&self) -> bool {
        match self {
            TxnError::SerializationConflict { .. } => true,
            TxnError::Persistence(source) => source.is_retryable(),
            TxnError::UnregisteredIdentity(_) | TxnError::CommitOrdering(_) => false,
        }
    }
}
