use modelstore_core::{CoreError, Etag, OperationError, ResourceId, ResourceKind, TxnId};
use modelstore_storage::StorageError;
use thiserror::Error;

use crate::transaction::TxnState;
use crate::validation::Diagnostic;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("resource not found: {0}")]
    NotFound(ResourceId),

    #[error("resource already exists: {0}")]
    AlreadyExists(ResourceId),

    #[error("transaction not found: {0}")]
    TransactionNotFound(TxnId),

    #[error("transaction {txn_id} is closed ({state})")]
    TransactionClosed { txn_id: TxnId, state: TxnState },

    /// The resource moved since the transaction's snapshot. Re-begin on top
    /// of `current` and retry.
    #[error("conflict on {resource_id}: current etag is {current}")]
    Conflict { resource_id: ResourceId, current: Etag },

    #[error("validation failed with {} diagnostic(s)", .diagnostics.len())]
    ValidationFailed { diagnostics: Vec<Diagnostic> },

    #[error("operation failed: {0}")]
    Operation(#[from] OperationError),

    #[error("operation '{name}' already registered for {kind} resources")]
    DuplicateOperation { kind: ResourceKind, name: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => Self::NotFound(id),
            StorageError::AlreadyExists(id) => Self::AlreadyExists(id),
            StorageError::Conflict {
                resource_id,
                current,
            } => Self::Conflict {
                resource_id,
                current,
            },
            StorageError::Core(e) => Self::Core(e),
        }
    }
}
