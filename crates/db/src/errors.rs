//! Errors surfaced by every [`OperationDb`](crate::OperationDb) backend.

use thiserror::Error;

use crate::persistent::errors::StorageError;

/// Top-level database error.
#[derive(Debug, Error)]
pub enum DbError {
    /// The persistent backend failed.
    #[error("sqlite: {0}")]
    Storage(#[from] StorageError),
}

/// Result type of every database call.
pub type DbResult<T> = Result<T, DbError>;
