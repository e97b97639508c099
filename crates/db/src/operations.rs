//! Interface to the store of staking operations.

use std::{future::Future, sync::Arc};

use stakeflow_primitives::operation::{OperationKey, StakeOperation};

use crate::errors::DbResult;

/// Persists one [`StakeOperation`] per [`OperationKey`].
///
/// Writing an operation replaces whatever was stored under its key, so a key never has more than
/// one record, terminal or not.
pub trait OperationDb: Send + Sync {
    /// Gets, if present, the operation stored under `key`.
    fn get_operation(
        &self,
        key: OperationKey,
    ) -> impl Future<Output = DbResult<Option<StakeOperation>>> + Send;

    /// Stores `operation` under its key, replacing any previous record.
    fn put_operation(
        &self,
        operation: &StakeOperation,
    ) -> impl Future<Output = DbResult<()>> + Send;

    /// Stores `operation` only if its key has no record or a record that
    /// [is replaceable](StakeOperation::is_replaceable) at `stale_before`, and returns whether
    /// it was stored.
    ///
    /// The check and the write are atomic, so of two sessions claiming the same key at most one
    /// succeeds.
    fn claim_operation(
        &self,
        operation: &StakeOperation,
        stale_before: u64,
    ) -> impl Future<Output = DbResult<bool>> + Send;

    /// Lists every stored operation, ordered by key.
    fn list_operations(&self) -> impl Future<Output = DbResult<Vec<StakeOperation>>> + Send;

    /// Lists the operations that are neither completed nor failed.
    fn pending_operations(&self) -> impl Future<Output = DbResult<Vec<StakeOperation>>> + Send;
}

impl<T: OperationDb> OperationDb for Arc<T> {
    fn get_operation(
        &self,
        key: OperationKey,
    ) -> impl Future<Output = DbResult<Option<StakeOperation>>> + Send {
        self.as_ref().get_operation(key)
    }

    fn put_operation(
        &self,
        operation: &StakeOperation,
    ) -> impl Future<Output = DbResult<()>> + Send {
        self.as_ref().put_operation(operation)
    }

    fn claim_operation(
        &self,
        operation: &StakeOperation,
        stale_before: u64,
    ) -> impl Future<Output = DbResult<bool>> + Send {
        self.as_ref().claim_operation(operation, stale_before)
    }

    fn list_operations(&self) -> impl Future<Output = DbResult<Vec<StakeOperation>>> + Send {
        self.as_ref().list_operations()
    }

    fn pending_operations(&self) -> impl Future<Output = DbResult<Vec<StakeOperation>>> + Send {
        self.as_ref().pending_operations()
    }
}
