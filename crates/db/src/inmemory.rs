//! In-memory [`OperationDb`], used by tests and by sessions that do not need to survive a
//! restart.

use std::{collections::BTreeMap, sync::Arc};

use stakeflow_primitives::operation::{OperationKey, StakeOperation};
use tokio::sync::RwLock;
use tracing::trace;

use crate::{errors::DbResult, operations::OperationDb};

/// In-memory database of staking operations.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOperationDb {
    /// key -> latest record
    operations: Arc<RwLock<BTreeMap<OperationKey, StakeOperation>>>,
}

impl OperationDb for InMemoryOperationDb {
    async fn get_operation(&self, key: OperationKey) -> DbResult<Option<StakeOperation>> {
        Ok(self.operations.read().await.get(&key).cloned())
    }

    async fn put_operation(&self, operation: &StakeOperation) -> DbResult<()> {
        trace!(action = "trying to acquire write lock on operations", key = %operation.key);
        let mut operations = self.operations.write().await;
        trace!(event = "acquired write lock on operations", key = %operation.key);

        operations.insert(operation.key, operation.clone());

        Ok(())
    }

    async fn claim_operation(
        &self,
        operation: &StakeOperation,
        stale_before: u64,
    ) -> DbResult<bool> {
        let mut operations = self.operations.write().await;
        let replaceable = operations
            .get(&operation.key)
            .map_or(true, |existing| existing.is_replaceable(stale_before));
        if replaceable {
            operations.insert(operation.key, operation.clone());
        }

        Ok(replaceable)
    }

    async fn list_operations(&self) -> DbResult<Vec<StakeOperation>> {
        Ok(self.operations.read().await.values().cloned().collect())
    }

    async fn pending_operations(&self) -> DbResult<Vec<StakeOperation>> {
        Ok(self
            .operations
            .read()
            .await
            .values()
            .filter(|operation| !operation.is_terminal())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use stakeflow_primitives::{
        ids::ValidationId,
        operation::{OperationPhase, StakeIntent, ValidatorRemovalParams},
    };

    use super::*;

    fn removal(byte: u8) -> StakeOperation {
        StakeOperation::new(StakeIntent::RemoveValidator(ValidatorRemovalParams {
            validation_id: ValidationId::from([byte; 32]),
            include_uptime_proof: false,
        }))
    }

    #[tokio::test]
    async fn put_replaces_the_record_under_a_key() {
        let db = InMemoryOperationDb::default();
        let mut op = removal(1);
        db.put_operation(&op).await.unwrap();

        op.advance(OperationPhase::MessageSigned);
        db.put_operation(&op).await.unwrap();

        let stored = db.get_operation(op.key).await.unwrap().unwrap();
        assert_eq!(stored.phase, OperationPhase::MessageSigned);
        assert_eq!(db.list_operations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claim_refuses_a_live_claim_and_pending_records() {
        let db = InMemoryOperationDb::default();
        let mut claimed = removal(1);
        claimed.claimed_at = Some(1_000);

        assert!(db.claim_operation(&claimed, 900).await.unwrap());
        assert!(!db.claim_operation(&claimed, 900).await.unwrap());
        // a claim older than the cutoff was left behind by a session that went away
        assert!(db.claim_operation(&claimed, 1_001).await.unwrap());

        let mut broadcast = claimed.clone();
        broadcast.claimed_at = None;
        broadcast.artifacts.initiate_tx = Some(Default::default());
        db.put_operation(&broadcast).await.unwrap();
        assert!(!db.claim_operation(&claimed, u64::MAX).await.unwrap());

        broadcast.advance(OperationPhase::Completed);
        db.put_operation(&broadcast).await.unwrap();
        assert!(db.claim_operation(&claimed, 0).await.unwrap());
        assert_eq!(db.get_operation(claimed.key).await.unwrap(), Some(claimed));
    }

    #[tokio::test]
    async fn pending_skips_terminal_operations() {
        let db = InMemoryOperationDb::default();
        let mut done = removal(1);
        done.advance(OperationPhase::Completed);
        let open = removal(2);

        db.put_operation(&done).await.unwrap();
        db.put_operation(&open).await.unwrap();

        let pending = db.pending_operations().await.unwrap();
        assert_eq!(pending, vec![open]);
        assert!(db
            .get_operation(removal(3).key)
            .await
            .unwrap()
            .is_none());
    }
}
