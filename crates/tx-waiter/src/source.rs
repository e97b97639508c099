//! Where receipts come from.

use std::{future::Future, sync::Arc};

use alloy::providers::Provider;
use stakeflow_primitives::{events::Receipt, TxHash};
use staking_manager::{AlloyStakingManager, GatewayResult};

/// A single, non-blocking receipt lookup.
pub trait ReceiptSource: Send + Sync {
    /// Returns the receipt of `tx_hash`, or `None` if it is not mined yet.
    fn receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = GatewayResult<Option<Receipt>>> + Send;
}

impl<P: Provider> ReceiptSource for AlloyStakingManager<P> {
    async fn receipt(&self, tx_hash: TxHash) -> GatewayResult<Option<Receipt>> {
        AlloyStakingManager::receipt(self, tx_hash).await
    }
}

impl<T: ReceiptSource> ReceiptSource for Arc<T> {
    fn receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = GatewayResult<Option<Receipt>>> + Send {
        self.as_ref().receipt(tx_hash)
    }
}
